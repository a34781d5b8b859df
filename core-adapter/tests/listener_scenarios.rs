mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bridge_traits::same_listener;
use common::Harness;
use core_adapter::{listener, ErrorCode, Handle, HandleKind, ListenerEvent};
use core_async::time::{sleep, Duration, Instant};
use core_runtime::config::ListenerRemovalPolicy;
use serde_json::json;

fn player(h: &Harness) -> Arc<Handle> {
    h.ctx
        .construct("video", "createVideoPlayer", &[json!("v1")], HandleKind::VideoPlayer)
        .unwrap()
}

#[test]
fn test_add_then_remove_uses_the_same_wrapper() {
    let h = Harness::new();
    let player = player(&h);
    let native = h.last_object("video");

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let on_play = listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    h.ctx.add_listener(&player, "play", &on_play).unwrap();
    let bound = h
        .ctx
        .listeners()
        .lookup(player.id(), "play", &on_play)
        .unwrap();
    assert_eq!(native.listener_count("play"), 1);

    native.emit("play", json!(null));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    h.ctx.remove_listener(&player, "play", &on_play).unwrap();
    assert_eq!(native.listener_count("play"), 0);
    assert!(h.ctx.listeners().is_empty());

    // Re-adding creates a fresh wrapper.
    h.ctx.add_listener(&player, "play", &on_play).unwrap();
    let rebound = h
        .ctx
        .listeners()
        .lookup(player.id(), "play", &on_play)
        .unwrap();
    assert!(!same_listener(&bound, &rebound));
}

#[test]
fn test_duplicate_add_is_rejected() {
    let h = Harness::new();
    let player = player(&h);
    let on_play = listener(|_| {});

    h.ctx.add_listener(&player, "play", &on_play).unwrap();
    let err = h.ctx.add_listener(&player, "play", &on_play).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::AlreadyExists);
    assert_eq!(h.last_object("video").listener_count("play"), 1);
}

#[test]
fn test_remove_never_added_reports_not_found() {
    let h = Harness::new();
    let player = player(&h);

    let err = h
        .ctx
        .remove_listener(&player, "play", &listener(|_| {}))
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::NotFound);
}

#[test]
fn test_lenient_policy_ignores_unknown_listener() {
    let h = Harness::with_policy(ListenerRemovalPolicy::Lenient);
    let player = player(&h);

    assert!(h
        .ctx
        .remove_listener(&player, "play", &listener(|_| {}))
        .is_ok());
}

#[test]
fn test_equal_closures_are_distinct_listeners() {
    let h = Harness::new();
    let player = player(&h);
    let first = listener(|_| {});
    let second = listener(|_| {});

    h.ctx.add_listener(&player, "pause", &first).unwrap();
    h.ctx.add_listener(&player, "pause", &second).unwrap();
    h.ctx.remove_listener(&player, "pause", &first).unwrap();

    assert!(h.ctx.listeners().contains(player.id(), "pause", &second));
    assert_eq!(h.last_object("video").listener_count("pause"), 1);
}

#[test]
fn test_destroy_releases_owner_listeners() {
    let h = Harness::new();
    let player = player(&h);
    let native = h.last_object("video");

    h.ctx.add_listener(&player, "play", &listener(|_| {})).unwrap();
    h.ctx.add_listener(&player, "ended", &listener(|_| {})).unwrap();
    assert_eq!(h.ctx.listeners().count_for(player.id()), 2);

    h.ctx.destroy(&player);
    assert_eq!(h.ctx.listeners().count_for(player.id()), 0);
    assert_eq!(native.total_listeners(), 0);
}

#[tokio::test]
async fn test_status_wait_times_out_and_cleans_up() {
    let h = Harness::new();
    let player = player(&h);
    let native = h.last_object("video");

    let started = Instant::now();
    let err = h
        .ctx
        .wait_for_event(&player, "play", Some(Duration::from_millis(50)))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), ErrorCode::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(h.ctx.listeners().is_empty());
    assert_eq!(native.listener_count("play"), 0);
}

#[tokio::test]
async fn test_status_wait_receives_event() {
    let h = Harness::new();
    let player = player(&h);
    let native = h.last_object("video");

    let emitter = Arc::clone(&native);
    core_async::spawn(async move {
        sleep(Duration::from_millis(10)).await;
        emitter.emit("timeupdate", json!(1.5));
        emitter.emit("timeupdate", json!(3.0));
    });

    let event: ListenerEvent = h
        .ctx
        .wait_for_event_matching(
            &player,
            "timeupdate",
            Some(Duration::from_secs(2)),
            |event| event.field("value").and_then(|v| v.as_f64()) >= Some(3.0),
        )
        .await
        .unwrap();

    assert_eq!(event.payload, json!({ "value": 3.0 }));
    assert_eq!(&event.owner, player.id());
    assert!(h.ctx.listeners().is_empty());
    assert_eq!(native.listener_count("timeupdate"), 0);
}

#[tokio::test]
async fn test_status_wait_ends_when_handle_is_destroyed() {
    let h = Harness::new();
    let player = player(&h);

    let ctx = Arc::clone(&h.ctx);
    let doomed = Arc::clone(&player);
    core_async::spawn(async move {
        sleep(Duration::from_millis(10)).await;
        ctx.destroy(&doomed);
    });

    let started = Instant::now();
    let err = h
        .ctx
        .wait_for_event(&player, "ended", Some(Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), ErrorCode::Destroyed);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(h.ctx.listeners().is_empty());
}

#[tokio::test]
async fn test_dropped_wait_removes_its_listener() {
    let h = Harness::new();
    let player = player(&h);
    let wait = h
        .ctx
        .wait_for_event(&player, "waiting", Some(Duration::from_secs(5)));
    let raced = core_async::time::timeout(Duration::from_millis(10), wait).await;

    assert!(raced.is_err());
    assert!(h.ctx.listeners().is_empty());
    assert_eq!(h.last_object("video").listener_count("waiting"), 0);
}
