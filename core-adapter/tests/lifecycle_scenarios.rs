mod common;

use std::sync::Arc;

use bridge_sim::{Completion, SimObject};
use common::{Harness, PLAYER_PROPERTIES};
use core_adapter::{payload_value, BridgeContext, ErrorCode, Handle, HandleKind, ResourceState};
use core_async::time::{sleep, Duration};
use core_runtime::events::{CallEvent, EventStream, LifecycleEvent};
use serde_json::json;

fn bitmap(h: &Harness, id: &str) -> Arc<Handle> {
    h.ctx
        .construct("nativeObj", "Bitmap", &[json!(id)], HandleKind::Bitmap)
        .unwrap()
}

fn player(h: &Harness) -> Arc<Handle> {
    h.ctx
        .construct("video", "createVideoPlayer", &[json!("v1")], HandleKind::VideoPlayer)
        .unwrap()
}

#[test]
fn test_destroying_one_of_three_bitmaps() {
    let h = Harness::new();
    let a = bitmap(&h, "A");
    let b = bitmap(&h, "B");
    let c = bitmap(&h, "C");

    assert!(h.ctx.destroy(&b));

    let registry = h.ctx.registry();
    assert_eq!(registry.active_count(&HandleKind::Bitmap), 2);
    let ids = registry.active_ids(&HandleKind::Bitmap);
    assert_eq!(ids, vec![a.id().clone(), c.id().clone()]);
    assert!(!ids.contains(b.id()));
}

#[test]
fn test_destroy_twice_is_noop() {
    let h = Harness::new();
    let handle = bitmap(&h, "A");
    let native = h.last_object("nativeObj");

    assert!(h.ctx.destroy(&handle));
    assert!(!h.ctx.destroy(&handle));
    assert_eq!(native.close_count(), 1);
    assert_eq!(handle.state(), ResourceState::Destroyed);
}

#[test]
fn test_get_never_returns_destroyed_handle() {
    let h = Harness::new();
    let registry = h.ctx.registry();

    for round in 0..20 {
        let handle = bitmap(&h, &format!("b{round}"));
        let found = registry.get(&HandleKind::Bitmap, handle.id()).unwrap();
        assert_eq!(found.state(), ResourceState::Active);

        h.ctx.destroy(&handle);
        assert!(registry.get(&HandleKind::Bitmap, handle.id()).is_none());
    }
    assert_eq!(registry.total_count(), 0);
}

#[tokio::test]
async fn test_mutations_after_destroy_fail_with_destroyed() {
    let h = Harness::new();
    let player = player(&h);
    let proxy = h.ctx.proxy(&player, PLAYER_PROPERTIES);
    let snapshot = h.ctx.handle_call(&player, "snapshot", payload_value);

    assert_eq!(snapshot.call(vec![]).await.unwrap(), json!({ "frame": 1 }));
    assert_eq!(h.ctx.call_sync(&player, "pause", &[]).unwrap(), json!(null));
    h.ctx.destroy(&player);

    let call_err = snapshot.call(vec![]).await.unwrap_err();
    assert_eq!(call_err.error_code(), ErrorCode::Destroyed);

    let set_err = proxy.set("src", "movie.mp4").unwrap_err();
    assert_eq!(set_err.error_code(), ErrorCode::Destroyed);
    assert_eq!(
        proxy.get("muted").unwrap_err().error_code(),
        ErrorCode::Destroyed
    );
    assert_eq!(
        proxy.call("pause", &[]).unwrap_err().error_code(),
        ErrorCode::Destroyed
    );

    assert_eq!(
        h.ctx.call_sync(&player, "pause", &[]).unwrap_err().error_code(),
        ErrorCode::Destroyed
    );

    let listener = core_adapter::listener(|_| {});
    let listen_err = h.ctx.add_listener(&player, "play", &listener).unwrap_err();
    assert_eq!(listen_err.error_code(), ErrorCode::Destroyed);
}

#[tokio::test]
async fn test_late_completion_after_destroy_is_dropped() {
    let h = Harness::new();
    let mut events = EventStream::new(h.ctx.subscribe())
        .filter(|event| matches!(event, LifecycleEvent::Call(_)));

    let player = player(&h);
    let native = h.last_object("video");

    let pending = h.ctx.handle_call(&player, "play", payload_value).call(vec![]);
    assert_eq!(native.parked_count(), 1);

    h.ctx.destroy(&player);
    assert_eq!(native.resolve_parked(json!({ "status": "playing" })), 1);

    let err = pending.await.unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::Destroyed);

    let dropped = events.drain();
    assert_eq!(dropped.len(), 1);
    assert!(matches!(
        &dropped[0],
        LifecycleEvent::Call(CallEvent::LateCompletionDropped { method, .. })
            if method.as_str() == "VideoPlayer.play"
    ));
}

#[test]
fn test_clear_all_active_objects_reports_teardown_failures() {
    let h = Harness::new();
    bitmap(&h, "A");
    let faulty = h
        .ctx
        .construct("nativeObj", "FaultyBitmap", &[], HandleKind::Bitmap)
        .unwrap();
    player(&h);

    let report = h.ctx.clear_all_active_objects();
    assert_eq!(report.destroyed_count(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(&report.failures[0].id, faulty.id());
    assert_eq!(report.failures[0].error.code(), 9);
    assert_eq!(report.failures[0].error.message(), "in use");
    assert_eq!(h.ctx.registry().total_count(), 0);
}

#[test]
fn test_constructor_failures() {
    let h = Harness::new();

    let rejected = h
        .ctx
        .construct("nativeObj", "Broken", &[], HandleKind::Bitmap)
        .unwrap_err();
    assert_eq!(rejected.error_code(), ErrorCode::OperationFailed);
    assert_eq!(rejected.message(), "constructor rejected");

    let missing = h
        .ctx
        .construct("nativeObj", "Canvas", &[], HandleKind::View)
        .unwrap_err();
    assert_eq!(missing.error_code(), ErrorCode::Unknown);

    let absent = h
        .ctx
        .construct("camera", "getCamera", &[], HandleKind::Camera)
        .unwrap_err();
    assert_eq!(absent.error_code(), ErrorCode::EnvironmentUnavailable);
    assert_eq!(h.ctx.registry().total_count(), 0);
}

#[tokio::test]
async fn test_fetch_registers_delivered_object() {
    let h = Harness::new();
    h.namespace("nativeObj").replace_method(
        "getBook",
        Completion::SucceedWith(Arc::new(SimObject::new("book"))),
    );

    let book = h
        .ctx
        .fetch_handle("nativeObj", "getBook", HandleKind::AddressBook)
        .call(vec![])
        .await
        .unwrap();

    assert!(book.is_active());
    assert_eq!(h.ctx.registry().active_count(&HandleKind::AddressBook), 1);

    h.namespace("nativeObj")
        .replace_method("getBook", Completion::Succeed(json!({ "not": "an object" })));
    let err = h
        .ctx
        .fetch_handle("nativeObj", "getBook", HandleKind::AddressBook)
        .call(vec![])
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::OperationFailed);
    assert_eq!(h.ctx.registry().active_count(&HandleKind::AddressBook), 1);
}

#[tokio::test]
async fn test_fetch_answer_after_timeout_is_not_left_registered() {
    let h = Harness::new();
    let book = Arc::new(SimObject::new("book"));
    h.namespace("nativeObj").replace_method(
        "getBook",
        Completion::after(
            Duration::from_millis(60),
            Completion::SucceedWith(Arc::clone(&book)),
        ),
    );

    let err = h
        .ctx
        .fetch_handle("nativeObj", "getBook", HandleKind::AddressBook)
        .call(vec![])
        .within(Duration::from_millis(10))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::Timeout);

    sleep(Duration::from_millis(120)).await;
    assert_eq!(h.ctx.registry().active_count(&HandleKind::AddressBook), 0);
    assert!(book.is_closed());
}

#[tokio::test]
async fn test_fetch_with_dropped_future_releases_late_answer() {
    let h = Harness::new();
    let book = Arc::new(SimObject::new("book"));
    h.namespace("nativeObj").replace_method(
        "getBook",
        Completion::after(
            Duration::from_millis(20),
            Completion::SucceedWith(Arc::clone(&book)),
        ),
    );

    drop(
        h.ctx
            .fetch_handle("nativeObj", "getBook", HandleKind::AddressBook)
            .call(vec![]),
    );

    sleep(Duration::from_millis(80)).await;
    assert_eq!(h.ctx.registry().total_count(), 0);
    assert!(book.is_closed());
}

#[test]
fn test_fetch_with_unread_answer_releases_handle_on_drop() {
    let h = Harness::new();
    let book = Arc::new(SimObject::new("book"));
    h.namespace("nativeObj")
        .replace_method("getBook", Completion::SucceedWith(Arc::clone(&book)));

    let pending = h
        .ctx
        .fetch_handle("nativeObj", "getBook", HandleKind::AddressBook)
        .call(vec![]);
    // Answered synchronously: registered and waiting in the channel.
    assert_eq!(h.ctx.registry().active_count(&HandleKind::AddressBook), 1);

    drop(pending);
    assert_eq!(h.ctx.registry().active_count(&HandleKind::AddressBook), 0);
    assert_eq!(book.close_count(), 1);
}

#[test]
fn test_proxy_forwards_declared_properties_only() {
    let h = Harness::new();
    let player = player(&h);
    let native = h.last_object("video");
    let proxy = h.ctx.proxy(&player, PLAYER_PROPERTIES);

    proxy.set("src", "https://example.com/a.mp4").unwrap();
    assert_eq!(
        native.property("src"),
        Some(json!("https://example.com/a.mp4"))
    );
    assert!(!proxy.get_as::<bool>("muted").unwrap());

    let undeclared = proxy.set("autoplay", true).unwrap_err();
    assert_eq!(undeclared.error_code(), ErrorCode::InvalidArgument);

    let snapshot = proxy.snapshot().unwrap();
    assert_eq!(snapshot.len(), PLAYER_PROPERTIES.len());
}

#[test]
fn test_context_without_bridge() {
    let ctx = BridgeContext::without_bridge();
    assert!(!ctx.is_supported("nativeObj"));

    let err = ctx
        .construct("nativeObj", "Bitmap", &[], HandleKind::Bitmap)
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::EnvironmentUnavailable);
}
