use std::sync::{Arc, Mutex};
use std::time::Duration;

use bridge_sim::{Completion, SimBridge, SimNamespace, SimObject};
use bridge_traits::{Bridge, Namespace, NativeObject, NativePayload, RawError};
use serde_json::{json, Value};

type Outcome = Arc<Mutex<Vec<Result<Value, RawError>>>>;

fn recorder() -> (Outcome, bridge_traits::SuccessCallback, bridge_traits::ErrorCallback) {
    let outcome: Outcome = Arc::new(Mutex::new(Vec::new()));
    let ok = Arc::clone(&outcome);
    let err = Arc::clone(&outcome);
    (
        outcome,
        Box::new(move |payload: NativePayload| {
            ok.lock()
                .unwrap()
                .push(Ok(payload.into_value().unwrap_or(Value::Null)))
        }),
        Box::new(move |error: RawError| err.lock().unwrap().push(Err(error))),
    )
}

fn success(value: Value) -> Result<Value, RawError> {
    Ok(value)
}

fn bridge() -> SimBridge {
    SimBridge::new().with_namespace(
        SimNamespace::new("nativeObj")
            .with_default_constructor("Bitmap")
            .with_method("ping", Completion::Succeed(json!("pong")))
            .with_method("broken", Completion::Throw(RawError::Message("bad".into())))
            .with_method(
                "slow",
                Completion::after(Duration::from_millis(10), Completion::Succeed(json!(1))),
            )
            .with_method(
                "slow_throw",
                Completion::after(Duration::from_millis(5), Completion::Throw("late".into())),
            )
            .with_method("twice", Completion::Twice(json!(1), "again".into()))
            .with_property("version", json!("1.0")),
    )
}

#[test]
fn test_namespaces_and_properties() {
    let bridge = bridge();
    assert_eq!(bridge.namespaces(), vec!["nativeObj".to_string()]);
    assert!(bridge.namespace("camera").is_none());

    let ns = bridge.namespace("nativeObj").unwrap();
    assert_eq!(ns.property("version").unwrap(), json!("1.0"));
    assert_eq!(ns.property("missing").unwrap(), Value::Null);

    assert!(bridge.uninstall("nativeObj").is_some());
    assert!(bridge.namespace("nativeObj").is_none());
}

#[test]
fn test_constructor_tracks_objects() {
    let bridge = bridge();
    let ns = bridge.namespace("nativeObj").unwrap();
    let object = ns.construct("Bitmap", &[json!("b1")]).unwrap();

    assert_eq!(object.native_id().as_deref(), Some("b1"));
    let sim = bridge.sim_namespace("nativeObj").unwrap();
    assert_eq!(sim.created().len(), 1);

    let missing = ns.construct("Canvas", &[]).err().unwrap();
    assert!(matches!(missing, RawError::Thrown(msg) if msg.contains("Canvas")));
}

#[test]
fn test_immediate_and_throwing_methods() {
    let bridge = bridge();
    let ns = bridge.namespace("nativeObj").unwrap();

    let (outcome, ok, err) = recorder();
    ns.invoke("ping", vec![], ok, err).unwrap();
    assert_eq!(*outcome.lock().unwrap(), vec![success(json!("pong"))]);

    let (outcome, ok, err) = recorder();
    let thrown = ns.invoke("broken", vec![], ok, err).unwrap_err();
    assert_eq!(thrown, RawError::Message("bad".into()));
    assert!(outcome.lock().unwrap().is_empty());

    let (outcome, ok, err) = recorder();
    ns.invoke("twice", vec![], ok, err).unwrap();
    assert_eq!(outcome.lock().unwrap().len(), 2);

    assert_eq!(
        bridge.sim_namespace("nativeObj").unwrap().invocations(),
        vec!["ping", "broken", "twice"]
    );
}

#[tokio::test]
async fn test_delayed_completions() {
    let bridge = bridge();
    let ns = bridge.namespace("nativeObj").unwrap();

    let (slow, ok, err) = recorder();
    ns.invoke("slow", vec![], ok, err).unwrap();
    let (late_throw, ok, err) = recorder();
    ns.invoke("slow_throw", vec![], ok, err).unwrap();

    assert!(slow.lock().unwrap().is_empty());
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(*slow.lock().unwrap(), vec![success(json!(1))]);
    assert_eq!(
        *late_throw.lock().unwrap(),
        vec![Err(RawError::Message("late".into()))]
    );
}

#[test]
fn test_object_async_methods_with_scripts() {
    let object = SimObject::new("v1").with_async_method_fn("seek", |args| {
        match args.first().and_then(Value::as_f64) {
            Some(position) if position >= 0.0 => Completion::Succeed(json!(position)),
            _ => Completion::Fail(RawError::Json(json!({ "code": 2, "message": "bad position" }))),
        }
    });

    let (outcome, ok, err) = recorder();
    object.invoke("seek", vec![json!(-1)], ok, err).unwrap();
    assert!(matches!(outcome.lock().unwrap()[0], Err(RawError::Json(_))));

    let (outcome, ok, err) = recorder();
    object.invoke("seek", vec![json!(2.5)], ok, err).unwrap();
    assert_eq!(*outcome.lock().unwrap(), vec![success(json!(2.5))]);
}
