//! # Dual-Mode Adapter
//!
//! Native asynchronous methods follow the `(args…, success, error)`
//! convention. [`DualModeAdapter`] turns one such raw method into two
//! explicit call forms:
//!
//! - [`call`](DualModeAdapter::call): returns a [`PendingCall`] future
//! - [`call_with`](DualModeAdapter::call_with): hands the outcome to
//!   [`Callbacks`] and returns nothing
//!
//! plus [`invoke`](DualModeAdapter::invoke), the single dynamic entry point
//! that picks the form from whether callbacks were supplied.
//!
//! ## Single Fire
//!
//! Every dispatch owns one completion slot that is taken exactly once. A
//! host that calls both callbacks, calls one twice, returns an error after
//! completing, or panics before registering anything still produces
//! exactly one outcome. Synchronous failures (an error return or a panic)
//! go through the same failure path as the error callback.
//!
//! ## Handle-Bound Calls
//!
//! Calls on a registered handle re-check the registry when the host answers.
//! If the handle was destroyed meanwhile the payload is dropped and the
//! call settles with `Destroyed`.
//!
//! ## Abandoned Calls
//!
//! A [`PendingCall`] that is dropped or loses its deadline stops listening.
//! Handles registered while converting an answer nobody receives are
//! destroyed again.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use bridge_traits::{BridgeError, ErrorCallback, ErrorCode, NativePayload, RawError, SuccessCallback};
use core_async::sync::oneshot;
use core_async::time::{self, Duration};
use core_runtime::events::{CallEvent, EventBus, LifecycleEvent};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::handle::{Handle, HandleId, HandleKind};
use crate::normalize::{normalize, panic_message};
use crate::registry::HandleRegistry;

static NEXT_OPERATION: AtomicU64 = AtomicU64::new(1);

type RawCall =
    Arc<dyn Fn(Vec<Value>, SuccessCallback, ErrorCallback) -> Result<(), RawError> + Send + Sync>;
type Convert<T> = Arc<dyn Fn(NativePayload, &Claims) -> Result<T, BridgeError> + Send + Sync>;

/// How the caller wants the outcome delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    Callback,
    Future,
}

type OnSuccess<T> = Box<dyn FnOnce(T) + Send>;
type OnError = Box<dyn FnOnce(BridgeError) + Send>;

/// Callback-style completion.
pub struct Callbacks<T> {
    on_success: OnSuccess<T>,
    on_error: Option<OnError>,
}

impl<T> Callbacks<T> {
    pub fn new<F>(on_success: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        Self {
            on_success: Box::new(on_success),
            on_error: None,
        }
    }

    /// Adds an error callback. Without one, failures are logged and dropped.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: FnOnce(BridgeError) + Send + 'static,
    {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Success and error callbacks in one go.
    pub fn both<S, E>(on_success: S, on_error: E) -> Self
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(BridgeError) + Send + 'static,
    {
        Self::new(on_success).on_error(on_error)
    }
}

impl<T> fmt::Debug for Callbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("has_error_callback", &self.on_error.is_some())
            .finish()
    }
}

enum Completion<T> {
    Callbacks(Callbacks<T>),
    Future(oneshot::Sender<Result<T, BridgeError>>),
}

/// Handles registered while converting one answer.
#[derive(Default)]
pub(crate) struct Claims {
    handles: Mutex<Vec<(Weak<HandleRegistry>, Arc<Handle>)>>,
}

impl Claims {
    pub(crate) fn claim(&self, registry: &Arc<HandleRegistry>, handle: &Arc<Handle>) {
        self.handles
            .lock()
            .push((Arc::downgrade(registry), Arc::clone(handle)));
    }

    /// Destroys every claimed handle; the answer reached nobody.
    fn release(&self, label: &str) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for (registry, handle) in handles {
            let Some(registry) = registry.upgrade() else {
                continue;
            };
            if registry.destroy(handle.kind(), handle.id()) {
                debug!(
                    label,
                    kind = %handle.kind(),
                    handle_id = %handle.id(),
                    "Undelivered handle released"
                );
            }
        }
    }
}

/// The completion slot of one dispatch.
struct Settlement<T> {
    operation: u64,
    label: Arc<str>,
    completion: Mutex<Option<Completion<T>>>,
    claims: Arc<Claims>,
}

impl<T> Settlement<T> {
    fn new(label: Arc<str>, completion: Completion<T>) -> Self {
        Self {
            operation: NEXT_OPERATION.fetch_add(1, Ordering::Relaxed),
            label,
            completion: Mutex::new(Some(completion)),
            claims: Arc::new(Claims::default()),
        }
    }

    fn take(&self) -> Option<Completion<T>> {
        let completion = self.completion.lock().take();
        if completion.is_none() {
            trace!(
                operation = self.operation,
                label = %self.label,
                "Duplicate completion ignored"
            );
        }
        completion
    }

    /// Settles from a host callback.
    ///
    /// The slot is taken before `outcome` runs, so a duplicate or late
    /// payload is never converted.
    fn settle_with<F>(&self, liveness: Option<&Liveness>, outcome: F) -> bool
    where
        F: FnOnce(&Claims) -> Result<T, BridgeError>,
    {
        let Some(completion) = self.take() else {
            return false;
        };
        let outcome = match liveness {
            Some(liveness) if !liveness.is_live() => Err(liveness.drop_late(&self.label)),
            _ => outcome(&self.claims),
        };
        self.deliver(completion, outcome);
        true
    }

    /// Delivers `outcome` if nothing was delivered yet.
    ///
    /// Returns `false` when the slot was already taken.
    fn settle(&self, outcome: Result<T, BridgeError>) -> bool {
        match self.take() {
            Some(completion) => {
                self.deliver(completion, outcome);
                true
            }
            None => false,
        }
    }

    fn deliver(&self, completion: Completion<T>, outcome: Result<T, BridgeError>) {
        debug!(
            operation = self.operation,
            label = %self.label,
            ok = outcome.is_ok(),
            "Bridge call settled"
        );

        match completion {
            Completion::Future(sender) => {
                if sender.send(outcome).is_err() {
                    debug!(
                        operation = self.operation,
                        label = %self.label,
                        "Caller stopped waiting, answer discarded"
                    );
                    self.claims.release(&self.label);
                }
            }
            Completion::Callbacks(callbacks) => match outcome {
                Ok(value) => (callbacks.on_success)(value),
                Err(error) => match callbacks.on_error {
                    Some(on_error) => on_error(error),
                    None => warn!(
                        label = %self.label,
                        error = %error,
                        "Bridge call failed without an error callback"
                    ),
                },
            },
        }
    }
}

/// Re-checks that a handle is still registered when its call completes.
struct Liveness {
    registry: Weak<HandleRegistry>,
    kind: HandleKind,
    id: HandleId,
    events: EventBus,
}

impl Liveness {
    fn is_live(&self) -> bool {
        self.registry
            .upgrade()
            .map_or(false, |registry| registry.contains(&self.kind, &self.id))
    }

    fn drop_late(&self, label: &str) -> BridgeError {
        warn!(
            kind = %self.kind,
            handle_id = %self.id,
            label,
            "Late completion for destroyed handle dropped"
        );
        self.events
            .emit(LifecycleEvent::Call(CallEvent::LateCompletionDropped {
                handle_id: self.id.to_string(),
                method: label.to_string(),
            }));
        BridgeError::destroyed(format!("{} {}", self.kind, self.id))
    }
}

/// Future returned by the future-style call forms.
#[must_use = "a PendingCall does nothing unless awaited"]
pub struct PendingCall<T> {
    receiver: oneshot::Receiver<Result<T, BridgeError>>,
    label: Arc<str>,
    claims: Arc<Claims>,
}

impl<T> PendingCall<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Races the call against a deadline; losing yields `Timeout`.
    pub async fn within(self, deadline: Duration) -> Result<T, BridgeError> {
        let label = Arc::clone(&self.label);
        match time::timeout(deadline, self).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BridgeError::Timeout(format!(
                "{label} did not complete within {}ms",
                deadline.as_millis()
            ))),
        }
    }
}

impl<T> Future for PendingCall<T> {
    type Output = Result<T, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::Unknown(format!(
                "{} was abandoned by the host without completing",
                this.label
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for PendingCall<T> {
    fn drop(&mut self) {
        // An answer that arrived but was never polled is still in the channel.
        self.receiver.close();
        if let Ok(Ok(_)) = self.receiver.try_recv() {
            debug!(label = %self.label, "Pending call dropped with an unread answer");
            self.claims.release(&self.label);
        }
    }
}

impl<T> fmt::Debug for PendingCall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("label", &self.label)
            .finish()
    }
}

/// Adapter around one raw native asynchronous method.
pub struct DualModeAdapter<T> {
    label: Arc<str>,
    raw: RawCall,
    convert: Convert<T>,
    liveness: Option<Arc<Liveness>>,
    fallback_code: i64,
    fallback_message: Arc<str>,
}

impl<T> Clone for DualModeAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            raw: Arc::clone(&self.raw),
            convert: Arc::clone(&self.convert),
            liveness: self.liveness.clone(),
            fallback_code: self.fallback_code,
            fallback_message: Arc::clone(&self.fallback_message),
        }
    }
}

impl<T> fmt::Debug for DualModeAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualModeAdapter")
            .field("label", &self.label)
            .field("handle_bound", &self.liveness.is_some())
            .finish()
    }
}

impl<T: Send + 'static> DualModeAdapter<T> {
    /// Wraps `raw`; `convert` turns the success payload into `T`.
    ///
    /// `label` names the call in logs and errors, e.g. `"nativeObj.save"`.
    pub fn new<R, C>(label: impl Into<String>, raw: R, convert: C) -> Self
    where
        R: Fn(Vec<Value>, SuccessCallback, ErrorCallback) -> Result<(), RawError>
            + Send
            + Sync
            + 'static,
        C: Fn(NativePayload) -> Result<T, BridgeError> + Send + Sync + 'static,
    {
        Self::claiming(label, raw, move |payload, _claims: &Claims| convert(payload))
    }

    /// Like [`new`](Self::new), for conversions that register handles.
    /// Claimed handles are destroyed when the answer reaches no caller.
    pub(crate) fn claiming<R, C>(label: impl Into<String>, raw: R, convert: C) -> Self
    where
        R: Fn(Vec<Value>, SuccessCallback, ErrorCallback) -> Result<(), RawError>
            + Send
            + Sync
            + 'static,
        C: Fn(NativePayload, &Claims) -> Result<T, BridgeError> + Send + Sync + 'static,
    {
        let label: Arc<str> = Arc::from(label.into());
        let fallback_message: Arc<str> = Arc::from(format!("{label} failed"));
        Self {
            label,
            raw: Arc::new(raw),
            convert: Arc::new(convert),
            liveness: None,
            fallback_code: ErrorCode::OperationFailed.as_i64(),
            fallback_message,
        }
    }

    /// Overrides the code and message used when the host's error lacks them.
    pub fn with_fallback(mut self, code: i64, message: impl Into<String>) -> Self {
        self.fallback_code = code;
        self.fallback_message = Arc::from(message.into());
        self
    }

    /// Drops late completions once `handle` leaves `registry`.
    pub(crate) fn bound_to(
        mut self,
        registry: &Arc<HandleRegistry>,
        handle: &Handle,
        events: EventBus,
    ) -> Self {
        self.liveness = Some(Arc::new(Liveness {
            registry: Arc::downgrade(registry),
            kind: handle.kind().clone(),
            id: handle.id().clone(),
            events,
        }));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Converts the success value with `f`.
    pub fn map<U, F>(self, f: F) -> DualModeAdapter<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let convert = self.convert;
        DualModeAdapter {
            label: self.label,
            raw: self.raw,
            convert: Arc::new(move |payload: NativePayload, claims: &Claims| {
                convert(payload, claims).map(&f)
            }),
            liveness: self.liveness,
            fallback_code: self.fallback_code,
            fallback_message: self.fallback_message,
        }
    }

    /// Future style.
    pub fn call(&self, args: Vec<Value>) -> PendingCall<T> {
        let (sender, receiver) = oneshot::channel();
        let claims = self.dispatch(args, Completion::Future(sender), CallStyle::Future);
        PendingCall {
            receiver,
            label: Arc::clone(&self.label),
            claims,
        }
    }

    /// Callback style.
    pub fn call_with(&self, args: Vec<Value>, callbacks: Callbacks<T>) {
        self.dispatch(args, Completion::Callbacks(callbacks), CallStyle::Callback);
    }

    /// Callback style when `callbacks` is supplied (returns `None`), future
    /// style otherwise (returns `Some`).
    pub fn invoke(&self, args: Vec<Value>, callbacks: Option<Callbacks<T>>) -> Option<PendingCall<T>> {
        match callbacks {
            Some(callbacks) => {
                self.call_with(args, callbacks);
                None
            }
            None => Some(self.call(args)),
        }
    }

    fn dispatch(&self, args: Vec<Value>, completion: Completion<T>, style: CallStyle) -> Arc<Claims> {
        let settlement = Arc::new(Settlement::new(Arc::clone(&self.label), completion));
        let claims = Arc::clone(&settlement.claims);
        debug!(
            operation = settlement.operation,
            label = %self.label,
            style = ?style,
            "Bridge call dispatched"
        );

        let on_success: SuccessCallback = {
            let settlement = Arc::clone(&settlement);
            let convert = Arc::clone(&self.convert);
            let liveness = self.liveness.clone();
            Box::new(move |payload| {
                settlement.settle_with(liveness.as_deref(), |claims| convert(payload, claims));
            })
        };

        let on_error: ErrorCallback = {
            let settlement = Arc::clone(&settlement);
            let liveness = self.liveness.clone();
            let fallback_code = self.fallback_code;
            let fallback_message = Arc::clone(&self.fallback_message);
            Box::new(move |raw| {
                settlement.settle_with(liveness.as_deref(), |_| {
                    Err(normalize(raw, fallback_code, &fallback_message))
                });
            })
        };

        let raw = Arc::clone(&self.raw);
        match panic::catch_unwind(AssertUnwindSafe(move || raw(args, on_success, on_error))) {
            Ok(Ok(())) => {}
            Ok(Err(raw_error)) => {
                settlement.settle(Err(normalize(
                    raw_error,
                    self.fallback_code,
                    &self.fallback_message,
                )));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                if !settlement.settle(Err(BridgeError::Unknown(message.clone()))) {
                    warn!(label = %self.label, panic = %message, "Bridge call panicked after completing");
                }
            }
        }
        claims
    }
}

/// Success payload as plain data.
///
/// # Errors
///
/// `OperationFailed` when the host delivered a native object instead.
pub fn payload_value(payload: NativePayload) -> Result<Value, BridgeError> {
    payload.into_value().ok_or_else(|| BridgeError::OperationFailed {
        code: ErrorCode::OperationFailed.as_i64(),
        message: "expected data, received a native object".to_string(),
    })
}

/// Success payload deserialized into `T`.
pub fn payload_json<T: DeserializeOwned>(payload: NativePayload) -> Result<T, BridgeError> {
    let value = payload_value(payload)?;
    serde_json::from_value(value).map_err(|e| BridgeError::OperationFailed {
        code: ErrorCode::OperationFailed.as_i64(),
        message: format!("unexpected payload shape: {e}"),
    })
}

/// Ignores the success payload.
pub fn payload_unit(_payload: NativePayload) -> Result<(), BridgeError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn adapter<R>(raw: R) -> DualModeAdapter<Value>
    where
        R: Fn(Vec<Value>, SuccessCallback, ErrorCallback) -> Result<(), RawError>
            + Send
            + Sync
            + 'static,
    {
        DualModeAdapter::new("test.echo", raw, payload_value)
    }

    fn echo() -> DualModeAdapter<Value> {
        adapter(|args, ok, _err| {
            ok(NativePayload::Value(Value::Array(args)));
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_future_style_success() {
        let value = echo().call(vec![json!(1), json!("a")]).await.unwrap();
        assert_eq!(value, json!([1, "a"]));
    }

    #[tokio::test]
    async fn test_future_style_error_is_normalized() {
        let adapter = adapter(|_, _ok, err| {
            err(RawError::Json(json!({ "message": "no sd card" })));
            Ok(())
        });
        let error = adapter.call(vec![]).await.unwrap_err();
        assert_eq!(error.error_code(), ErrorCode::OperationFailed);
        assert_eq!(error.message(), "no sd card");
    }

    #[test]
    fn test_callback_style_returns_nothing() {
        let received = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&received);

        let pending = echo().invoke(
            vec![json!(7)],
            Some(Callbacks::new(move |value| {
                *slot.lock() = Some(value);
            })),
        );

        assert!(pending.is_none());
        assert_eq!(*received.lock(), Some(json!([7])));
    }

    #[tokio::test]
    async fn test_omitting_callbacks_yields_future() {
        let pending = echo().invoke(vec![], None);
        assert!(pending.is_some());
        assert_eq!(pending.unwrap().await.unwrap(), json!([]));
    }

    #[test]
    fn test_both_callbacks_fire_once() {
        let adapter = adapter(|_, ok, err| {
            ok(NativePayload::Value(json!("first")));
            err(RawError::Message("second".into()));
            Err(RawError::Message("third".into()))
        });

        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let (s, f) = (Arc::clone(&successes), Arc::clone(&failures));
        adapter.call_with(
            vec![],
            Callbacks::both(
                move |_| {
                    s.fetch_add(1, Ordering::SeqCst);
                },
                move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                },
            ),
        );

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_racing_callbacks_convert_at_most_once() {
        for _ in 0..50 {
            let converted = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&converted);
            let adapter = DualModeAdapter::new(
                "test.race",
                |_, ok, err| {
                    let success = std::thread::spawn(move || ok(NativePayload::Value(json!(1))));
                    let failure = std::thread::spawn(move || err(RawError::Message("lost".into())));
                    let _ = success.join();
                    let _ = failure.join();
                    Ok(())
                },
                move |payload| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    payload_value(payload)
                },
            );

            let outcome = Arc::new(Mutex::new(Vec::new()));
            let (on_ok, on_err) = (Arc::clone(&outcome), Arc::clone(&outcome));
            adapter.call_with(
                vec![],
                Callbacks::both(
                    move |_| on_ok.lock().push(true),
                    move |_| on_err.lock().push(false),
                ),
            );

            let outcome = outcome.lock().clone();
            assert_eq!(outcome.len(), 1);
            let expected_conversions = usize::from(outcome[0]);
            assert_eq!(converted.load(Ordering::SeqCst), expected_conversions);
        }
    }

    #[tokio::test]
    async fn test_sync_error_uses_failure_path() {
        let adapter = adapter(|_, _ok, _err| Err(RawError::Message("bad args".into())))
            .with_fallback(77, "camera failed");
        let error = adapter.call(vec![]).await.unwrap_err();
        assert_eq!(error.code(), 77);
        assert_eq!(error.message(), "bad args");
    }

    #[tokio::test]
    async fn test_panic_becomes_unknown() {
        let adapter = adapter(|_, _ok, _err| panic!("undefined is not a function"));
        let error = adapter.call(vec![]).await.unwrap_err();
        assert_eq!(error.error_code(), ErrorCode::Unknown);
        assert_eq!(error.message(), "undefined is not a function");
    }

    #[tokio::test]
    async fn test_abandoned_call_resolves_unknown() {
        let adapter = adapter(|_, ok, err| {
            drop(ok);
            drop(err);
            Ok(())
        });
        let error = adapter.call(vec![]).await.unwrap_err();
        assert_eq!(error.error_code(), ErrorCode::Unknown);
        assert!(error.message().contains("test.echo"));
    }

    #[tokio::test]
    async fn test_map_and_json_payload() {
        #[derive(serde::Deserialize)]
        struct Saved {
            target: String,
        }

        let adapter = DualModeAdapter::new(
            "nativeObj.save",
            |_, ok, _err| {
                ok(NativePayload::Value(json!({ "target": "_doc/a.png" })));
                Ok(())
            },
            payload_json::<Saved>,
        )
        .map(|saved| saved.target);

        assert_eq!(adapter.call(vec![]).await.unwrap(), "_doc/a.png");
    }

    #[tokio::test]
    async fn test_within_times_out() {
        let adapter = adapter(|_, ok, err| {
            // Held forever: the host never answers.
            std::mem::forget((ok, err));
            Ok(())
        });
        let error = adapter
            .call(vec![])
            .within(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(error.error_code(), ErrorCode::Timeout);
    }
}
