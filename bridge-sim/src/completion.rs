//! Scripted answers for asynchronous native methods.

use std::fmt;
use std::sync::Arc;

use bridge_traits::{ErrorCallback, NativePayload, RawError, SuccessCallback};
use core_async::time::{sleep, Duration};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::object::SimObject;

/// Per-call script: receives the call arguments, picks the answer.
pub type Script = Arc<dyn Fn(&[Value]) -> Completion + Send + Sync>;

/// How a simulated asynchronous method answers.
#[derive(Clone)]
pub enum Completion {
    /// Success callback with data.
    Succeed(Value),
    /// Success callback with a native object.
    SucceedWith(Arc<SimObject>),
    /// Error callback.
    Fail(RawError),
    /// Synchronous error return; no callback is ever called.
    Throw(RawError),
    /// Synchronous panic; no callback is ever called.
    Panic(String),
    /// Keeps both callbacks and never calls them.
    Never,
    /// Success callback, then error callback: a misbehaving host.
    Twice(Value, RawError),
    /// Answers with the inner completion after a delay, on a spawned task.
    /// A delayed `Throw` or `Panic` arrives through the error callback.
    After(Duration, Box<Completion>),
}

impl Completion {
    pub fn after(delay: Duration, completion: Completion) -> Self {
        Completion::After(delay, Box::new(completion))
    }

    /// Runs the completion against a pair of callbacks.
    pub(crate) fn run(
        self,
        on_success: SuccessCallback,
        on_error: ErrorCallback,
        parked: &Parked,
    ) -> Result<(), RawError> {
        match self {
            Completion::Throw(error) => Err(error),
            Completion::Panic(message) => panic!("{message}"),
            Completion::After(delay, inner) => {
                let parked = parked.clone();
                core_async::spawn(async move {
                    sleep(delay).await;
                    inner.deliver(on_success, on_error, &parked);
                });
                Ok(())
            }
            other => {
                other.deliver(on_success, on_error, parked);
                Ok(())
            }
        }
    }

    /// Asynchronous delivery: nothing can be thrown back to the caller.
    fn deliver(self, on_success: SuccessCallback, on_error: ErrorCallback, parked: &Parked) {
        match self {
            Completion::Succeed(value) => on_success(NativePayload::Value(value)),
            Completion::SucceedWith(object) => on_success(NativePayload::Object(object)),
            Completion::Fail(error) | Completion::Throw(error) => on_error(error),
            Completion::Panic(message) => on_error(RawError::Thrown(message)),
            Completion::Never => parked.park(on_success, on_error),
            Completion::Twice(value, error) => {
                on_success(NativePayload::Value(value));
                on_error(error);
            }
            Completion::After(_, inner) => inner.deliver(on_success, on_error, parked),
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Succeed(value) => f.debug_tuple("Succeed").field(value).finish(),
            Completion::SucceedWith(object) => {
                f.debug_tuple("SucceedWith").field(&object.native_id_str()).finish()
            }
            Completion::Fail(error) => f.debug_tuple("Fail").field(error).finish(),
            Completion::Throw(error) => f.debug_tuple("Throw").field(error).finish(),
            Completion::Panic(message) => f.debug_tuple("Panic").field(message).finish(),
            Completion::Never => f.write_str("Never"),
            Completion::Twice(value, error) => {
                f.debug_tuple("Twice").field(value).field(error).finish()
            }
            Completion::After(delay, inner) => {
                f.debug_tuple("After").field(delay).field(inner).finish()
            }
        }
    }
}

/// Callbacks held by `Completion::Never`.
#[derive(Clone, Default)]
pub(crate) struct Parked {
    callbacks: Arc<Mutex<Vec<(SuccessCallback, ErrorCallback)>>>,
}

impl Parked {
    fn park(&self, on_success: SuccessCallback, on_error: ErrorCallback) {
        trace!("Simulated call parked");
        self.callbacks
            .lock()
            .push((on_success, on_error));
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks
            .lock()
            .len()
    }

    /// Drops every parked callback without calling it.
    pub(crate) fn release(&self) -> usize {
        let released = std::mem::take(
            &mut *self
                .callbacks
                .lock(),
        );
        released.len()
    }

    /// Answers every parked call with `value`.
    pub(crate) fn resolve_all(&self, value: Value) -> usize {
        let parked = std::mem::take(
            &mut *self
                .callbacks
                .lock(),
        );
        let count = parked.len();
        for (on_success, _) in parked {
            on_success(NativePayload::Value(value.clone()));
        }
        count
    }
}

/// Turns a fixed completion into a script.
pub(crate) fn fixed(completion: Completion) -> Script {
    Arc::new(move |_: &[Value]| completion.clone())
}
