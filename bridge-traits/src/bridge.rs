//! The ambient bridge object and its per-capability namespaces.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::RawError;
use crate::native::NativeObject;

/// What a native success callback receives.
///
/// Async bridge methods either complete with plain data (a JSON value) or
/// hand back a live native object (an address book, a fetched view, …).
#[derive(Clone)]
pub enum NativePayload {
    Value(Value),
    Object(Arc<dyn NativeObject>),
}

impl NativePayload {
    /// Payload carrying no data.
    pub fn empty() -> Self {
        NativePayload::Value(Value::Null)
    }

    /// Returns the JSON value, or `None` if the payload is a native object.
    pub fn into_value(self) -> Option<Value> {
        match self {
            NativePayload::Value(value) => Some(value),
            NativePayload::Object(_) => None,
        }
    }

    /// Returns the native object, or `None` if the payload is plain data.
    pub fn into_object(self) -> Option<Arc<dyn NativeObject>> {
        match self {
            NativePayload::Object(object) => Some(object),
            NativePayload::Value(_) => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, NativePayload::Object(_))
    }
}

impl From<Value> for NativePayload {
    fn from(value: Value) -> Self {
        NativePayload::Value(value)
    }
}

impl fmt::Debug for NativePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativePayload::Value(value) => f.debug_tuple("Value").field(value).finish(),
            NativePayload::Object(object) => f
                .debug_tuple("Object")
                .field(&object.native_id().unwrap_or_else(|| "<anonymous>".into()))
                .finish(),
        }
    }
}

/// Success continuation handed to an async bridge method.
pub type SuccessCallback = Box<dyn FnOnce(NativePayload) + Send>;

/// Failure continuation handed to an async bridge method.
pub type ErrorCallback = Box<dyn FnOnce(RawError) + Send>;

/// The ambient bridge object.
///
/// A host may expose any subset of namespaces. A missing namespace is a
/// normal, recoverable condition and is reported as `None`.
pub trait Bridge: Send + Sync {
    /// Look up a capability namespace by name (e.g. `"camera"`, `"video"`).
    fn namespace(&self, name: &str) -> Option<Arc<dyn Namespace>>;

    /// Names of every namespace this host exposes.
    fn namespaces(&self) -> Vec<String> {
        Vec::new()
    }
}

/// One capability namespace of the bridge.
///
/// Namespaces mix three calling conventions, mirrored one-to-one here:
/// synchronous constructors/getters ([`construct`](Namespace::construct)),
/// asynchronous methods that complete through a pair of callbacks
/// ([`invoke`](Namespace::invoke)), and plain property reads
/// ([`property`](Namespace::property)).
///
/// # Callback contract
///
/// A well-behaved host calls at most one of `on_success`/`on_error`, at most
/// once. The adapter layer does not rely on this: it guarantees single
/// delivery on its own side. Returning `Err` from `invoke` models a host
/// that throws before registering any callback.
pub trait Namespace: Send + Sync {
    /// Namespace name as exposed by the host.
    fn name(&self) -> &str;

    /// Synchronously construct (or fetch) a live native object.
    fn construct(
        &self,
        constructor: &str,
        args: &[Value],
    ) -> Result<Arc<dyn NativeObject>, RawError>;

    /// Start an asynchronous method following the `(args…, success, error)`
    /// convention.
    fn invoke(
        &self,
        method: &str,
        args: Vec<Value>,
        on_success: SuccessCallback,
        on_error: ErrorCallback,
    ) -> Result<(), RawError>;

    /// Read a plain synchronous property of the namespace.
    fn property(&self, name: &str) -> Result<Value, RawError>;
}
