//! Live native objects handed out by the bridge.

use std::sync::Arc;

use serde_json::Value;

use crate::bridge::{ErrorCallback, SuccessCallback};
use crate::error::RawError;

/// Listener function as registered with a native object.
///
/// Identity is pointer identity of the `Arc`: removing a listener requires
/// the very same `Arc` that was added.
pub type NativeListener = Arc<dyn Fn(Value) + Send + Sync>;

/// A native object instance (bitmap, view, player, dialog, …).
///
/// Wrappers never mutate a native object's shape; they hold an `Arc` to it
/// and route every access through these methods.
pub trait NativeObject: Send + Sync {
    /// Identifier the host assigned to the object, if any.
    fn native_id(&self) -> Option<String> {
        None
    }

    /// Read a property (`native[name]`).
    fn get_property(&self, name: &str) -> Result<Value, RawError>;

    /// Write a property (`native[name] = value`).
    fn set_property(&self, name: &str, value: Value) -> Result<(), RawError>;

    /// Call a synchronous method.
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, RawError>;

    /// Start an asynchronous method following the `(args…, success, error)`
    /// convention.
    fn invoke(
        &self,
        method: &str,
        args: Vec<Value>,
        on_success: SuccessCallback,
        on_error: ErrorCallback,
    ) -> Result<(), RawError>;

    /// Register a listener for a native event.
    fn add_event_listener(&self, event_type: &str, listener: NativeListener)
        -> Result<(), RawError>;

    /// Remove a previously registered listener by identity.
    fn remove_event_listener(
        &self,
        event_type: &str,
        listener: &NativeListener,
    ) -> Result<(), RawError>;

    /// Release the native resources (`close()` / `recycle()`).
    fn close(&self) -> Result<(), RawError>;
}

/// Compares two native listeners by identity.
///
/// Only the data pointer is compared; vtable pointers for the same closure
/// type are not guaranteed to be unique.
pub fn same_listener(a: &NativeListener, b: &NativeListener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
