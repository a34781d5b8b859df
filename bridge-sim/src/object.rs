//! Simulated native object.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bridge_traits::{
    same_listener, ErrorCallback, NativeListener, NativeObject, RawError, SuccessCallback,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, trace};

use crate::completion::{fixed, Completion, Parked, Script};

/// Scripted synchronous method.
pub type SyncMethod = Arc<dyn Fn(&[Value]) -> Result<Value, RawError> + Send + Sync>;

/// In-memory native object.
///
/// Properties live in a plain map; listeners are kept per event type and
/// removed by identity, like a real host does.
pub struct SimObject {
    native_id: Option<String>,
    properties: Mutex<HashMap<String, Value>>,
    methods: RwLock<HashMap<String, SyncMethod>>,
    async_methods: RwLock<HashMap<String, Script>>,
    listeners: Mutex<HashMap<String, Vec<NativeListener>>>,
    close_failure: Mutex<Option<RawError>>,
    closed: AtomicBool,
    close_count: AtomicUsize,
    parked: Parked,
}

impl SimObject {
    /// Object with a host id, also exposed as the `id` property.
    pub fn new(native_id: impl Into<String>) -> Self {
        let native_id = native_id.into();
        let object = Self::build(Some(native_id.clone()));
        object.put("id", Value::String(native_id));
        object
    }

    /// Object without a host id.
    pub fn anonymous() -> Self {
        Self::build(None)
    }

    fn build(native_id: Option<String>) -> Self {
        Self {
            native_id,
            properties: Mutex::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
            async_methods: RwLock::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            close_failure: Mutex::new(None),
            closed: AtomicBool::new(false),
            close_count: AtomicUsize::new(0),
            parked: Parked::default(),
        }
    }

    pub(crate) fn native_id_str(&self) -> Option<&str> {
        self.native_id.as_deref()
    }

    fn put(&self, name: &str, value: Value) {
        self.properties
            .lock()
            .insert(name.to_string(), value);
    }

    pub fn with_property(self, name: &str, value: Value) -> Self {
        self.put(name, value);
        self
    }

    /// Adds a synchronous method.
    pub fn with_method<F>(self, name: &str, method: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RawError> + Send + Sync + 'static,
    {
        self.methods
            .write()
            .insert(name.to_string(), Arc::new(method));
        self
    }

    /// Adds an asynchronous method that always answers with `completion`.
    pub fn with_async_method(self, name: &str, completion: Completion) -> Self {
        self.set_async_method(name, fixed(completion));
        self
    }

    /// Adds an asynchronous method whose answer depends on the arguments.
    pub fn with_async_method_fn<F>(self, name: &str, script: F) -> Self
    where
        F: Fn(&[Value]) -> Completion + Send + Sync + 'static,
    {
        self.set_async_method(name, Arc::new(script));
        self
    }

    /// Replaces an asynchronous method on a live object.
    pub fn set_async_method(&self, name: &str, script: Script) {
        self.async_methods
            .write()
            .insert(name.to_string(), script);
    }

    /// Makes `close()` fail with `error`. The object is still marked closed.
    pub fn with_close_failure(self, error: RawError) -> Self {
        *self
            .close_failure
            .lock() = Some(error);
        self
    }

    /// Raises `event_type` with `payload`. Returns the number of listeners
    /// called.
    pub fn emit(&self, event_type: &str, payload: Value) -> usize {
        let listeners: Vec<NativeListener> = self
            .listeners
            .lock()
            .get(event_type)
            .cloned()
            .unwrap_or_default();

        trace!(event_type, listeners = listeners.len(), "Simulated event emitted");
        for listener in &listeners {
            listener(payload.clone());
        }
        listeners.len()
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .lock()
            .get(event_type)
            .map_or(0, Vec::len)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners
            .lock()
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Acquire)
    }

    /// Calls answered with `Completion::Never` that are still waiting.
    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Answers every parked call with `value`.
    pub fn resolve_parked(&self, value: Value) -> usize {
        self.parked.resolve_all(value)
    }

    /// Reads a property without going through the trait.
    pub fn property(&self, name: &str) -> Option<Value> {
        self.properties
            .lock()
            .get(name)
            .cloned()
    }

    fn ensure_open(&self) -> Result<(), RawError> {
        if self.is_closed() {
            Err(RawError::Message("native object is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl NativeObject for SimObject {
    fn native_id(&self) -> Option<String> {
        self.native_id.clone()
    }

    fn get_property(&self, name: &str) -> Result<Value, RawError> {
        Ok(self.property(name).unwrap_or(Value::Null))
    }

    fn set_property(&self, name: &str, value: Value) -> Result<(), RawError> {
        self.ensure_open()?;
        self.put(name, value);
        Ok(())
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, RawError> {
        self.ensure_open()?;
        let script = self
            .methods
            .read()
            .get(method)
            .cloned();
        match script {
            Some(script) => script(args),
            None => Err(RawError::Thrown(format!("{method} is not a function"))),
        }
    }

    fn invoke(
        &self,
        method: &str,
        args: Vec<Value>,
        on_success: SuccessCallback,
        on_error: ErrorCallback,
    ) -> Result<(), RawError> {
        self.ensure_open()?;
        let script = self
            .async_methods
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| RawError::Thrown(format!("{method} is not a function")))?;

        script(&args).run(on_success, on_error, &self.parked)
    }

    fn add_event_listener(&self, event_type: &str, listener: NativeListener) -> Result<(), RawError> {
        self.ensure_open()?;
        self.listeners
            .lock()
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
        Ok(())
    }

    fn remove_event_listener(
        &self,
        event_type: &str,
        listener: &NativeListener,
    ) -> Result<(), RawError> {
        let mut listeners = self.listeners.lock();
        if let Some(registered) = listeners.get_mut(event_type) {
            registered.retain(|candidate| !same_listener(candidate, listener));
            if registered.is_empty() {
                listeners.remove(event_type);
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<(), RawError> {
        self.close_count.fetch_add(1, Ordering::AcqRel);
        self.closed.store(true, Ordering::Release);
        self.listeners
            .lock()
            .clear();
        debug!(native_id = ?self.native_id, "Simulated object closed");

        match self
            .close_failure
            .lock()
            .clone()
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for SimObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimObject")
            .field("native_id", &self.native_id)
            .field("closed", &self.is_closed())
            .field("listeners", &self.total_listeners())
            .finish()
    }
}
