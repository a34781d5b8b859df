//! Simulated capability namespace.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bridge_traits::{ErrorCallback, Namespace, NativeObject, RawError, SuccessCallback};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use crate::completion::{fixed, Completion, Parked, Script};
use crate::object::SimObject;

type Constructor = Arc<dyn Fn(&[Value]) -> Result<SimObject, RawError> + Send + Sync>;

/// One capability namespace of a [`SimBridge`](crate::SimBridge).
///
/// Every object it constructs is kept, so tests can reach the native side
/// of a handle (to emit events, inspect listeners, check teardown).
pub struct SimNamespace {
    name: String,
    constructors: RwLock<HashMap<String, Constructor>>,
    methods: RwLock<HashMap<String, Script>>,
    properties: RwLock<HashMap<String, Value>>,
    created: Mutex<Vec<Arc<SimObject>>>,
    invocations: Mutex<Vec<String>>,
    parked: Parked,
}

impl SimNamespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
            properties: RwLock::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
            parked: Parked::default(),
        }
    }

    /// Adds a constructor built by `factory`.
    pub fn with_constructor<F>(self, name: &str, factory: F) -> Self
    where
        F: Fn(&[Value]) -> Result<SimObject, RawError> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Adds a constructor whose first string argument becomes the native id.
    pub fn with_default_constructor(self, name: &str) -> Self {
        self.with_constructor(name, |args| {
            Ok(match args.first().and_then(Value::as_str) {
                Some(id) => SimObject::new(id),
                None => SimObject::anonymous(),
            })
        })
    }

    /// Adds an asynchronous method that always answers with `completion`.
    pub fn with_method(self, name: &str, completion: Completion) -> Self {
        self.set_method(name, fixed(completion));
        self
    }

    /// Adds an asynchronous method whose answer depends on the arguments.
    pub fn with_method_fn<F>(self, name: &str, script: F) -> Self
    where
        F: Fn(&[Value]) -> Completion + Send + Sync + 'static,
    {
        self.set_method(name, Arc::new(script));
        self
    }

    pub fn with_property(self, name: &str, value: Value) -> Self {
        self.properties
            .write()
            .insert(name.to_string(), value);
        self
    }

    /// Replaces an asynchronous method after the namespace was installed.
    pub fn set_method(&self, name: &str, script: Script) {
        self.methods
            .write()
            .insert(name.to_string(), script);
    }

    /// Replaces an asynchronous method with a fixed answer.
    pub fn replace_method(&self, name: &str, completion: Completion) {
        self.set_method(name, fixed(completion));
    }

    /// Keeps `object` as if this namespace had created it.
    pub(crate) fn track(&self, object: Arc<SimObject>) {
        self.created
            .lock()
            .push(object);
    }

    /// Every object constructed so far, oldest first.
    pub fn created(&self) -> Vec<Arc<SimObject>> {
        self.created
            .lock()
            .clone()
    }

    pub fn last_created(&self) -> Option<Arc<SimObject>> {
        self.created
            .lock()
            .last()
            .cloned()
    }

    /// Names of the asynchronous methods invoked so far, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations
            .lock()
            .clone()
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Drops the parked callbacks of `Completion::Never` calls.
    pub fn release_parked(&self) -> usize {
        self.parked.release()
    }
}

impl Namespace for SimNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    fn construct(&self, constructor: &str, args: &[Value]) -> Result<Arc<dyn NativeObject>, RawError> {
        let factory = self
            .constructors
            .read()
            .get(constructor)
            .cloned()
            .ok_or_else(|| {
                RawError::Thrown(format!("{}.{constructor} is not a constructor", self.name))
            })?;

        let object = Arc::new(factory(args)?);
        self.track(Arc::clone(&object));
        debug!(namespace = %self.name, constructor, "Simulated object constructed");
        Ok(object)
    }

    fn invoke(
        &self,
        method: &str,
        args: Vec<Value>,
        on_success: SuccessCallback,
        on_error: ErrorCallback,
    ) -> Result<(), RawError> {
        let script = self
            .methods
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| RawError::Thrown(format!("{}.{method} is not a function", self.name)))?;

        self.invocations
            .lock()
            .push(method.to_string());

        let completion = script(&args);
        if let Completion::SucceedWith(object) = &completion {
            self.track(Arc::clone(object));
        }
        completion.run(on_success, on_error, &self.parked)
    }

    fn property(&self, name: &str) -> Result<Value, RawError> {
        Ok(self
            .properties
            .read()
            .get(name)
            .cloned()
            .unwrap_or(Value::Null))
    }
}

impl fmt::Debug for SimNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimNamespace")
            .field("name", &self.name)
            .field("created", &self.created().len())
            .finish()
    }
}
