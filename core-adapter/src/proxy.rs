//! Property forwarding for wrapped native objects.

use std::sync::Arc;

use bridge_traits::BridgeError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::handle::Handle;
use crate::normalize::guarded;

/// Forwards a fixed set of property names to the native object of a handle.
///
/// Reads go to `native[name]`, writes to `native[name] = value`. Names
/// outside the declared set fail with `InvalidArgument`; every access fails
/// with `Destroyed` once the handle is gone.
#[derive(Debug, Clone)]
pub struct PropertyProxy {
    handle: Arc<Handle>,
    properties: &'static [&'static str],
}

impl PropertyProxy {
    pub fn new(handle: Arc<Handle>, properties: &'static [&'static str]) -> Self {
        Self { handle, properties }
    }

    pub fn handle(&self) -> &Arc<Handle> {
        &self.handle
    }

    pub fn declared(&self) -> &'static [&'static str] {
        self.properties
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.properties.contains(&name)
    }

    fn check(&self, name: &str) -> Result<(), BridgeError> {
        self.handle.ensure_active()?;
        if self.is_declared(name) {
            Ok(())
        } else {
            Err(BridgeError::InvalidArgument(format!(
                "'{name}' is not a property of {}",
                self.handle.kind()
            )))
        }
    }

    pub fn get(&self, name: &str) -> Result<Value, BridgeError> {
        self.check(name)?;
        let native = self.handle.native()?;
        guarded(&format!("failed to read '{name}'"), || native.get_property(name))
    }

    /// Reads a property and deserializes it.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, BridgeError> {
        let value = self.get(name)?;
        serde_json::from_value(value).map_err(|e| {
            BridgeError::InvalidArgument(format!("property '{name}' has an unexpected type: {e}"))
        })
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), BridgeError> {
        self.check(name)?;
        let native = self.handle.native()?;
        let value = value.into();
        guarded(&format!("failed to write '{name}'"), || native.set_property(name, value))
    }

    /// Reads every declared property into one object.
    pub fn snapshot(&self) -> Result<Map<String, Value>, BridgeError> {
        let mut snapshot = Map::new();
        for name in self.properties {
            snapshot.insert((*name).to_string(), self.get(name)?);
        }
        Ok(snapshot)
    }

    /// Calls a synchronous native method on the proxied object.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value, BridgeError> {
        let native = self.handle.native()?;
        guarded(&format!("{method} failed"), || native.call(method, args))
    }
}
