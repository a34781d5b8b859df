//! # Callback Identity Map
//!
//! Native objects remove listeners by identity, but the adapter never hands
//! the caller's function to the host directly: it registers a wrapper that
//! normalizes the event payload first. This map remembers which wrapper
//! belongs to which `(owner, event type, caller listener)` triple, so a later
//! removal can hand the host the exact wrapper it was given.
//!
//! Caller listeners are compared by `Arc` data pointer. The map keeps a
//! clone of every bound `Arc`, so a pointer can't be reused while its
//! binding exists.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bridge_traits::{BridgeError, NativeListener};
use core_runtime::events::{BindingEvent, EventBus, LifecycleEvent};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::handle::HandleId;

/// An event delivered to a caller listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerEvent {
    /// Handle the event was raised on
    pub owner: HandleId,
    pub event_type: String,
    /// Always a JSON object, see [`normalize_payload`]
    pub payload: Value,
}

impl ListenerEvent {
    /// Reads a field of the payload.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// Caller-side listener.
pub type Listener = Arc<dyn Fn(ListenerEvent) + Send + Sync>;

/// Wraps a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(ListenerEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Brings a native event payload into object form.
///
/// - `null` becomes `{}`
/// - an object is kept
/// - a string holding a JSON object is parsed
/// - anything else becomes `{"value": …}`
pub fn normalize_payload(payload: Value) -> Value {
    match payload {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => payload,
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => wrap_value(Value::String(text)),
        },
        other => wrap_value(other),
    }
}

fn wrap_value(value: Value) -> Value {
    let mut map = Map::new();
    map.insert("value".to_string(), value);
    Value::Object(map)
}

fn listener_key(listener: &Listener) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindingKey {
    owner: HandleId,
    event_type: String,
    listener: usize,
}

struct Binding {
    // Keeps the pointer in `BindingKey::listener` alive.
    _original: Listener,
    wrapped: NativeListener,
}

/// Map from caller listeners to the wrappers registered with the host.
pub struct CallbackIdentityMap {
    bindings: Mutex<HashMap<BindingKey, Binding>>,
    events: EventBus,
}

impl CallbackIdentityMap {
    pub fn new(events: EventBus) -> Self {
        Self {
            bindings: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BindingKey, Binding>> {
        self.bindings.lock()
    }

    fn key(owner: &HandleId, event_type: &str, listener: &Listener) -> BindingKey {
        BindingKey {
            owner: owner.clone(),
            event_type: event_type.to_string(),
            listener: listener_key(listener),
        }
    }

    /// Creates and remembers the wrapper for a caller listener.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty event type
    /// - `AlreadyExists` if the triple is already bound
    pub fn bind(
        &self,
        owner: &HandleId,
        event_type: &str,
        original: &Listener,
    ) -> Result<NativeListener, BridgeError> {
        if event_type.trim().is_empty() {
            return Err(BridgeError::InvalidArgument(
                "event type must not be empty".to_string(),
            ));
        }

        let key = Self::key(owner, event_type, original);
        let wrapped = {
            let mut bindings = self.lock();
            if bindings.contains_key(&key) {
                return Err(BridgeError::AlreadyExists(format!(
                    "listener for '{event_type}' is already bound on {owner}"
                )));
            }

            let wrapped = wrap(owner.clone(), event_type.to_string(), Arc::clone(original));
            bindings.insert(
                key,
                Binding {
                    _original: Arc::clone(original),
                    wrapped: Arc::clone(&wrapped),
                },
            );
            wrapped
        };

        debug!(handle_id = %owner, event_type, "Listener bound");
        self.events.emit(LifecycleEvent::Binding(BindingEvent::Bound {
            handle_id: owner.to_string(),
            event_type: event_type.to_string(),
        }));

        Ok(wrapped)
    }

    /// Forgets a binding and returns the exact wrapper [`bind`](Self::bind)
    /// created for it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the triple was never bound or is already unbound.
    pub fn unbind(
        &self,
        owner: &HandleId,
        event_type: &str,
        original: &Listener,
    ) -> Result<NativeListener, BridgeError> {
        let key = Self::key(owner, event_type, original);
        let binding = self.lock().remove(&key).ok_or_else(|| {
            BridgeError::NotFound(format!(
                "no listener for '{event_type}' is bound on {owner}"
            ))
        })?;

        debug!(handle_id = %owner, event_type, "Listener unbound");
        self.events.emit(LifecycleEvent::Binding(BindingEvent::Unbound {
            handle_id: owner.to_string(),
            event_type: event_type.to_string(),
        }));

        Ok(binding.wrapped)
    }

    /// The wrapper bound for a triple, if any.
    pub fn lookup(
        &self,
        owner: &HandleId,
        event_type: &str,
        original: &Listener,
    ) -> Option<NativeListener> {
        self.lock()
            .get(&Self::key(owner, event_type, original))
            .map(|binding| Arc::clone(&binding.wrapped))
    }

    pub fn contains(&self, owner: &HandleId, event_type: &str, original: &Listener) -> bool {
        self.lookup(owner, event_type, original).is_some()
    }

    /// Drops every binding of `owner` and returns `(event type, wrapper)`
    /// pairs so the caller can detach them from the native object.
    pub fn release_owner(&self, owner: &HandleId) -> Vec<(String, NativeListener)> {
        let released: Vec<(String, NativeListener)> = {
            let mut bindings = self.lock();
            let keys: Vec<BindingKey> = bindings
                .keys()
                .filter(|key| &key.owner == owner)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| {
                    bindings
                        .remove(&key)
                        .map(|binding| (key.event_type, binding.wrapped))
                })
                .collect()
        };

        if !released.is_empty() {
            debug!(handle_id = %owner, count = released.len(), "Owner listeners released");
            self.events.emit(LifecycleEvent::Binding(BindingEvent::Released {
                handle_id: owner.to_string(),
                count: released.len(),
            }));
        }

        released
    }

    /// Total number of live bindings.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live bindings owned by `owner`.
    pub fn count_for(&self, owner: &HandleId) -> usize {
        self.lock().keys().filter(|key| &key.owner == owner).count()
    }
}

fn wrap(owner: HandleId, event_type: String, original: Listener) -> NativeListener {
    Arc::new(move |payload: Value| {
        original(ListenerEvent {
            owner: owner.clone(),
            event_type: event_type.clone(),
            payload: normalize_payload(payload),
        })
    })
}

impl fmt::Debug for CallbackIdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackIdentityMap")
            .field("bindings", &self.len())
            .finish()
    }
}
