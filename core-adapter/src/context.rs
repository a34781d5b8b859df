//! # Bridge Context
//!
//! Composition root of the adapter layer. One context owns the ambient
//! bridge, one [`HandleRegistry`], one [`CallbackIdentityMap`] and the
//! lifecycle [`EventBus`]; capability modules share it through an `Arc`.
//! Tests build their own context instead of touching process-wide state.
//!
//! ```ignore
//! use core_adapter::{BridgeContext, HandleKind};
//! use core_runtime::config::AdapterConfig;
//!
//! let ctx = Arc::new(BridgeContext::new(
//!     AdapterConfig::builder().bridge(host_bridge).build()?,
//! ));
//! let bitmap = ctx.construct("nativeObj", "Bitmap", &[json!("b1")], HandleKind::Bitmap)?;
//! let saved = ctx.handle_call(&bitmap, "save", payload_value).call(vec![json!("_doc/b1.png")]).await?;
//! ctx.destroy(&bitmap);
//! ```

use std::sync::Arc;

use bridge_traits::{Bridge, BridgeError, ErrorCode, Namespace, NativePayload, RawError};
use core_async::time::Duration;
use core_runtime::config::{AdapterConfig, ListenerRemovalPolicy};
use core_runtime::events::{EventBus, LifecycleEvent, Receiver};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::dual_mode::{Claims, DualModeAdapter};
use crate::handle::{Handle, HandleKind};
use crate::listeners::{CallbackIdentityMap, Listener, ListenerEvent};
use crate::normalize::guarded;
use crate::proxy::PropertyProxy;
use crate::registry::{DestroyReport, HandleRegistry};
use crate::wait;

/// Shared state of every capability module.
pub struct BridgeContext {
    config: AdapterConfig,
    registry: Arc<HandleRegistry>,
    listeners: CallbackIdentityMap,
    events: EventBus,
}

impl BridgeContext {
    /// Builds a context from a validated configuration.
    pub fn new(config: AdapterConfig) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        let registry = Arc::new(HandleRegistry::from_config(&config, events.clone()));
        let listeners = CallbackIdentityMap::new(events.clone());

        debug!(has_bridge = config.has_bridge(), "Bridge context created");

        Self {
            config,
            registry,
            listeners,
            events,
        }
    }

    /// Context over `bridge` with default settings.
    pub fn with_bridge(bridge: Arc<dyn Bridge>) -> Self {
        Self::new(AdapterConfig {
            bridge: Some(bridge),
            ..AdapterConfig::default()
        })
    }

    /// Context for a host without a bridge. Every capability reports
    /// unsupported.
    pub fn without_bridge() -> Self {
        Self::new(AdapterConfig::default())
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn listeners(&self) -> &CallbackIdentityMap {
        &self.listeners
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Resolves a capability namespace.
    ///
    /// # Errors
    ///
    /// `EnvironmentUnavailable` when the bridge or the namespace is missing.
    pub fn namespace(&self, name: &str) -> Result<Arc<dyn Namespace>, BridgeError> {
        resolve_namespace(self.config.bridge.as_ref(), name)
    }

    /// Whether the bridge exposes `namespace`.
    pub fn is_supported(&self, namespace: &str) -> bool {
        self.namespace(namespace).is_ok()
    }

    /// Creates a native object with a synchronous constructor and registers
    /// it under `kind`.
    #[instrument(skip(self, args, kind), fields(kind = %kind))]
    pub fn construct(
        &self,
        namespace: &str,
        constructor: &str,
        args: &[Value],
        kind: HandleKind,
    ) -> Result<Arc<Handle>, BridgeError> {
        let ns = self.namespace(namespace)?;
        let native = guarded(&format!("{namespace}.{constructor} failed"), || {
            ns.construct(constructor, args)
        })?;
        Ok(self.registry.register(kind, native))
    }

    /// Adapter for an asynchronous namespace method.
    ///
    /// The namespace is resolved on every call, so a missing bridge fails
    /// the call with `EnvironmentUnavailable` rather than the construction.
    pub fn namespace_call<T, C>(&self, namespace: &str, method: &str, convert: C) -> DualModeAdapter<T>
    where
        T: Send + 'static,
        C: Fn(NativePayload) -> Result<T, BridgeError> + Send + Sync + 'static,
    {
        self.namespace_adapter(namespace, method, move |payload, _claims: &Claims| convert(payload))
    }

    fn namespace_adapter<T, C>(&self, namespace: &str, method: &str, convert: C) -> DualModeAdapter<T>
    where
        T: Send + 'static,
        C: Fn(NativePayload, &Claims) -> Result<T, BridgeError> + Send + Sync + 'static,
    {
        let bridge = self.config.bridge.clone();
        let ns_name = namespace.to_string();
        let method_name = method.to_string();

        DualModeAdapter::claiming(
            format!("{namespace}.{method}"),
            move |args, on_success, on_error| {
                let ns = resolve_namespace(bridge.as_ref(), &ns_name).map_err(RawError::Normalized)?;
                ns.invoke(&method_name, args, on_success, on_error)
            },
            convert,
        )
    }

    /// Adapter for an asynchronous namespace method that hands back a new
    /// native object, registered under `kind` on success.
    ///
    /// If the caller stopped waiting (the future was dropped or timed out)
    /// the new handle is destroyed instead of being left without an owner.
    pub fn fetch_handle(&self, namespace: &str, method: &str, kind: HandleKind) -> DualModeAdapter<Arc<Handle>> {
        let registry = Arc::clone(&self.registry);
        self.namespace_adapter(namespace, method, move |payload, claims: &Claims| {
            let native = payload.into_object().ok_or_else(|| BridgeError::OperationFailed {
                code: ErrorCode::OperationFailed.as_i64(),
                message: format!("expected a native {kind}, received data"),
            })?;
            let handle = registry.register(kind.clone(), native);
            claims.claim(&registry, &handle);
            Ok(handle)
        })
    }

    /// Adapter for an asynchronous method of a registered handle.
    ///
    /// Calls on a destroyed handle fail with `Destroyed`; answers arriving
    /// after the handle was destroyed are dropped.
    pub fn handle_call<T, C>(&self, handle: &Arc<Handle>, method: &str, convert: C) -> DualModeAdapter<T>
    where
        T: Send + 'static,
        C: Fn(NativePayload) -> Result<T, BridgeError> + Send + Sync + 'static,
    {
        let target = Arc::clone(handle);
        let method_name = method.to_string();

        DualModeAdapter::new(
            format!("{}.{method}", handle.kind()),
            move |args, on_success, on_error| {
                let native = target.native().map_err(RawError::Normalized)?;
                native.invoke(&method_name, args, on_success, on_error)
            },
            convert,
        )
        .bound_to(&self.registry, handle, self.events.clone())
    }

    /// Calls a synchronous method of a registered handle.
    ///
    /// # Errors
    ///
    /// `Destroyed` if the handle is gone, otherwise the normalized host
    /// error.
    pub fn call_sync(&self, handle: &Handle, method: &str, args: &[Value]) -> Result<Value, BridgeError> {
        let native = handle.native()?;
        guarded(&format!("{}.{method} failed", handle.kind()), || {
            native.call(method, args)
        })
    }

    /// Property forwarding for a registered handle.
    pub fn proxy(&self, handle: &Arc<Handle>, properties: &'static [&'static str]) -> PropertyProxy {
        PropertyProxy::new(Arc::clone(handle), properties)
    }

    /// Registers `listener` for `event_type` on the handle's native object.
    ///
    /// # Errors
    ///
    /// - `Destroyed` if the handle is gone
    /// - `AlreadyExists` if this listener is already registered for the event
    /// - the normalized host error if the native registration fails
    pub fn add_listener(
        &self,
        handle: &Arc<Handle>,
        event_type: &str,
        listener: &Listener,
    ) -> Result<(), BridgeError> {
        let native = handle.native()?;
        let wrapped = self.listeners.bind(handle.id(), event_type, listener)?;

        let attached = guarded(&format!("failed to add '{event_type}' listener"), || {
            native.add_event_listener(event_type, Arc::clone(&wrapped))
        });
        if let Err(error) = attached {
            // The host never saw the wrapper.
            let _ = self.listeners.unbind(handle.id(), event_type, listener);
            return Err(error);
        }
        Ok(())
    }

    /// Removes a listener added with [`add_listener`](Self::add_listener),
    /// identified by the same `Arc`.
    ///
    /// # Errors
    ///
    /// - `Destroyed` if the handle is gone
    /// - `NotFound` if the listener is not registered, unless the context
    ///   uses [`ListenerRemovalPolicy::Lenient`]
    pub fn remove_listener(
        &self,
        handle: &Arc<Handle>,
        event_type: &str,
        listener: &Listener,
    ) -> Result<(), BridgeError> {
        let native = handle.native()?;
        let wrapped = match self.listeners.unbind(handle.id(), event_type, listener) {
            Ok(wrapped) => wrapped,
            Err(error)
                if error.error_code() == ErrorCode::NotFound
                    && self.config.listener_removal == ListenerRemovalPolicy::Lenient =>
            {
                debug!(handle_id = %handle.id(), event_type, "Removal of unknown listener ignored");
                return Ok(());
            }
            Err(error) => return Err(error),
        };

        guarded(&format!("failed to remove '{event_type}' listener"), || {
            native.remove_event_listener(event_type, &wrapped)
        })
    }

    /// Waits for one `event_type` event on the handle.
    ///
    /// `deadline` defaults to the configured wait timeout. The temporary
    /// listener is removed whichever way the wait ends.
    pub async fn wait_for_event(
        &self,
        handle: &Arc<Handle>,
        event_type: &str,
        deadline: Option<Duration>,
    ) -> Result<ListenerEvent, BridgeError> {
        let deadline = deadline.unwrap_or(self.config.default_wait_timeout);
        wait::wait_for_event(self, handle, event_type, deadline, |_| true).await
    }

    /// Like [`wait_for_event`](Self::wait_for_event), but only an event
    /// accepted by `predicate` ends the wait.
    pub async fn wait_for_event_matching<P>(
        &self,
        handle: &Arc<Handle>,
        event_type: &str,
        deadline: Option<Duration>,
        predicate: P,
    ) -> Result<ListenerEvent, BridgeError>
    where
        P: Fn(&ListenerEvent) -> bool + Send + Sync + 'static,
    {
        let deadline = deadline.unwrap_or(self.config.default_wait_timeout);
        wait::wait_for_event(self, handle, event_type, deadline, predicate).await
    }

    /// Destroys one handle and releases its listeners. Returns `false` if it
    /// was already destroyed.
    pub fn destroy(&self, handle: &Handle) -> bool {
        self.registry
            .destroy_with(handle.kind(), handle.id(), |h| self.release_listeners(h))
    }

    /// Destroys every handle of `kind`.
    pub fn destroy_all(&self, kind: &HandleKind) -> DestroyReport {
        self.registry
            .destroy_all_with(kind, |h| self.release_listeners(h))
    }

    /// Destroys every handle of every kind.
    pub fn clear_all_active_objects(&self) -> DestroyReport {
        let report = self
            .registry
            .destroy_everything_with(|h| self.release_listeners(h));
        debug!(
            destroyed = report.destroyed_count(),
            failures = report.failures.len(),
            "Cleared all active objects"
        );
        report
    }

    fn release_listeners(&self, handle: &Handle) {
        let native = handle.native_unchecked();
        for (event_type, wrapped) in self.listeners.release_owner(handle.id()) {
            let detached = guarded("failed to detach listener", || {
                native.remove_event_listener(&event_type, &wrapped)
            });
            if let Err(error) = detached {
                debug!(
                    handle_id = %handle.id(),
                    event_type = %event_type,
                    error = %error,
                    "Listener detach failed during destroy"
                );
            }
        }
    }
}

fn resolve_namespace(bridge: Option<&Arc<dyn Bridge>>, name: &str) -> Result<Arc<dyn Namespace>, BridgeError> {
    let bridge = bridge.ok_or_else(|| BridgeError::environment_unavailable("the native bridge"))?;
    bridge
        .namespace(name)
        .ok_or_else(|| BridgeError::environment_unavailable(format!("namespace '{name}'")))
}

impl std::fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeContext")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("listeners", &self.listeners)
            .finish()
    }
}
