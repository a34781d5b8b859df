//! # Handle Registry
//!
//! One table per [`HandleKind`], keyed by [`HandleId`]. The registry is the
//! only place that decides whether a handle is alive: an entry exists
//! exactly while its handle is Active.
//!
//! Removal and the Destroyed transition happen together under the write
//! lock, so [`HandleRegistry::get`] can never observe a destroyed handle.
//! The native teardown runs afterwards, outside the lock, so a host that
//! re-enters the registry from `close()` cannot deadlock it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::{BridgeError, Clock, NativeObject};
use core_runtime::config::AdapterConfig;
use core_runtime::events::{EventBus, HandleEvent, LifecycleEvent};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::handle::{Handle, HandleId, HandleKind};
use crate::normalize::guarded;

type KindTable = HashMap<HandleId, Arc<Handle>>;

/// A teardown that failed while its handle was destroyed anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub id: HandleId,
    pub kind: HandleKind,
    pub error: BridgeError,
}

/// Outcome of a bulk destroy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestroyReport {
    /// Every handle that left the registry, in registration order.
    pub destroyed: Vec<HandleId>,
    /// Teardowns that failed. Their handles are still in `destroyed`.
    pub failures: Vec<TeardownFailure>,
}

impl DestroyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed.len()
    }

    pub fn merge(&mut self, other: DestroyReport) {
        self.destroyed.extend(other.destroyed);
        self.failures.extend(other.failures);
    }
}

/// Registry of live native resources.
pub struct HandleRegistry {
    tables: RwLock<HashMap<HandleKind, KindTable>>,
    sequence: AtomicU64,
    id_prefix: Option<String>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl HandleRegistry {
    pub fn new(clock: Arc<dyn Clock>, events: EventBus, id_prefix: Option<String>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            id_prefix,
            clock,
            events,
        }
    }

    pub fn from_config(config: &AdapterConfig, events: EventBus) -> Self {
        Self::new(Arc::clone(&config.clock), events, config.id_prefix.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<HandleKind, KindTable>> {
        self.tables.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<HandleKind, KindTable>> {
        self.tables.write()
    }

    /// Registers a native object and returns its handle, already Active.
    ///
    /// The generated id is unique within `kind` and has the shape
    /// `[prefix-]stem_millis_sequence_suffix`.
    pub fn register(&self, kind: HandleKind, native: Arc<dyn NativeObject>) -> Arc<Handle> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let created_at = self.clock.now();

        let handle = {
            let mut tables = self.write();
            let table = tables.entry(kind.clone()).or_default();

            let mut id = self.generate_id(&kind, created_at.timestamp_millis(), sequence);
            while table.contains_key(&id) {
                id = self.generate_id(&kind, created_at.timestamp_millis(), sequence);
            }

            let handle = Arc::new(Handle::new(id.clone(), kind.clone(), sequence, created_at, native));
            // Fresh lifecycle, activation cannot fail.
            let _ = handle.lifecycle().activate();
            table.insert(id, Arc::clone(&handle));
            handle
        };

        debug!(kind = %kind, handle_id = %handle.id(), "Handle registered");
        self.events.emit(LifecycleEvent::Handle(HandleEvent::Registered {
            kind: kind.to_string(),
            handle_id: handle.id().to_string(),
        }));

        handle
    }

    fn generate_id(&self, kind: &HandleKind, millis: i64, sequence: u64) -> HandleId {
        let suffix = Uuid::new_v4().simple().to_string();
        let suffix = &suffix[..6];
        let id = match &self.id_prefix {
            Some(prefix) => format!("{prefix}-{}_{millis:x}_{sequence}_{suffix}", kind.id_stem()),
            None => format!("{}_{millis:x}_{sequence}_{suffix}", kind.id_stem()),
        };
        HandleId::new(id)
    }

    /// Looks up an active handle. A miss is `None`, never an error.
    pub fn get(&self, kind: &HandleKind, id: &HandleId) -> Option<Arc<Handle>> {
        self.read()
            .get(kind)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Whether `id` still resolves under `kind`.
    pub fn contains(&self, kind: &HandleKind, id: &HandleId) -> bool {
        self.get(kind, id).is_some()
    }

    /// Destroys one handle. Returns `false` if it was not registered.
    pub fn destroy(&self, kind: &HandleKind, id: &HandleId) -> bool {
        self.destroy_with(kind, id, |_| {})
    }

    /// [`destroy`](Self::destroy) with a hook that runs after the handle
    /// left the registry and before the native teardown.
    pub fn destroy_with<F>(&self, kind: &HandleKind, id: &HandleId, before_teardown: F) -> bool
    where
        F: FnOnce(&Handle),
    {
        let Some(handle) = self.retire(kind, id) else {
            debug!(kind = %kind, handle_id = %id, "Destroy of unknown handle ignored");
            return false;
        };

        before_teardown(&handle);
        // A failed teardown has already been logged and published.
        let _ = self.teardown(&handle);
        true
    }

    fn retire(&self, kind: &HandleKind, id: &HandleId) -> Option<Arc<Handle>> {
        let mut tables = self.write();
        let table = tables.get_mut(kind)?;
        let handle = table.remove(id)?;
        if table.is_empty() {
            tables.remove(kind);
        }
        handle.lifecycle().destroy();
        Some(handle)
    }

    fn retire_kind(&self, kind: &HandleKind) -> Vec<Arc<Handle>> {
        let mut handles: Vec<Arc<Handle>> = self
            .write()
            .remove(kind)
            .map(|table| table.into_values().collect())
            .unwrap_or_default();

        for handle in &handles {
            handle.lifecycle().destroy();
        }
        handles.sort_by_key(|handle| handle.sequence());
        handles
    }

    /// Runs the native teardown, absorbing errors and panics.
    fn teardown(&self, handle: &Handle) -> Result<(), BridgeError> {
        let native = handle.native_unchecked();
        let error = guarded("native teardown failed", || native.close()).err();

        match error {
            None => {
                debug!(kind = %handle.kind(), handle_id = %handle.id(), "Handle destroyed");
                self.events.emit(LifecycleEvent::Handle(HandleEvent::Destroyed {
                    kind: handle.kind().to_string(),
                    handle_id: handle.id().to_string(),
                }));
                Ok(())
            }
            Some(error) => {
                warn!(
                    kind = %handle.kind(),
                    handle_id = %handle.id(),
                    error = %error,
                    "Native teardown failed, handle removed anyway"
                );
                self.events.emit(LifecycleEvent::Handle(HandleEvent::TeardownFailed {
                    kind: handle.kind().to_string(),
                    handle_id: handle.id().to_string(),
                    code: error.code(),
                    message: error.message().to_string(),
                }));
                Err(error)
            }
        }
    }

    /// Destroys every handle of `kind`. One failing teardown never stops
    /// the rest.
    pub fn destroy_all(&self, kind: &HandleKind) -> DestroyReport {
        self.destroy_all_with(kind, |_| {})
    }

    /// [`destroy_all`](Self::destroy_all) with a per-handle hook, see
    /// [`destroy_with`](Self::destroy_with).
    pub fn destroy_all_with<F>(&self, kind: &HandleKind, mut before_teardown: F) -> DestroyReport
    where
        F: FnMut(&Handle),
    {
        let mut report = DestroyReport::default();

        for handle in self.retire_kind(kind) {
            before_teardown(&handle);
            if let Err(error) = self.teardown(&handle) {
                report.failures.push(TeardownFailure {
                    id: handle.id().clone(),
                    kind: handle.kind().clone(),
                    error,
                });
            }
            report.destroyed.push(handle.id().clone());
        }

        if !report.destroyed.is_empty() {
            debug!(
                kind = %kind,
                destroyed = report.destroyed.len(),
                failures = report.failures.len(),
                "Destroyed all handles of kind"
            );
        }

        report
    }

    /// Destroys every handle of every kind.
    pub fn destroy_everything_with<F>(&self, mut before_teardown: F) -> DestroyReport
    where
        F: FnMut(&Handle),
    {
        let mut report = DestroyReport::default();
        for kind in self.kinds() {
            report.merge(self.destroy_all_with(&kind, &mut before_teardown));
        }
        report
    }

    /// Number of active handles of `kind`.
    pub fn active_count(&self, kind: &HandleKind) -> usize {
        self.read().get(kind).map_or(0, HashMap::len)
    }

    /// Ids of the active handles of `kind`, in registration order.
    pub fn active_ids(&self, kind: &HandleKind) -> Vec<HandleId> {
        let tables = self.read();
        let Some(table) = tables.get(kind) else {
            return Vec::new();
        };

        let mut handles: Vec<&Arc<Handle>> = table.values().collect();
        handles.sort_by_key(|handle| handle.sequence());
        handles.into_iter().map(|handle| handle.id().clone()).collect()
    }

    /// Kinds that currently have at least one active handle.
    pub fn kinds(&self) -> Vec<HandleKind> {
        let mut kinds: Vec<HandleKind> = self.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Total number of active handles across kinds.
    pub fn total_count(&self) -> usize {
        self.read().values().map(HashMap::len).sum()
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("kinds", &self.kinds())
            .field("total", &self.total_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{
        ErrorCallback, ErrorCode, FixedClock, NativeListener, RawError, SuccessCallback,
    };
    use chrono::{TimeZone, Utc};
    use core_runtime::events::EventStream;
    use mockall::mock;
    use serde_json::Value;

    mock! {
        pub Native {}

        impl NativeObject for Native {
            fn get_property(&self, name: &str) -> Result<Value, RawError>;
            fn set_property(&self, name: &str, value: Value) -> Result<(), RawError>;
            fn call(&self, method: &str, args: &[Value]) -> Result<Value, RawError>;
            fn invoke(
                &self,
                method: &str,
                args: Vec<Value>,
                on_success: SuccessCallback,
                on_error: ErrorCallback,
            ) -> Result<(), RawError>;
            fn add_event_listener(
                &self,
                event_type: &str,
                listener: NativeListener,
            ) -> Result<(), RawError>;
            fn remove_event_listener(
                &self,
                event_type: &str,
                listener: &NativeListener,
            ) -> Result<(), RawError>;
            fn close(&self) -> Result<(), RawError>;
        }
    }

    struct PanickingClose;

    impl NativeObject for PanickingClose {
        fn get_property(&self, _name: &str) -> Result<Value, RawError> {
            Ok(Value::Null)
        }
        fn set_property(&self, _name: &str, _value: Value) -> Result<(), RawError> {
            Ok(())
        }
        fn call(&self, _method: &str, _args: &[Value]) -> Result<Value, RawError> {
            Ok(Value::Null)
        }
        fn invoke(
            &self,
            _method: &str,
            _args: Vec<Value>,
            _on_success: SuccessCallback,
            _on_error: ErrorCallback,
        ) -> Result<(), RawError> {
            Ok(())
        }
        fn add_event_listener(&self, _event_type: &str, _listener: NativeListener) -> Result<(), RawError> {
            Ok(())
        }
        fn remove_event_listener(
            &self,
            _event_type: &str,
            _listener: &NativeListener,
        ) -> Result<(), RawError> {
            Ok(())
        }
        fn close(&self) -> Result<(), RawError> {
            panic!("native teardown exploded")
        }
    }

    fn registry() -> HandleRegistry {
        HandleRegistry::new(Arc::new(bridge_traits::SystemClock), EventBus::new(32), None)
    }

    fn closing_ok() -> Arc<dyn NativeObject> {
        let mut native = MockNative::new();
        native.expect_close().times(1).returning(|| Ok(()));
        Arc::new(native)
    }

    #[test]
    fn test_register_and_get() {
        let registry = registry();
        let handle = registry.register(HandleKind::Bitmap, closing_ok());

        assert!(handle.is_active());
        assert!(handle.id().as_str().starts_with("bitmap_"));
        let found = registry.get(&HandleKind::Bitmap, handle.id()).unwrap();
        assert!(Arc::ptr_eq(&found, &handle));

        assert!(registry.get(&HandleKind::Camera, handle.id()).is_none());
        assert!(registry.get(&HandleKind::Bitmap, &HandleId::new("nope")).is_none());
        registry.destroy_all(&HandleKind::Bitmap);
    }

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let registry = HandleRegistry::new(
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
            EventBus::new(8),
            Some("app".to_string()),
        );

        let ids: Vec<HandleId> = (0..50)
            .map(|_| registry.register(HandleKind::VideoPlayer, closing_ok()).id().clone())
            .collect();

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 50);
        assert!(ids[0].as_str().starts_with("app-video-player_"));
        assert_eq!(registry.active_ids(&HandleKind::VideoPlayer), ids);

        registry.destroy_all(&HandleKind::VideoPlayer);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let registry = registry();
        let handle = registry.register(HandleKind::Bitmap, closing_ok());

        assert!(registry.destroy(&HandleKind::Bitmap, handle.id()));
        assert!(!registry.destroy(&HandleKind::Bitmap, handle.id()));
        assert!(handle.is_destroyed());
        assert!(registry.get(&HandleKind::Bitmap, handle.id()).is_none());
        assert!(registry.kinds().is_empty());
    }

    #[test]
    fn test_teardown_failure_still_removes() {
        let registry = registry();
        let mut stream = EventStream::new(registry.events.subscribe());

        let mut native = MockNative::new();
        native
            .expect_close()
            .times(1)
            .returning(|| Err(RawError::Message("device busy".into())));
        let handle = registry.register(HandleKind::Camera, Arc::new(native));

        assert!(registry.destroy(&HandleKind::Camera, handle.id()));
        assert_eq!(registry.active_count(&HandleKind::Camera), 0);

        let events = stream.drain();
        assert!(events.iter().any(|event| matches!(
            event,
            LifecycleEvent::Handle(HandleEvent::TeardownFailed { message, .. }) if message == "device busy"
        )));
    }

    #[test]
    fn test_destroy_all_collects_and_continues() {
        let registry = registry();

        let first = registry.register(HandleKind::Bitmap, closing_ok());

        let second = registry.register(HandleKind::Bitmap, Arc::new(PanickingClose));

        let mut failing = MockNative::new();
        failing
            .expect_close()
            .times(1)
            .returning(|| Err(RawError::Json(serde_json::json!({ "code": 12 }))));
        let third = registry.register(HandleKind::Bitmap, Arc::new(failing));

        let keep = registry.register(HandleKind::Map, closing_ok());

        let report = registry.destroy_all(&HandleKind::Bitmap);
        assert_eq!(
            report.destroyed,
            vec![first.id().clone(), second.id().clone(), third.id().clone()]
        );
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].error.error_code(), ErrorCode::Unknown);
        assert_eq!(report.failures[0].error.message(), "native teardown exploded");
        assert_eq!(report.failures[1].error.code(), 12);
        assert!(!report.is_clean());

        assert_eq!(registry.active_count(&HandleKind::Bitmap), 0);
        assert_eq!(registry.active_count(&HandleKind::Map), 1);
        assert!(registry.destroy(&HandleKind::Map, keep.id()));
    }

    #[test]
    fn test_destroy_hook_runs_before_teardown() {
        let registry = registry();
        let handle = registry.register(HandleKind::View, closing_ok());

        let mut seen = None;
        registry.destroy_with(&HandleKind::View, handle.id(), |h| {
            seen = Some((h.id().clone(), h.is_destroyed()));
        });

        assert_eq!(seen, Some((handle.id().clone(), true)));
    }

    #[test]
    fn test_introspection() {
        let registry = registry();
        registry.register(HandleKind::Bitmap, closing_ok());
        registry.register(HandleKind::Map, closing_ok());
        registry.register(HandleKind::Map, closing_ok());

        assert_eq!(registry.kinds(), vec![HandleKind::Bitmap, HandleKind::Map]);
        assert_eq!(registry.total_count(), 3);

        let report = registry.destroy_everything_with(|_| {});
        assert_eq!(report.destroyed_count(), 3);
        assert_eq!(registry.total_count(), 0);
    }
}
