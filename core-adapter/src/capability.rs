//! Shared surface of capability modules.

use std::sync::Arc;

use bridge_traits::{BridgeError, NativePayload};
use serde_json::Value;

use crate::context::BridgeContext;
use crate::dual_mode::DualModeAdapter;
use crate::handle::{Handle, HandleId, HandleKind};
use crate::registry::DestroyReport;

/// One capability namespace bound to one handle kind.
///
/// Concrete capabilities (bitmap, video player, …) embed a module and add
/// their own typed operations on top.
#[derive(Debug, Clone)]
pub struct CapabilityModule {
    ctx: Arc<BridgeContext>,
    namespace: &'static str,
    kind: HandleKind,
}

impl CapabilityModule {
    pub fn new(ctx: Arc<BridgeContext>, namespace: &'static str, kind: HandleKind) -> Self {
        Self {
            ctx,
            namespace,
            kind,
        }
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.ctx
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn kind(&self) -> &HandleKind {
        &self.kind
    }

    /// Resolves `false` when the host lacks the bridge or the namespace.
    pub async fn is_supported(&self) -> bool {
        self.ctx.is_supported(self.namespace)
    }

    pub fn active_count(&self) -> usize {
        self.ctx.registry().active_count(&self.kind)
    }

    pub fn active_ids(&self) -> Vec<HandleId> {
        self.ctx.registry().active_ids(&self.kind)
    }

    /// Looks up an active handle of this kind.
    pub fn lookup(&self, id: &HandleId) -> Option<Arc<Handle>> {
        self.ctx.registry().get(&self.kind, id)
    }

    /// Destroys every active handle of this kind.
    pub fn close_all(&self) -> DestroyReport {
        self.ctx.destroy_all(&self.kind)
    }

    /// Synchronous constructor of this namespace.
    pub fn construct(&self, constructor: &str, args: &[Value]) -> Result<Arc<Handle>, BridgeError> {
        self.ctx
            .construct(self.namespace, constructor, args, self.kind.clone())
    }

    /// Asynchronous creation through `method`.
    pub fn fetch(&self, method: &str) -> DualModeAdapter<Arc<Handle>> {
        self.ctx.fetch_handle(self.namespace, method, self.kind.clone())
    }

    /// Asynchronous namespace-level method.
    pub fn method<T, C>(&self, method: &str, convert: C) -> DualModeAdapter<T>
    where
        T: Send + 'static,
        C: Fn(NativePayload) -> Result<T, BridgeError> + Send + Sync + 'static,
    {
        self.ctx.namespace_call(self.namespace, method, convert)
    }
}
