//! Bitmaps (`nativeObj.Bitmap`): synchronous construction, asynchronous
//! load and save.

use std::sync::Arc;

use core_adapter::{
    payload_json, payload_unit, BridgeContext, BridgeError, Callbacks, CapabilityModule,
    DestroyReport, ErrorCode, Handle, HandleId, HandleKind, PendingCall, PropertyProxy, ResourceState,
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::require_non_empty;

pub const NAMESPACE: &str = "nativeObj";

const CONSTRUCTOR: &str = "Bitmap";

/// Properties forwarded to the native bitmap.
pub const PROPERTIES: &[&str] = &["id"];

/// Output formats accepted by [`Bitmap::save`].
pub mod format {
    pub const JPG: &str = "jpg";
    pub const PNG: &str = "png";
}

/// Options of [`Bitmap::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOptions {
    pub overwrite: bool,
    pub format: String,
    /// 1 to 100; only meaningful for JPG
    pub quality: u8,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            format: format::JPG.to_string(),
            quality: 50,
        }
    }
}

impl SaveOptions {
    fn validate(&self) -> Result<()> {
        if self.format != format::JPG && self.format != format::PNG {
            return Err(BridgeError::InvalidArgument(format!(
                "unsupported bitmap format '{}'",
                self.format
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(BridgeError::InvalidArgument(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SavedBitmap {
    pub target: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub size: u64,
}

/// Bitmap capability.
#[derive(Debug, Clone)]
pub struct Bitmaps {
    module: CapabilityModule,
}

impl Bitmaps {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self {
            module: CapabilityModule::new(ctx, NAMESPACE, HandleKind::Bitmap),
        }
    }

    pub async fn is_supported(&self) -> bool {
        self.module.is_supported().await
    }

    /// Creates a bitmap, optionally loading `path` into it.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty id
    /// - `EnvironmentUnavailable` without the `nativeObj` namespace
    pub fn create(&self, id: &str, path: Option<&str>) -> Result<Bitmap> {
        require_non_empty("bitmap id", id)?;
        let mut args = vec![json!(id)];
        if let Some(path) = path {
            args.push(json!(path));
        }

        let handle = self.module.construct(CONSTRUCTOR, &args)?;
        debug!(handle_id = %handle.id(), "Bitmap created");
        Ok(Bitmap::new(Arc::clone(self.module.context()), handle))
    }

    /// Wraps an active bitmap again, e.g. from a stored id.
    pub fn get(&self, id: &HandleId) -> Option<Bitmap> {
        self.module
            .lookup(id)
            .map(|handle| Bitmap::new(Arc::clone(self.module.context()), handle))
    }

    pub fn active_bitmaps_count(&self) -> usize {
        self.module.active_count()
    }

    pub fn active_bitmap_ids(&self) -> Vec<HandleId> {
        self.module.active_ids()
    }

    pub fn close_all_bitmaps(&self) -> DestroyReport {
        self.module.close_all()
    }
}

/// A registered native bitmap.
#[derive(Debug, Clone)]
pub struct Bitmap {
    ctx: Arc<BridgeContext>,
    handle: Arc<Handle>,
    proxy: PropertyProxy,
}

impl Bitmap {
    fn new(ctx: Arc<BridgeContext>, handle: Arc<Handle>) -> Self {
        let proxy = ctx.proxy(&handle, PROPERTIES);
        Self { ctx, handle, proxy }
    }

    pub fn id(&self) -> &HandleId {
        self.handle.id()
    }

    pub fn handle(&self) -> &Arc<Handle> {
        &self.handle
    }

    pub fn state(&self) -> ResourceState {
        self.handle.state()
    }

    /// Identifier given at creation.
    pub fn native_id(&self) -> Result<String> {
        self.proxy.get_as("id")
    }

    fn load_args(&self, path: &str) -> Result<Vec<Value>> {
        require_non_empty("image path", path)?;
        self.handle.ensure_active()?;
        Ok(vec![json!(path)])
    }

    /// Loads an image file into the bitmap.
    pub fn load(&self, path: &str) -> Result<PendingCall<()>> {
        let args = self.load_args(path)?;
        Ok(self.ctx.handle_call(&self.handle, "load", payload_unit).call(args))
    }

    /// Callback-style [`load`](Self::load).
    pub fn load_with(&self, path: &str, callbacks: Callbacks<()>) -> Result<()> {
        let args = self.load_args(path)?;
        self.ctx
            .handle_call(&self.handle, "load", payload_unit)
            .call_with(args, callbacks);
        Ok(())
    }

    fn save_args(&self, path: &str, options: &SaveOptions) -> Result<Vec<Value>> {
        require_non_empty("target path", path)?;
        options.validate()?;
        self.handle.ensure_active()?;
        let options = serde_json::to_value(options)
            .map_err(|e| BridgeError::InvalidArgument(format!("invalid save options: {e}")))?;
        Ok(vec![json!(path), options])
    }

    /// Saves the bitmap to `path`.
    pub fn save(&self, path: &str, options: &SaveOptions) -> Result<PendingCall<SavedBitmap>> {
        let args = self.save_args(path, options)?;
        Ok(self
            .ctx
            .handle_call(&self.handle, "save", payload_json::<SavedBitmap>)
            .call(args))
    }

    /// Callback-style [`save`](Self::save).
    pub fn save_with(
        &self,
        path: &str,
        options: &SaveOptions,
        callbacks: Callbacks<SavedBitmap>,
    ) -> Result<()> {
        let args = self.save_args(path, options)?;
        self.ctx
            .handle_call(&self.handle, "save", payload_json::<SavedBitmap>)
            .call_with(args, callbacks);
        Ok(())
    }

    /// Image data as a base64 data URL.
    pub fn to_base64(&self) -> Result<String> {
        let value = self.proxy.call("toBase64Data", &[])?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            BridgeError::OperationFailed {
                code: ErrorCode::OperationFailed.as_i64(),
                message: "toBase64Data returned no string".to_string(),
            }
        })
    }

    /// Releases the native bitmap. Returns `false` if it was already
    /// recycled.
    pub fn recycle(&self) -> bool {
        self.ctx.destroy(&self.handle)
    }

    pub fn is_recycled(&self) -> bool {
        self.handle.is_destroyed()
    }
}
