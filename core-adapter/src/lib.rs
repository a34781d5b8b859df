//! # Core Adapter
//!
//! Uniform, safe access to native capabilities exposed by a host bridge.
//!
//! ## Overview
//!
//! The host hands out loosely-shaped asynchronous methods and live native
//! objects. This crate puts four guarantees in front of them:
//!
//! - **Normalized errors** ([`normalize`]): every failure reaches the caller
//!   as a [`BridgeError`] with a code and a non-empty message.
//! - **Tracked lifetimes** ([`HandleRegistry`], [`Lifecycle`]): native
//!   objects are registered handles that move Created → Active → Destroyed
//!   and can be enumerated and bulk-destroyed.
//! - **Stable listener identity** ([`CallbackIdentityMap`]): the wrapper
//!   registered with the host is the one removed later.
//! - **Dual-mode calls** ([`DualModeAdapter`]): every asynchronous method
//!   works with callbacks or as a future, and completes exactly once.
//!
//! [`BridgeContext`] ties them together; capability crates build on
//! [`CapabilityModule`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_adapter::{payload_value, BridgeContext, HandleKind};
//!
//! let ctx = Arc::new(BridgeContext::with_bridge(host_bridge));
//! let player = ctx.construct("video", "createVideoPlayer", &[json!("v1")], HandleKind::VideoPlayer)?;
//! let status = ctx.wait_for_event(&player, "play", None).await?;
//! ctx.destroy(&player);
//! ```

pub mod capability;
pub mod context;
pub mod dual_mode;
pub mod handle;
pub mod lifecycle;
pub mod listeners;
pub mod normalize;
pub mod proxy;
pub mod registry;
pub mod wait;

pub use bridge_traits::{BridgeError, ErrorCode, RawError};
pub use capability::CapabilityModule;
pub use context::BridgeContext;
pub use dual_mode::{
    payload_json, payload_unit, payload_value, CallStyle, Callbacks, DualModeAdapter, PendingCall,
};
pub use handle::{Handle, HandleId, HandleKind};
pub use lifecycle::{Lifecycle, ResourceState};
pub use listeners::{listener, normalize_payload, CallbackIdentityMap, Listener, ListenerEvent};
pub use normalize::{normalize, normalize_default};
pub use proxy::PropertyProxy;
pub use registry::{DestroyReport, HandleRegistry, TeardownFailure};
pub use wait::wait_for_event;

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
