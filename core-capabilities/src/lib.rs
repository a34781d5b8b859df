//! # Capability Modules
//!
//! Typed wrappers over individual bridge namespaces, built on
//! `core_adapter`.
//!
//! Each module offers the same outer surface:
//!
//! - creation or fetch operations returning a wrapper around a registered
//!   handle, in callback or future style
//! - `is_supported()`
//! - active count, active ids and close-all for its handle kind
//! - constants as plain `const` items
//!
//! Payload semantics (image encoding, contact fields, playback) belong to
//! the host; the wrappers only shape arguments and results.
//!
//! ## Usage
//!
//! ```ignore
//! use core_capabilities::Capabilities;
//!
//! let caps = Capabilities::new(Arc::new(BridgeContext::with_bridge(host_bridge)));
//! if caps.video_players.is_supported().await {
//!     let player = caps.video_players.create_video_player("intro", json!({ "top": 0 }))?;
//!     player.set_src("https://example.com/intro.mp4")?;
//!     player.play()?;
//!     player.wait_for(video_player::events::ENDED, None).await?;
//!     player.close();
//! }
//! ```

use std::sync::Arc;

use core_adapter::{BridgeContext, DestroyReport};

pub mod address_book;
pub mod bitmap;
pub mod video_player;

pub use address_book::{AddressBook, AddressBooks};
pub use bitmap::{Bitmap, Bitmaps, SaveOptions, SavedBitmap};
pub use video_player::{VideoPlayer, VideoPlayers};

/// Every capability module over one shared context.
#[derive(Debug, Clone)]
pub struct Capabilities {
    ctx: Arc<BridgeContext>,
    pub bitmaps: Bitmaps,
    pub address_books: AddressBooks,
    pub video_players: VideoPlayers,
}

impl Capabilities {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self {
            bitmaps: Bitmaps::new(Arc::clone(&ctx)),
            address_books: AddressBooks::new(Arc::clone(&ctx)),
            video_players: VideoPlayers::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.ctx
    }

    /// Destroys every live object of every capability.
    pub fn clear_all_active_objects(&self) -> DestroyReport {
        self.ctx.clear_all_active_objects()
    }
}

pub(crate) fn require_non_empty(what: &str, value: &str) -> core_adapter::Result<()> {
    if value.trim().is_empty() {
        Err(core_adapter::BridgeError::InvalidArgument(format!(
            "{what} must not be empty"
        )))
    } else {
        Ok(())
    }
}
