//! Video players (`video.createVideoPlayer`).
//!
//! Playback controls are synchronous calls on the native player. Status is
//! observed through event listeners, either registered for the player's
//! lifetime or awaited once with [`VideoPlayer::wait_for`].

use std::sync::Arc;

use core_adapter::{
    BridgeContext, BridgeError, CapabilityModule, DestroyReport, Handle, HandleId, HandleKind,
    Listener, ListenerEvent, PropertyProxy, ResourceState, Result,
};
use core_async::time::Duration;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::require_non_empty;

pub const NAMESPACE: &str = "video";

const CONSTRUCTOR: &str = "createVideoPlayer";

/// Properties forwarded to the native player.
pub const PROPERTIES: &[&str] = &[
    "src",
    "initial-time",
    "duration",
    "controls",
    "loop",
    "muted",
    "objectFit",
    "poster",
    "direction",
];

/// Player event names.
pub mod events {
    pub const PLAY: &str = "play";
    pub const PAUSE: &str = "pause";
    pub const ENDED: &str = "ended";
    pub const ERROR: &str = "error";
    pub const TIMEUPDATE: &str = "timeupdate";
    pub const WAITING: &str = "waiting";
    pub const FULLSCREENCHANGE: &str = "fullscreenchange";

    pub const ALL: &[&str] = &[PLAY, PAUSE, ENDED, ERROR, TIMEUPDATE, WAITING, FULLSCREENCHANGE];
}

/// Values of the `objectFit` property.
pub mod object_fit {
    pub const CONTAIN: &str = "contain";
    pub const FILL: &str = "fill";
    pub const COVER: &str = "cover";
}

/// Video player capability.
#[derive(Debug, Clone)]
pub struct VideoPlayers {
    module: CapabilityModule,
}

impl VideoPlayers {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self {
            module: CapabilityModule::new(ctx, NAMESPACE, HandleKind::VideoPlayer),
        }
    }

    pub async fn is_supported(&self) -> bool {
        self.module.is_supported().await
    }

    /// Creates a player with the given layout `styles` (an object, or null
    /// for host defaults).
    pub fn create_video_player(&self, id: &str, styles: Value) -> Result<VideoPlayer> {
        require_non_empty("player id", id)?;
        let styles = match styles {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => styles,
            other => {
                return Err(BridgeError::InvalidArgument(format!(
                    "player styles must be an object, got {other}"
                )))
            }
        };

        let handle = self.module.construct(CONSTRUCTOR, &[json!(id), styles])?;
        debug!(handle_id = %handle.id(), "Video player created");
        Ok(VideoPlayer::new(Arc::clone(self.module.context()), handle))
    }

    pub fn get(&self, id: &HandleId) -> Option<VideoPlayer> {
        self.module
            .lookup(id)
            .map(|handle| VideoPlayer::new(Arc::clone(self.module.context()), handle))
    }

    pub fn active_video_players_count(&self) -> usize {
        self.module.active_count()
    }

    pub fn active_video_player_ids(&self) -> Vec<HandleId> {
        self.module.active_ids()
    }

    pub fn close_all_video_players(&self) -> DestroyReport {
        self.module.close_all()
    }
}

/// A registered native video player.
#[derive(Debug, Clone)]
pub struct VideoPlayer {
    ctx: Arc<BridgeContext>,
    handle: Arc<Handle>,
    proxy: PropertyProxy,
}

impl VideoPlayer {
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

    pub fn play(&self) -> Result<()> {
        self.proxy.call("play", &[]).map(drop)
    }

    pub fn pause(&self) -> Result<()> {
        self.proxy.call("pause", &[]).map(drop)
    }

    pub fn stop(&self) -> Result<()> {
        self.proxy.call("stop", &[]).map(drop)
    }

    /// Jumps to `position` seconds.
    pub fn seek(&self, position: f64) -> Result<()> {
        if !position.is_finite() || position < 0.0 {
            return Err(BridgeError::InvalidArgument(format!(
                "seek position must be a non-negative number of seconds, got {position}"
            )));
        }
        self.proxy.call("seek", &[json!(position)]).map(drop)
    }

    pub fn get(&self, property: &str) -> Result<Value> {
        self.proxy.get(property)
    }

    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        self.proxy.set(property, value)
    }

    /// Every declared property.
    pub fn properties(&self) -> Result<Map<String, Value>> {
        self.proxy.snapshot()
    }

    pub fn src(&self) -> Result<String> {
        self.proxy.get_as("src")
    }

    pub fn set_src(&self, src: &str) -> Result<()> {
        self.proxy.set("src", src)
    }

    pub fn muted(&self) -> Result<bool> {
        self.proxy.get_as("muted")
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.proxy.set("muted", muted)
    }

    pub fn add_event_listener(&self, event: &str, listener: &Listener) -> Result<()> {
        self.ctx.add_listener(&self.handle, event, listener)
    }

    pub fn remove_event_listener(&self, event: &str, listener: &Listener) -> Result<()> {
        self.ctx.remove_listener(&self.handle, event, listener)
    }

    /// Waits for the next `event`, failing with `Timeout` after `deadline`
    /// (or the configured default) and with `Destroyed` if the player is
    /// closed first.
    pub async fn wait_for(&self, event: &str, deadline: Option<Duration>) -> Result<ListenerEvent> {
        self.ctx.wait_for_event(&self.handle, event, deadline).await
    }

    /// Waits until playback passes `position` seconds.
    pub async fn wait_until_position(
        &self,
        position: f64,
        deadline: Option<Duration>,
    ) -> Result<ListenerEvent> {
        self.ctx
            .wait_for_event_matching(&self.handle, events::TIMEUPDATE, deadline, move |event| {
                event
                    .field("currentTime")
                    .or_else(|| event.field("value"))
                    .and_then(Value::as_f64)
                    .is_some_and(|current| current >= position)
            })
            .await
    }

    pub fn close(&self) -> bool {
        self.ctx.destroy(&self.handle)
    }

    pub fn destroy(&self) -> bool {
        self.close()
    }
}
