//! Registered native resources and their identifiers.

use std::fmt;
use std::sync::Arc;

use bridge_traits::{BridgeError, NativeObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{Lifecycle, ResourceState};

/// Kind of native resource a handle wraps.
///
/// Ids are unique within a kind; the registry keeps one table per kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandleKind {
    Bitmap,
    View,
    Camera,
    AddressBook,
    Map,
    WaitingDialog,
    VideoPlayer,
    LivePusher,
    Other(String),
}

impl HandleKind {
    /// Display name, also used in lifecycle events.
    pub fn as_str(&self) -> &str {
        match self {
            HandleKind::Bitmap => "Bitmap",
            HandleKind::View => "View",
            HandleKind::Camera => "Camera",
            HandleKind::AddressBook => "AddressBook",
            HandleKind::Map => "Map",
            HandleKind::WaitingDialog => "WaitingDialog",
            HandleKind::VideoPlayer => "VideoPlayer",
            HandleKind::LivePusher => "LivePusher",
            HandleKind::Other(name) => name,
        }
    }

    /// Lowercase stem used at the front of generated ids.
    pub(crate) fn id_stem(&self) -> String {
        let mut stem = String::new();
        for (i, c) in self.as_str().chars().enumerate() {
            if c.is_ascii_uppercase() {
                if i > 0 {
                    stem.push('-');
                }
                stem.push(c.to_ascii_lowercase());
            } else if c.is_ascii_alphanumeric() {
                stem.push(c);
            } else {
                stem.push('-');
            }
        }
        stem
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque registry id of a handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(String);

impl HandleId {
    /// Wraps an id string, e.g. one a caller persisted earlier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A native object registered with the adapter.
///
/// Wrappers hold an `Arc<Handle>`; once the handle is destroyed the native
/// object is no longer reachable through it.
pub struct Handle {
    id: HandleId,
    kind: HandleKind,
    sequence: u64,
    created_at: DateTime<Utc>,
    lifecycle: Lifecycle,
    native: Arc<dyn NativeObject>,
}

impl Handle {
    pub(crate) fn new(
        id: HandleId,
        kind: HandleKind,
        sequence: u64,
        created_at: DateTime<Utc>,
        native: Arc<dyn NativeObject>,
    ) -> Self {
        Self {
            id,
            kind,
            sequence,
            created_at,
            lifecycle: Lifecycle::new(),
            native,
        }
    }

    pub fn id(&self) -> &HandleId {
        &self.id
    }

    pub fn kind(&self) -> &HandleKind {
        &self.kind
    }

    /// Registration order within the owning registry.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> ResourceState {
        self.lifecycle.state()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }

    /// Fails with `Destroyed` once the handle was torn down.
    pub fn ensure_active(&self) -> Result<(), BridgeError> {
        self.lifecycle.ensure_active(self.describe())
    }

    /// The wrapped native object, as long as the handle is active.
    pub fn native(&self) -> Result<&Arc<dyn NativeObject>, BridgeError> {
        self.ensure_active()?;
        Ok(&self.native)
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Teardown path only; skips the state check.
    pub(crate) fn native_unchecked(&self) -> &Arc<dyn NativeObject> {
        &self.native
    }

    fn describe(&self) -> String {
        format!("{} {}", self.kind, self.id)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish()
    }
}
