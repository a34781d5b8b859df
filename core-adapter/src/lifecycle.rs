//! Resource lifecycle: Created → Active → Destroyed.
//!
//! Destroyed is terminal. A later creation yields a brand-new handle with a
//! new id; nothing is ever resurrected.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};

/// State of a wrapped native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceState {
    /// Constructed but not yet visible in the registry.
    Created,
    /// Registered and usable.
    Active,
    /// Torn down. Every further use fails with `Destroyed`.
    Destroyed,
}

impl ResourceState {
    const fn as_u8(self) -> u8 {
        match self {
            ResourceState::Created => 0,
            ResourceState::Active => 1,
            ResourceState::Destroyed => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => ResourceState::Created,
            1 => ResourceState::Active,
            _ => ResourceState::Destroyed,
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceState::Created => "created",
            ResourceState::Active => "active",
            ResourceState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Lock-free state cell enforcing the allowed transitions.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ResourceState::Created.as_u8()),
        }
    }

    pub fn state(&self) -> ResourceState {
        ResourceState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == ResourceState::Active
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == ResourceState::Destroyed
    }

    /// Created → Active. Activating an active resource is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Destroyed`] once the resource was destroyed.
    pub fn activate(&self) -> Result<(), BridgeError> {
        match self.state.compare_exchange(
            ResourceState::Created.as_u8(),
            ResourceState::Active.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) => match ResourceState::from_u8(current) {
                ResourceState::Destroyed => Err(BridgeError::destroyed("resource")),
                _ => Ok(()),
            },
        }
    }

    /// Moves to Destroyed from any state.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn destroy(&self) -> bool {
        self.state.swap(ResourceState::Destroyed.as_u8(), Ordering::AcqRel)
            != ResourceState::Destroyed.as_u8()
    }

    /// Fails unless the resource is Active. `what` names it in the error.
    pub fn ensure_active(&self, what: impl fmt::Display) -> Result<(), BridgeError> {
        match self.state() {
            ResourceState::Active => Ok(()),
            ResourceState::Destroyed => Err(BridgeError::destroyed(what)),
            ResourceState::Created => Err(BridgeError::InvalidArgument(format!(
                "{what} is not registered yet"
            ))),
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
