//! # Adapter Configuration
//!
//! Builder-based configuration for the adapter layer's composition root
//! (`core_adapter::BridgeContext`).
//!
//! ## Overview
//!
//! The only external dependency is the ambient bridge, and it is optional:
//! a host without a bridge still gets a working context whose capability
//! calls fail with `EnvironmentUnavailable` and whose `is_supported()`
//! checks report `false`. Everything else has a default.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{AdapterConfig, ListenerRemovalPolicy};
//! use std::time::Duration;
//!
//! let config = AdapterConfig::builder()
//!     .bridge(host_bridge)
//!     .default_wait_timeout(Duration::from_secs(5))
//!     .listener_removal(ListenerRemovalPolicy::Strict)
//!     .build()?;
//! ```
//!
//! ## Validation
//!
//! `build()` fails fast with [`Error::Config`] on values that can only be
//! mistakes (a zero event buffer, a zero or absurd wait deadline, an id
//! prefix containing separators).

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Bridge, Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for status waits that do not pass their own.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest accepted default wait deadline.
pub const MAX_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Largest accepted lifecycle event buffer.
pub const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// How `unbind` treats a listener that was never bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerRemovalPolicy {
    /// Report `NotFound` so double-remove bugs surface.
    #[default]
    Strict,
    /// Log and succeed. Matches hosts whose wrappers silently ignored a
    /// missing listener; a deliberate deviation, not the default.
    Lenient,
}

/// Configuration for the adapter layer.
///
/// Use [`AdapterConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct AdapterConfig {
    /// The ambient bridge, if the host provides one
    pub bridge: Option<Arc<dyn Bridge>>,

    /// Time source for handle creation timestamps
    pub clock: Arc<dyn Clock>,

    /// Buffer size of the lifecycle event bus
    pub event_buffer_size: usize,

    /// Deadline for status waits that do not pass their own
    pub default_wait_timeout: Duration,

    /// Policy for removing a listener that was never bound
    pub listener_removal: ListenerRemovalPolicy,

    /// Optional prefix prepended to every generated handle id
    pub id_prefix: Option<String>,
}

impl std::fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("bridge", &self.bridge.as_ref().map(|_| "Bridge { ... }"))
            .field("event_buffer_size", &self.event_buffer_size)
            .field("default_wait_timeout", &self.default_wait_timeout)
            .field("listener_removal", &self.listener_removal)
            .field("id_prefix", &self.id_prefix)
            .finish()
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            bridge: None,
            clock: Arc::new(SystemClock),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            default_wait_timeout: DEFAULT_WAIT_TIMEOUT,
            listener_removal: ListenerRemovalPolicy::default(),
            id_prefix: None,
        }
    }
}

impl AdapterConfig {
    /// Creates a new builder.
    pub fn builder() -> AdapterConfigBuilder {
        AdapterConfigBuilder::default()
    }

    /// Whether a bridge was provided.
    pub fn has_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        if self.default_wait_timeout.is_zero() {
            return Err(Error::Config(
                "Default wait timeout must be greater than 0".to_string(),
            ));
        }

        if self.default_wait_timeout > MAX_WAIT_TIMEOUT {
            return Err(Error::Config(format!(
                "Default wait timeout exceeds maximum of {}s",
                MAX_WAIT_TIMEOUT.as_secs()
            )));
        }

        if let Some(prefix) = &self.id_prefix {
            if prefix.is_empty() {
                return Err(Error::Config("Id prefix cannot be empty".to_string()));
            }
            if !prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            {
                return Err(Error::Config(
                    "Id prefix may only contain ASCII letters, digits and '-'".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for [`AdapterConfig`].
#[derive(Default)]
pub struct AdapterConfigBuilder {
    bridge: Option<Arc<dyn Bridge>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    default_wait_timeout: Option<Duration>,
    listener_removal: ListenerRemovalPolicy,
    id_prefix: Option<String>,
}

impl AdapterConfigBuilder {
    /// Sets the ambient bridge.
    pub fn bridge(mut self, bridge: Arc<dyn Bridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Sets the bridge from an optional value, for hosts that probe for it.
    pub fn maybe_bridge(mut self, bridge: Option<Arc<dyn Bridge>>) -> Self {
        self.bridge = bridge;
        self
    }

    /// Overrides the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the lifecycle event bus buffer size.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the deadline used by status waits that do not pass their own.
    ///
    /// Default: 10 seconds
    pub fn default_wait_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout = Some(timeout);
        self
    }

    /// Sets the policy for removing never-bound listeners.
    pub fn listener_removal(mut self, policy: ListenerRemovalPolicy) -> Self {
        self.listener_removal = policy;
        self
    }

    /// Sets a prefix for generated handle ids.
    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<AdapterConfig> {
        let defaults = AdapterConfig::default();
        let config = AdapterConfig {
            bridge: self.bridge,
            clock: self.clock.unwrap_or(defaults.clock),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(defaults.event_buffer_size),
            default_wait_timeout: self
                .default_wait_timeout
                .unwrap_or(defaults.default_wait_timeout),
            listener_removal: self.listener_removal,
            id_prefix: self.id_prefix,
        };

        config.validate()?;
        Ok(config)
    }
}
