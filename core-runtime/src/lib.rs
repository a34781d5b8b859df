//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the adapter crates:
//! - Logging and tracing setup
//! - Adapter configuration
//! - Lifecycle event bus
//!
//! ## Overview
//!
//! Nothing in here talks to the native bridge. This crate holds the ambient
//! concerns (how the adapter is configured, how it logs, how it reports
//! lifecycle transitions) so `core-adapter` can stay focused on handles,
//! listeners and calls.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{AdapterConfig, AdapterConfigBuilder, ListenerRemovalPolicy};
pub use error::{Error, Result};
pub use events::{EventBus, LifecycleEvent};
