//! # Simulated Bridge
//!
//! In-memory implementation of the bridge traits for hosts without a native
//! side: tests, demos, and headless runs.
//!
//! ## Overview
//!
//! - [`SimBridge`] implements `Bridge` over a set of named namespaces
//! - [`SimNamespace`] implements `Namespace` with scripted constructors,
//!   asynchronous methods and static properties
//! - [`SimObject`] implements `NativeObject` with a property bag, scripted
//!   methods, a listener table and a configurable teardown
//! - [`Completion`] scripts how an asynchronous method answers: at once,
//!   later, never, twice, by failing, or by throwing
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_sim::{Completion, SimBridge, SimNamespace};
//! use serde_json::json;
//!
//! let bridge = SimBridge::new().with_namespace(
//!     SimNamespace::new("nativeObj")
//!         .with_default_constructor("Bitmap")
//!         .with_method("compressImage", Completion::Succeed(json!({ "size": 10 }))),
//! );
//! ```

mod bridge;
mod completion;
mod namespace;
mod object;

pub use bridge::SimBridge;
pub use completion::{Completion, Script};
pub use namespace::SimNamespace;
pub use object::{SimObject, SyncMethod};
