//! # Host Bridge Traits
//!
//! The contract between the adapter layer and the ambient native-capability
//! bridge of the host runtime.
//!
//! ## Overview
//!
//! A host exposes one bridge object with many independent namespaces
//! (camera, contacts, video, payment, …). Each namespace mixes three calling
//! conventions, and this crate gives each one a trait method:
//!
//! - synchronous constructors/getters: [`Namespace::construct`]
//! - asynchronous `(args…, successCB, errorCB)` methods: [`Namespace::invoke`]
//!   and [`NativeObject::invoke`]
//! - plain property accessors: [`Namespace::property`],
//!   [`NativeObject::get_property`] / [`NativeObject::set_property`]
//!
//! Nothing here knows about capability payloads. Values cross the boundary
//! as `serde_json::Value`, live objects as `Arc<dyn NativeObject>`.
//!
//! ## Error Handling
//!
//! Hosts report failures as [`RawError`] in whatever shape they like. The
//! adapter normalizes them into [`BridgeError`], whose variants form the
//! taxonomy every caller sees:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `EnvironmentUnavailable` | bridge or namespace missing |
//! | `InvalidArgument` | malformed caller input |
//! | `NotFound` | unknown id or listener |
//! | `AlreadyExists` | duplicate listener registration |
//! | `OperationFailed` | the bridge reported a failure |
//! | `Destroyed` | use after teardown |
//! | `Timeout` | deadline lost |
//! | `Unknown` | anything else, original message kept |
//!
//! ## Absence Is Not a Crash
//!
//! A host without a bridge, or without a given namespace, is a first-class
//! condition: [`Bridge::namespace`] returns `None` and the adapter turns that
//! into `EnvironmentUnavailable`.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so adapter state can be shared across
//! tasks of the host event loop.

pub mod bridge;
pub mod error;
pub mod native;
pub mod time;

pub use bridge::{Bridge, ErrorCallback, Namespace, NativePayload, SuccessCallback};
pub use error::{BridgeError, ErrorCode, RawError};
pub use native::{same_listener, NativeListener, NativeObject};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
