//! Workspace placeholder crate.
//!
//! Host applications depend on `capbridge-workspace` and pick features instead
//! of wiring each crate individually:
//!
//! - `adapter`: the shared adapter layer (`core-adapter`)
//! - `capabilities`: sample capability modules built on the adapter
//! - `simulator`: the in-memory host bridge used by tests and demos

#[cfg(feature = "adapter")]
pub use core_adapter as adapter;

#[cfg(feature = "capabilities")]
pub use core_capabilities as capabilities;

#[cfg(feature = "simulator")]
pub use bridge_sim as simulator;
