//! Synchronization primitives.
//!
//! - `oneshot` carries the single completion of a pending bridge call.
//! - `broadcast` fans lifecycle events out to any number of observers.
//! - `Mutex`/`RwLock` are async-aware locks for state held across awaits.
//!
//! Registry bookkeeping that never awaits while locked uses `std::sync`
//! locks directly; these re-exports are for everything else.

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
