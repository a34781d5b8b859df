//! Runtime utilities that abstract over the underlying executor.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a single-threaded runtime.
///
/// The adapter layer models a single event-loop host, so a current-thread
/// runtime is the closest native equivalent.
///
/// # Panics
///
/// Panics if the runtime cannot be built (resource exhaustion at startup).
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build runtime")
        .block_on(future)
}

/// Returns `true` when called from inside a running event loop.
pub fn in_event_loop() -> bool {
    Handle::try_current().is_ok()
}
