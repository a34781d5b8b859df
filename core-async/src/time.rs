//! Time-related abstractions.
//!
//! Deadlines in the adapter layer (status waits, bounded bridge calls) are
//! expressed as a race between the awaited future and a timer; [`timeout`]
//! is that race.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(10)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(10));
//! }
//! ```

pub use tokio::time::{error::Elapsed, interval, sleep, sleep_until, timeout, Interval, Sleep};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Returns the current time as milliseconds since UNIX_EPOCH.
///
/// A clock set before the epoch yields `0` rather than panicking; callers
/// only use this as an id seed and as a creation timestamp.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the current time as seconds since UNIX_EPOCH.
pub fn now_secs() -> u64 {
    now_millis() / 1000
}
