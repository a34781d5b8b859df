//! Event-loop abstraction for the capability bridge adapter layer.
//!
//! The adapter crates never name the executor directly. Everything they need
//! from the host event loop (timers, one-shot channels, broadcast channels,
//! task spawning) is re-exported from here so the executor can be swapped
//! in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning
//! - `time`: Sleep, deadlines and wall-clock helpers
//! - `sync`: Channels and async locks
//! - `runtime`: Driving a future to completion from synchronous code
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, timeout, Duration};
//!
//! async fn example() {
//!     let outcome = timeout(Duration::from_millis(50), async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     })
//!     .await;
//!     assert_eq!(outcome.ok(), Some(42));
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
