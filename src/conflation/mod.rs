//! Conflation of per-symbol updates.
//!
//! Bursts of updates for the same symbol collapse into a single pending
//! entry holding the latest value. Symbols leave the store in the order in
//! which they first became pending, so a symbol that keeps ticking cannot
//! push itself to the back of the queue.
//!
//! # Layout
//!
//! - [`ConflatingBuffer`]: the single-threaded data structure
//! - [`ConflationStore`]: the same buffer behind a mutex, shared between
//!   producer threads and the drain loop

pub mod buffer;
pub mod store;

pub use buffer::{BufferStats, ConflatingBuffer, PendingEntry};
pub use store::ConflationStore;
