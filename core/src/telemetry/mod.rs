//! telemetry/mod.rs
//! Counters, stage timers, and immutable snapshots for one codec operation.
//!
//! Notes:
//! - Counters are plain fields mutated by the single thread that owns the
//!   message; no atomics.
//! - Snapshots are immutable and serde-serializable for logs and reports.

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;
