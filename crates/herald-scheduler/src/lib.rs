//! Fixed-interval broadcast scheduler for herald.
//!
//! This crate provides an in-memory scheduler that:
//! - Holds at most one job per group
//! - Fires each job immediately on creation, then every interval
//! - Replaces jobs idempotently (`upsert` bumps a generation, so a stale
//!   in-flight delivery for the old job is dropped)
//! - Logs and swallows delivery failures; jobs retry forever until stopped

mod scheduler;
mod store;
mod types;

pub use scheduler::{Broadcaster, Scheduler};
pub use store::JobStore;
pub use types::{Job, JobHandle};
