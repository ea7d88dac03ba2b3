//! Scheduler types.

use chrono::{DateTime, Duration, Utc};

use herald_core::GroupKey;

/// A recurring broadcast bound to one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// The group this job broadcasts into.
    pub group: GroupKey,
    /// Text sent on every fire.
    pub payload: String,
    /// Seconds between fires.
    pub interval_secs: u64,
    /// When this job should next fire.
    pub next_fire: DateTime<Utc>,
    /// Bumped on every upsert for the same group; deliveries in flight for
    /// an older generation are suppressed before they send.
    pub generation: u64,
    /// When this job was installed.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Check whether this job is due to fire.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_fire <= now
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.interval_secs as i64)
    }
}

/// Handle returned by [`crate::JobStore::upsert`], usable for targeted
/// cancellation of exactly the job it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub group: GroupKey,
    pub generation: u64,
}
