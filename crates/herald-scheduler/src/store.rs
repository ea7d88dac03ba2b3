//! Job store: one scheduled broadcast per group.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use herald_core::GroupKey;

use crate::{Job, JobHandle};

/// Minimum sleep duration between scheduler passes.
pub(crate) const MIN_SLEEP_SECS: u64 = 1;

/// Maximum sleep duration between scheduler passes.
pub(crate) const MAX_SLEEP_SECS: u64 = 60;

/// In-memory registry of broadcast jobs, keyed by group.
///
/// `upsert` replaces atomically under the write lock and bumps the
/// generation, so once it returns no delivery with the old payload can start.
pub struct JobStore {
    jobs: RwLock<HashMap<GroupKey, Job>>,
    next_generation: AtomicU64,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Install a job for a group, replacing any existing one. The first fire
    /// is immediate (`next_fire = now`).
    pub async fn upsert(
        &self,
        group: GroupKey,
        interval_secs: u64,
        payload: impl Into<String>,
    ) -> JobHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let job = Job {
            group,
            payload: payload.into(),
            interval_secs,
            next_fire: now,
            generation,
            created_at: now,
        };

        let replaced = self.jobs.write().await.insert(group, job);
        match replaced {
            Some(old) => info!(
                %group,
                old_generation = old.generation,
                generation,
                "replaced broadcast job"
            ),
            None => info!(%group, generation, interval_secs, "installed broadcast job"),
        }

        JobHandle { group, generation }
    }

    /// Remove the job for a group, whatever its generation. Cancelling a
    /// group with no job is a success.
    pub async fn cancel_all_for_group(&self, group: GroupKey) -> bool {
        let removed = self.jobs.write().await.remove(&group).is_some();
        if removed {
            info!(%group, "cancelled broadcast job");
        } else {
            debug!(%group, "cancel requested for group with no job");
        }
        removed
    }

    /// Remove the job a handle was issued for. A no-op if the job has since
    /// been replaced or removed.
    pub async fn cancel(&self, handle: JobHandle) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get(&handle.group) {
            Some(job) if job.generation == handle.generation => {
                jobs.remove(&handle.group);
                info!(group = %handle.group, generation = handle.generation, "cancelled broadcast job");
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, group: GroupKey) -> Option<Job> {
        self.jobs.read().await.get(&group).cloned()
    }

    /// Whether the job a delivery was fired for is still the installed one.
    pub async fn is_current(&self, group: GroupKey, generation: u64) -> bool {
        self.jobs
            .read()
            .await
            .get(&group)
            .is_some_and(|job| job.generation == generation)
    }

    /// Snapshot all due jobs and advance each `next_fire` by its interval.
    ///
    /// Rescheduling happens here, before delivery, so a failed or slow
    /// delivery never stalls the next fire.
    pub async fn take_due(&self, now: DateTime<Utc>) -> Vec<Job> {
        let mut jobs = self.jobs.write().await;
        let mut due = Vec::new();
        for job in jobs.values_mut() {
            if job.is_due(now) {
                due.push(job.clone());
                job.next_fire = now + job.interval();
            }
        }
        due
    }

    /// How long the scheduler should sleep before the next pass, clamped to
    /// [`MIN_SLEEP_SECS`, `MAX_SLEEP_SECS`].
    pub async fn sleep_duration(&self, now: DateTime<Utc>) -> std::time::Duration {
        let jobs = self.jobs.read().await;
        let next_due = jobs.values().map(|job| job.next_fire).min();

        let secs = match next_due {
            Some(next) => {
                let diff = (next - now).num_seconds();
                (diff.max(MIN_SLEEP_SECS as i64) as u64).min(MAX_SLEEP_SECS)
            }
            None => MAX_SLEEP_SECS,
        };

        std::time::Duration::from_secs(secs)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const G: GroupKey = GroupKey(-100);

    #[tokio::test]
    async fn upsert_is_exclusive_per_group() {
        let store = JobStore::new();
        store.upsert(G, 60, "first").await;
        store.upsert(G, 60, "second").await;

        assert_eq!(store.len().await, 1);
        let job = store.lookup(G).await.unwrap();
        assert_eq!(job.payload, "second");
    }

    #[tokio::test]
    async fn upsert_bumps_generation_and_invalidates_old() {
        let store = JobStore::new();
        let first = store.upsert(G, 60, "first").await;
        let second = store.upsert(G, 60, "second").await;

        assert!(second.generation > first.generation);
        assert!(!store.is_current(G, first.generation).await);
        assert!(store.is_current(G, second.generation).await);
    }

    #[tokio::test]
    async fn new_job_is_due_immediately() {
        let store = JobStore::new();
        store.upsert(G, 60, "hello").await;

        let due = store.take_due(Utc::now()).await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].payload, "hello");
    }

    #[tokio::test]
    async fn take_due_advances_next_fire_by_interval() {
        let store = JobStore::new();
        store.upsert(G, 60, "hello").await;

        let now = Utc::now();
        let taken = store.take_due(now).await;
        assert_eq!(taken.len(), 1);

        // Not due again within the same interval.
        assert!(store.take_due(now).await.is_empty());

        let job = store.lookup(G).await.unwrap();
        assert_eq!(job.next_fire, now + Duration::seconds(60));
    }

    #[tokio::test]
    async fn cancel_of_nonexistent_group_is_success() {
        let store = JobStore::new();
        assert!(!store.cancel_all_for_group(G).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn cancel_with_stale_handle_leaves_replacement_alone() {
        let store = JobStore::new();
        let stale = store.upsert(G, 60, "first").await;
        store.upsert(G, 60, "second").await;

        assert!(!store.cancel(stale).await);
        assert_eq!(store.lookup(G).await.unwrap().payload, "second");
    }

    #[tokio::test]
    async fn cancel_with_current_handle_removes_the_job() {
        let store = JobStore::new();
        let handle = store.upsert(G, 60, "only").await;
        assert!(store.cancel(handle).await);
        assert!(store.lookup(G).await.is_none());
    }

    #[tokio::test]
    async fn sleep_duration_with_no_jobs_is_the_max() {
        let store = JobStore::new();
        assert_eq!(
            store.sleep_duration(Utc::now()).await,
            std::time::Duration::from_secs(MAX_SLEEP_SECS)
        );
    }

    #[tokio::test]
    async fn sleep_duration_for_due_job_is_the_min() {
        let store = JobStore::new();
        store.upsert(G, 60, "hello").await;
        assert_eq!(
            store.sleep_duration(Utc::now()).await,
            std::time::Duration::from_secs(MIN_SLEEP_SECS)
        );
    }

    proptest! {
        // Whatever the fire horizon, the scheduler sleep stays in bounds.
        #[test]
        fn sleep_is_always_clamped(offset_secs in -10_000i64..10_000) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(async {
                let store = JobStore::new();
                store.upsert(G, 60, "hello").await;
                let now = Utc::now() - Duration::seconds(offset_secs);
                let sleep = store.sleep_duration(now).await.as_secs();
                prop_assert!((MIN_SLEEP_SECS..=MAX_SLEEP_SECS).contains(&sleep));
                Ok(())
            })?;
        }

        // take_due pushes next_fire exactly one interval past "now".
        #[test]
        fn reschedule_is_exactly_one_interval(interval_secs in 1u64..86_400) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(async {
                let store = JobStore::new();
                store.upsert(G, interval_secs, "hello").await;
                let now = Utc::now();
                store.take_due(now).await;
                let job = store.lookup(G).await.unwrap();
                prop_assert_eq!(job.next_fire, now + Duration::seconds(interval_secs as i64));
                Ok(())
            })?;
        }
    }
}
