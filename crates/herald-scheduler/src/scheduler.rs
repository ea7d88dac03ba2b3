//! Scheduler loop: fires due jobs and reschedules them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use herald_core::{GroupKey, SendError};

use crate::{Job, JobStore};

/// Upper bound on a single broadcast delivery; a transport that hangs must
/// not pile up delivery tasks.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivery callback invoked with each due job's target group and payload.
pub type Broadcaster = Arc<
    dyn Fn(GroupKey, String) -> Pin<Box<dyn Future<Output = Result<(), SendError>> + Send>>
        + Send
        + Sync,
>;

/// Fires each active job once per interval.
///
/// Jobs for different groups fire on independent spawned tasks. Delivery
/// failures are logged and swallowed; the job keeps retrying every interval
/// until it is cancelled or replaced.
pub struct Scheduler {
    store: Arc<JobStore>,
}

impl Scheduler {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Run the scheduler loop until the shutdown channel flips.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>, broadcaster: Broadcaster) {
        info!("scheduler starting");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            for job in self.store.take_due(Utc::now()).await {
                let store = Arc::clone(&self.store);
                let broadcaster = Arc::clone(&broadcaster);
                tokio::spawn(async move {
                    deliver(store, broadcaster, job).await;
                });
            }

            let pause = self.store.sleep_duration(Utc::now()).await;
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                    }
                }
                _ = sleep(pause) => {}
            }
        }

        info!("scheduler shut down");
    }
}

/// Deliver one fired job.
///
/// The generation check makes cancellation and replacement visible before a
/// send starts: a delivery for a job that is no longer installed is dropped.
/// A send that has already passed the check completes best-effort.
async fn deliver(store: Arc<JobStore>, broadcaster: Broadcaster, job: Job) {
    if !store.is_current(job.group, job.generation).await {
        debug!(
            group = %job.group,
            generation = job.generation,
            "job cancelled or replaced before delivery, dropping fire"
        );
        return;
    }

    match timeout(DELIVERY_TIMEOUT, broadcaster(job.group, job.payload.clone())).await {
        Ok(Ok(())) => {
            debug!(group = %job.group, "broadcast delivered");
        }
        Ok(Err(e)) => {
            warn!(
                group = %job.group,
                error = %e,
                "broadcast delivery failed, retrying next interval"
            );
        }
        Err(_) => {
            warn!(
                group = %job.group,
                timeout_secs = DELIVERY_TIMEOUT.as_secs(),
                "broadcast delivery timed out, retrying next interval"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    const G: GroupKey = GroupKey(-100);

    /// Broadcaster recording every invocation, optionally failing them all.
    fn recording_broadcaster(
        fail: bool,
    ) -> (Broadcaster, Arc<Mutex<Vec<(GroupKey, String)>>>, mpsc::UnboundedReceiver<()>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let fired_clone = Arc::clone(&fired);

        let broadcaster: Broadcaster = Arc::new(move |group, payload| {
            let fired = Arc::clone(&fired_clone);
            let tx = tx.clone();
            Box::pin(async move {
                fired.lock().unwrap().push((group, payload));
                let _ = tx.send(());
                if fail {
                    Err(SendError::Unreachable("simulated".to_string()))
                } else {
                    Ok(())
                }
            })
        });

        (broadcaster, fired, rx)
    }

    #[tokio::test]
    async fn fires_new_job_immediately() {
        let store = Arc::new(JobStore::new());
        store.upsert(G, 60, "Hello").await;

        let (broadcaster, fired, mut rx) = recording_broadcaster(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(Arc::clone(&store));

        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx, broadcaster).await });

        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("job should fire on the first pass");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let fired = fired.lock().unwrap();
        assert_eq!(fired[0], (G, "Hello".to_string()));
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_job_scheduled() {
        let store = Arc::new(JobStore::new());
        store.upsert(G, 60, "Hello").await;

        let (broadcaster, _fired, mut rx) = recording_broadcaster(true);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(Arc::clone(&store));

        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx, broadcaster).await });

        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("job should fire despite the coming failure");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        // Job still installed and rescheduled one interval out.
        let job = store.lookup(G).await.expect("failed job must stay active");
        assert!(job.next_fire > Utc::now());
    }

    #[tokio::test]
    async fn stale_delivery_is_suppressed_after_replacement() {
        let store = Arc::new(JobStore::new());
        store.upsert(G, 60, "old text").await;
        let stale = store.take_due(Utc::now()).await.pop().unwrap();

        // Replacement lands while the old fire is still in flight.
        store.upsert(G, 60, "new text").await;

        let (broadcaster, fired, _rx) = recording_broadcaster(false);
        deliver(Arc::clone(&store), broadcaster, stale).await;

        assert!(
            fired.lock().unwrap().is_empty(),
            "stale generation must not broadcast"
        );
    }

    #[tokio::test]
    async fn cancelled_job_does_not_deliver() {
        let store = Arc::new(JobStore::new());
        store.upsert(G, 60, "Hello").await;
        let taken = store.take_due(Utc::now()).await.pop().unwrap();

        store.cancel_all_for_group(G).await;

        let (broadcaster, fired, _rx) = recording_broadcaster(false);
        deliver(Arc::clone(&store), broadcaster, taken).await;

        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop_with_no_jobs() {
        let store = Arc::new(JobStore::new());
        let (broadcaster, _fired, _rx) = recording_broadcaster(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(store);

        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx, broadcaster).await });
        shutdown_tx.send(true).unwrap();

        timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler should exit promptly on shutdown")
            .unwrap();
    }
}
