//! Long-polling update loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use herald_core::Update;

use crate::TelegramClient;

/// Initial backoff after a failed poll.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Cap on the poll backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Long-polls the Bot API and feeds converted updates into the dispatch
/// channel. Transport failures back off with doubling delays and never kill
/// the loop; only channel closure or shutdown ends it.
pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    poll_timeout_secs: u64,
}

impl UpdatePoller {
    pub fn new(client: Arc<TelegramClient>, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            poll_timeout_secs,
        }
    }

    /// Run until shutdown or until the dispatch side hangs up.
    pub async fn run(self, tx: mpsc::Sender<Update>, mut shutdown_rx: watch::Receiver<bool>) {
        info!("update poller started");

        let mut offset = 0i64;
        let mut backoff = Duration::ZERO;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            if backoff > Duration::ZERO {
                debug!(backoff_secs = backoff.as_secs(), "poll backoff");
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => continue,
                    _ = sleep(backoff) => {}
                }
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                polled = self.client.get_updates(offset, self.poll_timeout_secs) => {
                    match polled {
                        Ok(raw_updates) => {
                            backoff = Duration::ZERO;
                            for raw in raw_updates {
                                offset = offset.max(raw.update_id + 1);
                                let Some(update) = raw.into_update() else {
                                    continue;
                                };
                                if tx.send(update).await.is_err() {
                                    info!("dispatch channel closed, poller exiting");
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            backoff = next_backoff(backoff);
                            warn!(
                                error = %e,
                                backoff_secs = backoff.as_secs(),
                                "getUpdates failed, backing off"
                            );
                        }
                    }
                }
            }
        }

        info!("update poller stopped");
    }
}

fn next_backoff(current: Duration) -> Duration {
    if current.is_zero() {
        INITIAL_BACKOFF
    } else {
        (current * 2).min(MAX_BACKOFF)
    }
}
