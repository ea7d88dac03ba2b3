//! Daemon wiring: authenticates the bot, then runs the poller, dispatcher,
//! and scheduler until shutdown.

use std::sync::Arc;

use miette::{Result, miette};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use herald_core::{GroupKey, RoutingTable, Transport, UserId};
use herald_scheduler::{Broadcaster, JobStore, Scheduler};
use herald_telegram::{TelegramClient, UpdatePoller};

use crate::dispatch::Dispatcher;

/// Capacity of the inbound update queue between the poller and dispatcher.
const UPDATE_QUEUE_SIZE: usize = 64;

pub struct DaemonConfig {
    pub token: String,
    /// Override of the Bot API root, for self-hosted API servers.
    pub api_url: Option<String>,
    pub poll_timeout_secs: u64,
    pub broadcast_interval_secs: u64,
}

pub async fn run(config: DaemonConfig) -> Result<()> {
    if config.token.trim().is_empty() {
        return Err(miette!("bot token is empty; set HERALD_BOT_TOKEN"));
    }
    if config.broadcast_interval_secs == 0 {
        return Err(miette!("broadcast interval must be at least one second"));
    }

    let client = Arc::new(match &config.api_url {
        Some(url) => TelegramClient::with_base_url(url.clone(), &config.token),
        None => TelegramClient::new(&config.token),
    });

    // Bad credentials are the one fatal startup error; everything after this
    // retries instead of exiting.
    let me = client
        .get_me()
        .await
        .map_err(|e| miette!("could not authenticate with the Bot API: {e}"))?;
    let self_id = UserId(me.id);
    info!(bot_id = %self_id, username = ?me.username, "authenticated");

    let jobs = Arc::new(JobStore::new());
    let routing = RoutingTable::new();
    let transport: Arc<dyn Transport> = client.clone();
    let dispatcher = Dispatcher::new(
        Arc::clone(&transport),
        routing,
        Arc::clone(&jobs),
        self_id,
        config.broadcast_interval_secs,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal");
            }
            let _ = shutdown_tx.send(true);
        });
    }

    let (update_tx, mut update_rx) = mpsc::channel(UPDATE_QUEUE_SIZE);
    let poller_handle = {
        let poller = UpdatePoller::new(Arc::clone(&client), config.poll_timeout_secs);
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { poller.run(update_tx, shutdown_rx).await })
    };

    let scheduler_handle = {
        let scheduler = Scheduler::new(Arc::clone(&jobs));
        let shutdown_rx = shutdown_rx.clone();
        let broadcaster = send_message_broadcaster(Arc::clone(&transport));
        tokio::spawn(async move { scheduler.run(shutdown_rx, broadcaster).await })
    };

    // The dispatch loop runs on this task. Everything that mutates sessions,
    // claims, or jobs in response to an update happens here, in order.
    let mut shutdown_rx = shutdown_rx;
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }

            update = update_rx.recv() => {
                match update {
                    Some(update) => dispatcher.handle_update(update).await,
                    None => {
                        warn!("update channel closed, shutting down");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                }
            }
        }
    }

    info!("waiting for daemon tasks to stop");
    let _ = poller_handle.await;
    let _ = scheduler_handle.await;
    info!("daemon shut down");
    Ok(())
}

/// Broadcast deliveries are plain sends into the group's chat.
fn send_message_broadcaster(transport: Arc<dyn Transport>) -> Broadcaster {
    Arc::new(move |group: GroupKey, payload: String| {
        let transport = Arc::clone(&transport);
        Box::pin(async move { transport.send_message(group.into(), &payload).await })
    })
}
