//! Herald: recurring group broadcasts configured over private chat.

use clap::Parser;
use miette::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use herald::daemon::{self, DaemonConfig};

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Recurring group broadcast bot over the Telegram Bot API")]
struct Cli {
    /// Bot API token
    #[arg(long, env = "HERALD_BOT_TOKEN", hide_env_values = true)]
    token: String,

    /// Override the Bot API root (for self-hosted API servers)
    #[arg(long, env = "HERALD_API_URL")]
    api_url: Option<String>,

    /// Long-poll timeout in seconds
    #[arg(long, default_value_t = 30)]
    poll_timeout: u64,

    /// Seconds between broadcast fires
    #[arg(long, default_value_t = 60)]
    broadcast_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "herald=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    daemon::run(DaemonConfig {
        token: cli.token,
        api_url: cli.api_url,
        poll_timeout_secs: cli.poll_timeout,
        broadcast_interval_secs: cli.broadcast_interval,
    })
    .await
}
