//! Telegram Bot API transport for herald.
//!
//! Implements the core's [`herald_core::Transport`] trait over the Bot API
//! (sendMessage, forwardMessage, getChat) and feeds inbound updates to the
//! dispatcher through a long-polling [`UpdatePoller`].

mod client;
mod poller;
mod types;

pub use client::{TelegramClient, TelegramError};
pub use poller::UpdatePoller;
pub use types::{Chat, Message, TelegramUpdate, User};
