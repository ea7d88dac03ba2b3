//! Error types shared across the core.

use thiserror::Error;

use crate::{GroupKey, UserId};

/// Failure to deliver through the messaging transport.
///
/// These are logged and swallowed on the broadcast and forward paths; a
/// delivery failure never cancels a job or reaches a group chat.
#[derive(Debug, Error)]
pub enum SendError {
    /// The API rejected the request.
    #[error("API error: {0}")]
    Api(String),

    /// The target chat could not be reached (bot removed, user blocked, ...).
    #[error("chat unreachable: {0}")]
    Unreachable(String),

    /// The transport asked us to back off.
    #[error("rate limited")]
    RateLimited,

    /// The request did not complete within the delivery timeout.
    #[error("request timed out")]
    Timeout,
}

/// A claim on a group that is already routed to a different initiator.
///
/// First-writer-wins: the existing entry is left untouched and the new
/// initiator's setup is aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("group {group} is already set up by another user")]
pub struct AlreadyClaimed {
    pub group: GroupKey,
    pub by: UserId,
}
