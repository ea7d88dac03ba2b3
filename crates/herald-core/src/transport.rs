//! The messaging transport as seen by the orchestration core.

use async_trait::async_trait;

use crate::{ChatId, ChatInfo, SendError};

/// Outbound operations the core needs from the chat transport.
///
/// The core owns no sockets; everything it emits goes through this trait.
/// Implementations must be cheap to share (`Arc<dyn Transport>`) and bound
/// every call by their own request timeout so a stuck transport cannot stall
/// the scheduler or the dispatch loop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message to a chat.
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), SendError>;

    /// Forward an existing message from one chat to another.
    async fn forward_message(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: i64,
    ) -> Result<(), SendError>;

    /// Resolve a public `@handle` (without the `@`) to the chat it names.
    async fn resolve_handle(&self, handle: &str) -> Result<ChatInfo, SendError>;
}
