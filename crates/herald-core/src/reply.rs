//! Reply router: forwards group replies to the bot's broadcasts back to the
//! initiator who configured the group.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{GroupKey, RoutingTable, Transport, Update, UserId};

/// Inspects group-chat updates and forwards replies to tracked broadcasts.
///
/// Forwarding failures (initiator blocked the bot, ...) are logged and
/// swallowed; nothing is ever posted back into the group.
pub struct ReplyRouter {
    transport: Arc<dyn Transport>,
    routing: RoutingTable,
    /// The bot's own user id; only replies to our messages are forwarded.
    self_id: UserId,
}

impl ReplyRouter {
    pub fn new(transport: Arc<dyn Transport>, routing: RoutingTable, self_id: UserId) -> Self {
        Self {
            transport,
            routing,
            self_id,
        }
    }

    /// Route one group-chat update. Returns `true` when the message was
    /// forwarded to an initiator.
    pub async fn route(&self, update: &Update) -> bool {
        if !update.chat.kind.is_group() {
            return false;
        }
        let Some(reply) = &update.reply_to else {
            return false;
        };
        if reply.sender != Some(self.self_id) {
            // A reply to someone else's message; not ours to forward.
            return false;
        }

        let group = GroupKey::from(update.chat.id);
        let Some(initiator) = self.routing.initiator_for(group) else {
            debug!(%group, "reply in untracked group, ignoring");
            return false;
        };

        let target = initiator.private_chat();
        if let Err(e) = self
            .transport
            .forward_message(target, update.chat.id, update.message_id)
            .await
        {
            warn!(error = %e, %group, %initiator, "failed to forward reply to initiator");
            return false;
        }

        let note = format!("↩️ Reply from {}", update.chat.display_name());
        if let Err(e) = self.transport.send_message(target, &note).await {
            warn!(error = %e, %group, %initiator, "failed to send provenance note");
        }

        debug!(%group, %initiator, message_id = update.message_id, "forwarded group reply");
        true
    }
}
