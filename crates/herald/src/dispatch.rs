//! Update dispatcher: drives the setup conversation and owns every mutation
//! of sessions, claims, and jobs.
//!
//! All updates flow through [`Dispatcher::handle_update`] on a single task,
//! so two messages from the same initiator can never interleave mid-flow.

use std::sync::Arc;

use tracing::{debug, info, warn};

use herald_core::{
    ChatId, ChatInfo, GroupKey, GroupRef, ReplyRouter, RoutingTable, SessionState, SessionStore,
    Transport, Update, UserId,
};
use herald_scheduler::JobStore;

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    routing: RoutingTable,
    jobs: Arc<JobStore>,
    sessions: SessionStore,
    reply_router: ReplyRouter,
    /// Seconds between fires for every configured broadcast.
    interval_secs: u64,
}

enum Command {
    Start,
    Stop,
}

/// Parse a bot command from the first token of a message. Commands addressed
/// to a specific bot (`/start@herald_bot`) count too.
fn command(text: Option<&str>) -> Option<Command> {
    let first = text?.trim().split_whitespace().next()?;
    let name = first.split('@').next().unwrap_or(first);
    match name {
        "/start" => Some(Command::Start),
        "/stop" => Some(Command::Stop),
        _ => None,
    }
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        routing: RoutingTable,
        jobs: Arc<JobStore>,
        self_id: UserId,
        interval_secs: u64,
    ) -> Self {
        let reply_router = ReplyRouter::new(Arc::clone(&transport), routing.clone(), self_id);
        Self {
            transport,
            routing,
            jobs,
            sessions: SessionStore::new(),
            reply_router,
            interval_secs,
        }
    }

    /// Handle one inbound update. Never fails: per-update problems are
    /// reported back to the user or logged and dropped.
    pub async fn handle_update(&self, update: Update) {
        let Some(sender) = update.sender else {
            debug!(chat = %update.chat.id, "update without a sender, ignoring");
            return;
        };

        match command(update.text.as_deref()) {
            Some(Command::Start) => self.handle_start(&update, sender).await,
            Some(Command::Stop) => self.handle_stop(&update, sender).await,
            None if update.chat.kind.is_private() => {
                self.handle_private_text(&update, sender).await;
            }
            None => {
                self.reply_router.route(&update).await;
            }
        }
    }

    async fn handle_start(&self, update: &Update, sender: UserId) {
        if !update.chat.kind.is_private() {
            self.send(
                update.chat.id,
                "Setup happens in a private chat. Message me directly and send /start.",
            )
            .await;
            return;
        }

        // A repeated /start mid-setup restates the current prompt instead of
        // discarding progress.
        if self.sessions.state(sender).await.in_progress() {
            self.send(
                update.chat.id,
                "Setup is already in progress. Forward a message from the target group or send \
                 its @handle. Send /stop to abort.",
            )
            .await;
            return;
        }

        self.sessions.set(sender, SessionState::AwaitingGroup).await;
        info!(%sender, "setup conversation started");
        self.send(
            update.chat.id,
            "Let's set up a recurring broadcast. Forward me any message from the target group, \
             or send its public @handle.",
        )
        .await;
    }

    /// `/stop` works from any chat and any session state.
    async fn handle_stop(&self, update: &Update, sender: UserId) {
        self.sessions.reset(sender).await;

        match self.routing.group_for(sender) {
            Some(group) => {
                self.jobs.cancel_all_for_group(group).await;
                self.routing.release(group);
                info!(%sender, %group, "broadcast stopped");
                self.send(update.chat.id, "Broadcast stopped and the group released. 👋")
                    .await;
            }
            None => {
                self.send(update.chat.id, "Nothing to stop: you have no active broadcast.")
                    .await;
            }
        }
    }

    async fn handle_private_text(&self, update: &Update, sender: UserId) {
        match self.sessions.state(sender).await {
            SessionState::Idle => {
                debug!(%sender, "private message outside a setup conversation, ignoring");
            }
            SessionState::AwaitingGroup => self.handle_group_reference(update, sender).await,
            SessionState::AwaitingMessage { group } => {
                self.handle_payload(update, sender, group).await;
            }
        }
    }

    async fn handle_group_reference(&self, update: &Update, sender: UserId) {
        let Some(reference) = GroupRef::from_update(update) else {
            self.send(
                update.chat.id,
                "I couldn't identify a group from that. Forward a message from the group, or \
                 send its public @handle.",
            )
            .await;
            return;
        };

        let chat = match self.resolve_group(update, sender, reference).await {
            Some(chat) => chat,
            None => return,
        };

        let group = GroupKey::from(chat.id);
        if let Err(conflict) = self.routing.claim(group, sender) {
            // The conflict ends this conversation; the other initiator's
            // broadcast stays untouched.
            self.sessions.reset(sender).await;
            info!(%sender, %group, holder = %conflict.by, "claim conflict, setup aborted");
            self.send(
                update.chat.id,
                &format!(
                    "{} already has a broadcast set up by someone else. Ask them to /stop it \
                     first.",
                    chat.display_name()
                ),
            )
            .await;
            return;
        }

        self.sessions
            .set(sender, SessionState::AwaitingMessage { group })
            .await;
        self.send(
            update.chat.id,
            &format!(
                "Got it, broadcasting to {}. Now send me the message text.",
                chat.display_name()
            ),
        )
        .await;
    }

    /// Turn a group reference into concrete chat metadata. Reports the
    /// problem to the user and returns `None` when the reference doesn't
    /// name a usable group; the session stays in `AwaitingGroup` so the
    /// initiator can try again.
    async fn resolve_group(
        &self,
        update: &Update,
        sender: UserId,
        reference: GroupRef,
    ) -> Option<ChatInfo> {
        match reference {
            GroupRef::Forwarded(chat) => Some(chat),
            GroupRef::Handle(handle) => match self.transport.resolve_handle(&handle).await {
                Ok(chat) if chat.kind.is_group() => Some(chat),
                Ok(_) => {
                    self.send(
                        update.chat.id,
                        &format!("@{handle} is not a group. Try another group."),
                    )
                    .await;
                    None
                }
                Err(e) => {
                    warn!(error = %e, %sender, handle, "handle resolution failed");
                    self.send(
                        update.chat.id,
                        &format!("I couldn't find @{handle}. Check the handle and try again."),
                    )
                    .await;
                    None
                }
            },
        }
    }

    async fn handle_payload(&self, update: &Update, sender: UserId, group: GroupKey) {
        let text = update.text.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            self.send(
                update.chat.id,
                "The broadcast needs some text. Send the message you want posted.",
            )
            .await;
            return;
        }

        self.jobs.upsert(group, self.interval_secs, text).await;
        self.sessions.reset(sender).await;
        info!(%sender, %group, "broadcast configured");
        self.send(
            update.chat.id,
            &format!(
                "✅ Done! I'll post your message every {} seconds. Send /stop to end it.",
                self.interval_secs
            ),
        )
        .await;
    }

    /// Best-effort reply into a chat. A user we cannot reach is a log line,
    /// not a dispatcher failure.
    async fn send(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.transport.send_message(chat, text).await {
            warn!(error = %e, %chat, "failed to send reply");
        }
    }
}
