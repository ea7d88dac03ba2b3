//! Core identifier and event types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric identifier of any chat (private, group, supergroup, or channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Numeric identifier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    /// The private chat with this user. The transport assigns private chats
    /// the same numeric id as the user they belong to.
    pub fn private_chat(self) -> ChatId {
        ChatId(self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalized identity of a broadcast target group.
///
/// Always numeric. A `@handle` reference is resolved to the chat id at
/// ingestion (via [`crate::Transport::resolve_handle`]), so a group claimed
/// through a forwarded message and later referenced by handle unifies to the
/// same key instead of occupying two map slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey(pub i64);

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ChatId> for GroupKey {
    fn from(chat: ChatId) -> Self {
        GroupKey(chat.0)
    }
}

impl From<GroupKey> for ChatId {
    fn from(group: GroupKey) -> Self {
        ChatId(group.0)
    }
}

/// What kind of chat an update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_private(self) -> bool {
        matches!(self, ChatKind::Private)
    }

    /// True for multi-member chats a broadcast can target.
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup | ChatKind::Channel)
    }
}

/// Chat metadata carried on every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
}

impl ChatInfo {
    /// Human-readable name for user-facing messages: the title when the chat
    /// has one, the numeric id otherwise.
    pub fn display_name(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// The message an update replies to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTo {
    pub message_id: i64,
    pub sender: Option<UserId>,
}

/// One inbound event from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub chat: ChatInfo,
    pub sender: Option<UserId>,
    pub message_id: i64,
    pub text: Option<String>,
    /// Origin chat of a forwarded message, when the transport exposes it.
    pub forwarded_from: Option<ChatInfo>,
    pub reply_to: Option<ReplyTo>,
}

/// An unresolved group reference extracted from a setup-conversation update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    /// The origin chat of a forwarded message.
    Forwarded(ChatInfo),
    /// A public `@handle`, stored without the `@` and lowercased.
    Handle(String),
}

impl GroupRef {
    /// Extract a group reference from an update: a forwarded-message origin
    /// takes priority, otherwise a leading `@` token in the text.
    pub fn from_update(update: &Update) -> Option<GroupRef> {
        if let Some(origin) = &update.forwarded_from {
            if origin.kind.is_group() {
                return Some(GroupRef::Forwarded(origin.clone()));
            }
        }

        let text = update.text.as_deref()?.trim();
        let token = text.split_whitespace().next()?;
        let handle = token.strip_prefix('@')?;
        if handle.is_empty() {
            return None;
        }
        Some(GroupRef::Handle(handle.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn private_update(text: &str) -> Update {
        Update {
            chat: ChatInfo {
                id: ChatId(100),
                kind: ChatKind::Private,
                title: None,
            },
            sender: Some(UserId(100)),
            message_id: 1,
            text: Some(text.to_string()),
            forwarded_from: None,
            reply_to: None,
        }
    }

    #[test]
    fn group_key_unifies_with_chat_id() {
        let chat = ChatId(-1001234);
        assert_eq!(GroupKey::from(chat), GroupKey(-1001234));
        assert_eq!(ChatId::from(GroupKey(-1001234)), chat);
    }

    #[test]
    fn private_chat_id_matches_user_id() {
        assert_eq!(UserId(42).private_chat(), ChatId(42));
    }

    #[test]
    fn forwarded_origin_wins_over_handle_text() {
        let mut update = private_update("@somewhere");
        update.forwarded_from = Some(ChatInfo {
            id: ChatId(-200),
            kind: ChatKind::Supergroup,
            title: Some("Ops".to_string()),
        });

        match GroupRef::from_update(&update) {
            Some(GroupRef::Forwarded(chat)) => assert_eq!(chat.id, ChatId(-200)),
            other => panic!("expected forwarded ref, got {:?}", other),
        }
    }

    #[test]
    fn forward_from_private_chat_is_not_a_group_ref() {
        // Forwarding a message that originated in another private chat names
        // no group; the text fallback still applies.
        let mut update = private_update("hello");
        update.forwarded_from = Some(ChatInfo {
            id: ChatId(77),
            kind: ChatKind::Private,
            title: None,
        });
        assert_eq!(GroupRef::from_update(&update), None);
    }

    #[test_case("@MyGroup", Some("mygroup") ; "simple handle, lowercased")]
    #[test_case("  @ops_team extra words", Some("ops_team") ; "leading whitespace and trailing words")]
    #[test_case("@", None ; "bare at sign")]
    #[test_case("no handle here", None ; "plain text")]
    #[test_case("", None ; "empty text")]
    fn handle_extraction(text: &str, expected: Option<&str>) {
        let update = private_update(text);
        let got = GroupRef::from_update(&update);
        match expected {
            Some(handle) => assert_eq!(got, Some(GroupRef::Handle(handle.to_string()))),
            None => assert_eq!(got, None),
        }
    }

    #[test]
    fn display_name_prefers_title() {
        let chat = ChatInfo {
            id: ChatId(-5),
            kind: ChatKind::Group,
            title: Some("Release Crew".to_string()),
        };
        assert_eq!(chat.display_name(), "Release Crew");

        let untitled = ChatInfo {
            id: ChatId(-5),
            kind: ChatKind::Group,
            title: None,
        };
        assert_eq!(untitled.display_name(), "-5");
    }
}
