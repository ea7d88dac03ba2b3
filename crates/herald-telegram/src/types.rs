//! Wire types for the Bot API subset herald uses, and their conversion into
//! the core's transport-agnostic `Update` model.

use serde::Deserialize;

use herald_core::{ChatId, ChatInfo, ChatKind, ReplyTo, Update, UserId};

/// Every Bot API response wraps its payload in this envelope.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// "private", "group", "supergroup", or "channel".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Chat {
    /// Convert into the core's chat metadata. `None` for chat types the
    /// core does not model.
    pub fn info(&self) -> Option<ChatInfo> {
        let kind = match self.kind.as_str() {
            "private" => ChatKind::Private,
            "group" => ChatKind::Group,
            "supergroup" => ChatKind::Supergroup,
            "channel" => ChatKind::Channel,
            _ => return None,
        };
        Some(ChatInfo {
            id: ChatId(self.id),
            kind,
            title: self.title.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    /// Origin chat when this message was forwarded from a group or channel.
    #[serde(default)]
    pub forward_from_chat: Option<Chat>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    /// Convert into a core update. `None` when the chat type is unknown.
    pub fn into_update(self) -> Option<Update> {
        let chat = self.chat.info()?;
        let reply_to = self.reply_to_message.as_ref().map(|replied| ReplyTo {
            message_id: replied.message_id,
            sender: replied.from.as_ref().map(|user| UserId(user.id)),
        });

        Some(Update {
            chat,
            sender: self.from.map(|user| UserId(user.id)),
            message_id: self.message_id,
            text: self.text,
            forwarded_from: self.forward_from_chat.and_then(|origin| origin.info()),
            reply_to,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

impl TelegramUpdate {
    /// Convert into a core update, dropping update kinds without a message.
    pub fn into_update(self) -> Option<Update> {
        self.message?.into_update()
    }
}
