//! Bot API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use herald_core::{ChatId, ChatInfo, SendError, Transport};

use crate::types::{ApiEnvelope, Chat, Message, TelegramUpdate, User};

/// Production API root; tests point `with_base_url` at a mock server.
const API_BASE: &str = "https://api.telegram.org";

/// Default per-request timeout for everything except long polls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra headroom on top of the long-poll timeout before the HTTP request
/// itself is abandoned.
const POLL_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Errors returned by the Bot API client.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("rate limited")]
    RateLimited,
}

impl From<TelegramError> for SendError {
    fn from(error: TelegramError) -> Self {
        match error {
            TelegramError::RateLimited => SendError::RateLimited,
            // 403: blocked/kicked; 400: chat not found. Both mean the target
            // cannot be reached as addressed.
            TelegramError::Api { code, description } if code == 400 || code == 403 => {
                SendError::Unreachable(description)
            }
            TelegramError::Api { description, .. } => SendError::Api(description),
            TelegramError::Http(e) if e.is_timeout() => SendError::Timeout,
            TelegramError::Http(e) => SendError::Unreachable(e.to_string()),
        }
    }
}

/// Client for the Telegram Bot API.
pub struct TelegramClient {
    http: Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    /// Create a client against the production API.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(API_BASE, token)
    }

    /// Create a client against an arbitrary API root (used by tests).
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &impl Serialize,
        request_timeout: Duration,
    ) -> Result<T, TelegramError> {
        let response = self
            .http
            .post(self.url(method))
            .timeout(request_timeout)
            .json(params)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TelegramError::RateLimited);
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.ok {
            return Err(TelegramError::Api {
                code: envelope.error_code.unwrap_or_default(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        envelope.result.ok_or_else(|| TelegramError::Api {
            code: 0,
            description: "ok response with empty result".to_string(),
        })
    }

    /// Identify the bot account behind the token. Fails fast on bad
    /// credentials, which is the one fatal startup error.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<TelegramUpdate>, TelegramError> {
        let params = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let request_timeout = Duration::from_secs(timeout_secs) + POLL_TIMEOUT_SLACK;
        self.call("getUpdates", &params, request_timeout).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let params = serde_json::json!({ "chat_id": chat_id, "text": text });
        let message: Message = self.call("sendMessage", &params, REQUEST_TIMEOUT).await?;
        debug!(chat_id, message_id = message.message_id, "sent message");
        Ok(message)
    }

    pub async fn forward_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> Result<Message, TelegramError> {
        let params = serde_json::json!({
            "chat_id": chat_id,
            "from_chat_id": from_chat_id,
            "message_id": message_id,
        });
        let forwarded: Message = self.call("forwardMessage", &params, REQUEST_TIMEOUT).await?;
        debug!(chat_id, from_chat_id, message_id, "forwarded message");
        Ok(forwarded)
    }

    /// Look up a chat by `@handle` or numeric id string.
    pub async fn get_chat(&self, chat: &str) -> Result<Chat, TelegramError> {
        let params = serde_json::json!({ "chat_id": chat });
        self.call("getChat", &params, REQUEST_TIMEOUT).await
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), SendError> {
        TelegramClient::send_message(self, chat.0, text).await?;
        Ok(())
    }

    async fn forward_message(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: i64,
    ) -> Result<(), SendError> {
        TelegramClient::forward_message(self, to.0, from.0, message_id).await?;
        Ok(())
    }

    async fn resolve_handle(&self, handle: &str) -> Result<ChatInfo, SendError> {
        let chat = self.get_chat(&format!("@{handle}")).await?;
        chat.info()
            .ok_or_else(|| SendError::Api(format!("@{handle} is not a usable chat type")))
    }
}
