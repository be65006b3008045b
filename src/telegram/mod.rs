//! Telegram Bot API transport
//!
//! Thin client over the HTTP Bot API: long-polled `getUpdates`, message
//! sending with optional inline keyboards, best-effort deletion, and
//! callback-query acknowledgement.

use crate::error::{BotError, Result};
use crate::notify::Notifier;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Telegram Bot API client
#[derive(Debug, Clone)]
pub struct TelegramApi {
    http: Client,
    base_url: String,
}

/// One entry from `getUpdates`
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Inline keyboard attached to an outgoing message
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Command menu entry registered via `setMyCommands`
#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Debug, Serialize)]
struct DeleteMessageRequest {
    chat_id: i64,
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SetMyCommandsRequest<'a> {
    commands: &'a [BotCommand],
}

impl TelegramApi {
    pub fn new(bot_token: &str) -> Result<Self> {
        let http = Client::builder()
            // Above the 30s getUpdates long-poll window
            .timeout(std::time::Duration::from_secs(40))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("https://api.telegram.org/bot{}", bot_token),
        })
    }

    /// Long-poll for updates newer than `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let url = format!("{}/getUpdates", self.base_url);
        let resp: ApiResponse<Vec<Update>> = self
            .http
            .get(&url)
            .query(&[("offset", offset.to_string()), ("timeout", "30".to_string())])
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(BotError::Telegram(
                resp.description.unwrap_or_else(|| "getUpdates failed".to_string()),
            ));
        }
        Ok(resp.result.unwrap_or_default())
    }

    /// Send a plain text message
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send(chat_id, text, None).await
    }

    /// Send a message with an inline keyboard
    pub async fn send_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()> {
        self.send(chat_id, text, Some(keyboard)).await
    }

    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup,
        };

        let resp: ApiResponse<serde_json::Value> =
            self.http.post(&url).json(&request).send().await?.json().await?;

        if !resp.ok {
            return Err(BotError::Telegram(
                resp.description.unwrap_or_else(|| "sendMessage failed".to_string()),
            ));
        }
        Ok(())
    }

    /// Delete a message, tolerating "already deleted".
    ///
    /// Users may remove their own messages before the bot gets to them;
    /// Telegram answers 400 for those and the flow must carry on.
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let url = format!("{}/deleteMessage", self.base_url);
        let request = DeleteMessageRequest { chat_id, message_id };

        let resp: ApiResponse<serde_json::Value> =
            self.http.post(&url).json(&request).send().await?.json().await?;

        if !resp.ok {
            debug!(
                chat_id,
                message_id,
                description = resp.description.as_deref().unwrap_or(""),
                "delete ignored, message already gone"
            );
        }
        Ok(())
    }

    /// Register the bot's command menu so the commands show up in the
    /// Telegram client UI
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let url = format!("{}/setMyCommands", self.base_url);
        let request = SetMyCommandsRequest { commands };

        let resp: ApiResponse<serde_json::Value> =
            self.http.post(&url).json(&request).send().await?.json().await?;

        if !resp.ok {
            return Err(BotError::Telegram(
                resp.description
                    .unwrap_or_else(|| "setMyCommands failed".to_string()),
            ));
        }
        Ok(())
    }

    /// Acknowledge a callback query so the client stops its spinner
    pub async fn answer_callback(&self, callback_query_id: &str) -> Result<()> {
        let url = format!("{}/answerCallbackQuery", self.base_url);
        let request = AnswerCallbackRequest { callback_query_id };

        let resp: ApiResponse<serde_json::Value> =
            self.http.post(&url).json(&request).send().await?.json().await?;

        if !resp.ok {
            return Err(BotError::Telegram(
                resp.description
                    .unwrap_or_else(|| "answerCallbackQuery failed".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramApi {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(chat_id, text).await
    }
}
