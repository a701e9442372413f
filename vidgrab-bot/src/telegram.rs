//! Telegram Bot API client
//!
//! [`TelegramApi`] is the set of Bot API calls the handlers make. The
//! production implementation drives a `teloxide` [`Bot`]; failures are
//! mapped onto [`VidgrabError`] so the retry policy can tell a rate limit
//! or network hiccup from a rejected request.
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::retry::{retry_with_backoff, RetryConfig};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, ChatAction, InlineKeyboardMarkup, InputFile, MessageId, ParseMode,
};
use teloxide::RequestError;
use tracing::{debug, info};
use url::Url;
use vidgrab_types::{DownloadedVideo, Result, VidgrabError};

/// Who the token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: u64,
    pub username: Option<String>,
}

/// Operations the bot needs from Telegram
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// Register the webhook URL
    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()>;

    /// Identity of the bot (token check)
    async fn get_me(&self) -> Result<BotIdentity>;

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<MessageId>;

    /// Send a message with optional formatting and keyboard
    async fn send_rich_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId>;

    /// Send a photo by URL
    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        caption: &str,
        parse_mode: Option<ParseMode>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId>;

    async fn answer_callback_query(&self, query_id: &str, text: Option<&str>) -> Result<()>;

    async fn edit_message_caption(&self, chat_id: ChatId, message_id: MessageId, caption: &str) -> Result<()>;

    async fn edit_message_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;

    /// Upload a local video file
    async fn send_video(&self, chat_id: ChatId, video: &DownloadedVideo) -> Result<MessageId>;
}

/// Bot API client configuration
#[derive(Debug, Clone)]
pub struct BotApiConfig {
    pub api_url: String,
    pub bot_token: String,
    /// Timeout for regular JSON calls
    pub timeout_secs: u64,
    /// Timeout for video uploads
    pub upload_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl BotApiConfig {
    pub fn new(api_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            bot_token: bot_token.into(),
            timeout_secs: 30,
            upload_timeout_secs: 600,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_config(config: &vidgrab_config::BotConfig) -> Self {
        Self::new(config.telegram.api_url.clone(), config.telegram.bot_token.clone())
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Bot API client backed by `teloxide`
pub struct BotApiClient {
    bot: Bot,
    /// Same bot with the long upload timeout
    upload_bot: Bot,
    retry: RetryConfig,
}

impl BotApiClient {
    pub fn new(config: BotApiConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            VidgrabError::Config(format!("Invalid Bot API URL '{}': {}", config.api_url, e))
        })?;

        Ok(Self {
            bot: build_bot(&config.bot_token, &api_url, config.timeout_secs)?,
            upload_bot: build_bot(&config.bot_token, &api_url, config.upload_timeout_secs)?,
            retry: config.retry,
        })
    }

    /// Run one Bot API request, retrying transient failures
    async fn call<T, F, Fut>(&self, method: &str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        retry_with_backoff(&self.retry, method, || {
            debug!(method = method, "Calling Telegram Bot API");
            let pending = request();
            async move { pending.await.map_err(|e| map_request_error(method, e)) }
        })
        .await
    }
}

fn build_bot(token: &str, api_url: &Url, timeout_secs: u64) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;

    Ok(Bot::with_client(token, client).set_api_url(api_url.clone()))
}

/// Map a `teloxide` failure onto the retry classification
pub fn map_request_error(method: &str, error: RequestError) -> VidgrabError {
    match error {
        RequestError::RetryAfter(after) => VidgrabError::RateLimited {
            retry_after: after.as_secs(),
        },
        RequestError::Network(e) if e.is_timeout() => {
            VidgrabError::Timeout(format!("{} timed out", method))
        }
        RequestError::Network(e) => VidgrabError::Network(format!("{}: {}", method, e)),
        // Usually an HTML error page from a proxy in front of the Bot API
        RequestError::InvalidJson { .. } => {
            VidgrabError::Network(format!("{}: unexpected response body", method))
        }
        other => VidgrabError::Telegram(format!("{}: {}", method, other)),
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| VidgrabError::InvalidUrl(format!("{}: {}", raw, e)))
}

#[async_trait]
impl TelegramApi for BotApiClient {
    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let url = parse_url(url)?;

        self.call("setWebhook", || {
            let mut request = self
                .bot
                .set_webhook(url.clone())
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);
            if let Some(secret) = secret_token {
                request = request.secret_token(secret);
            }
            request.send()
        })
        .await?;

        info!("Webhook registered with Telegram");
        Ok(())
    }

    async fn get_me(&self) -> Result<BotIdentity> {
        let me = self.call("getMe", || self.bot.get_me().send()).await?;
        Ok(BotIdentity {
            id: me.user.id.0,
            username: me.user.username.clone(),
        })
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        self.send_rich_message(chat_id, text, None, None).await
    }

    async fn send_rich_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        let message = self
            .call("sendMessage", || {
                let mut request = self.bot.send_message(chat_id, text);
                if let Some(mode) = parse_mode {
                    request = request.parse_mode(mode);
                }
                if let Some(markup) = reply_markup {
                    request = request.reply_markup(markup.clone());
                }
                request.send()
            })
            .await?;

        Ok(message.id)
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        caption: &str,
        parse_mode: Option<ParseMode>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        let photo = parse_url(photo_url)?;

        let message = self
            .call("sendPhoto", || {
                let mut request = self
                    .bot
                    .send_photo(chat_id, InputFile::url(photo.clone()))
                    .caption(caption);
                if let Some(mode) = parse_mode {
                    request = request.parse_mode(mode);
                }
                if let Some(markup) = reply_markup {
                    request = request.reply_markup(markup.clone());
                }
                request.send()
            })
            .await?;

        Ok(message.id)
    }

    async fn answer_callback_query(&self, query_id: &str, text: Option<&str>) -> Result<()> {
        self.call("answerCallbackQuery", || {
            let mut request = self.bot.answer_callback_query(query_id);
            if let Some(text) = text {
                request = request.text(text);
            }
            request.send()
        })
        .await?;
        Ok(())
    }

    async fn edit_message_caption(&self, chat_id: ChatId, message_id: MessageId, caption: &str) -> Result<()> {
        self.call("editMessageCaption", || {
            self.bot
                .edit_message_caption(chat_id, message_id)
                .caption(caption)
                .send()
        })
        .await?;
        Ok(())
    }

    async fn edit_message_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        self.call("editMessageText", || {
            self.bot.edit_message_text(chat_id, message_id, text).send()
        })
        .await?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.call("sendChatAction", || self.bot.send_chat_action(chat_id, action).send())
            .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, video: &DownloadedVideo) -> Result<MessageId> {
        info!(
            chat_id = chat_id.0,
            size = video.size_bytes,
            file = %video.path.display(),
            "Uploading video to Telegram"
        );

        // Each attempt reopens the file
        let message = self
            .call("sendVideo", || {
                let file = InputFile::file(video.path.clone()).file_name(video.file_name());
                let mut request = self.upload_bot.send_video(chat_id, file).supports_streaming(true);
                if let Some(duration) = video.duration_secs {
                    request = request.duration(duration);
                }
                if let (Some(width), Some(height)) = (video.width, video.height) {
                    request = request.width(width).height(height);
                }
                request.send()
            })
            .await?;

        Ok(message.id)
    }
}

/// Escape text for `MarkdownV2` parse mode
pub fn escape_markdown_v2(text: &str) -> String {
    teloxide::utils::markdown::escape(text)
}
