//! Update handlers
//!
//! Conversation flow:
//! 1. `/start` - usage hint
//! 2. a link - metadata lookup, thumbnail + title + "Download MP4" button
//! 3. button press - download, size check, upload
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


use crate::dispatcher::UpdateHandler;
use crate::extractor::MediaExtractor;
use crate::links::extract_url;
use crate::probe::{probe_video, VideoProbe};
use crate::session::{PendingLink, PromptKind, SessionStore};
use crate::telegram::{escape_markdown_v2, TelegramApi};
use crate::updates::{classify, Incoming};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::types::{
    ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageEntity, MessageId,
    ParseMode, Update, UserId,
};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;
use vidgrab_config::BotConfig;
use vidgrab_types::{DownloadedVideo, Result, VidgrabError};

pub const START_TEXT: &str = "Send any video link (YouTube, Instagram, FB, TikTok).";
pub const METADATA_FAILED_TEXT: &str = "❌ Unable to fetch video details.";
pub const DOWNLOADING_TEXT: &str = "⏳ Downloading… Please wait...";
pub const QUEUED_TEXT: &str = "⏳ Waiting for a free download slot...";
pub const DOWNLOAD_FAILED_TEXT: &str = "❌ Download failed. Try another link.";
pub const LINK_EXPIRED_TEXT: &str = "⚠️ Link expired. Send it again.";
pub const DOWNLOAD_BUTTON_TEXT: &str = "⬇ Download MP4";
pub const DOWNLOAD_CALLBACK: &str = "dl";

/// Longest title shown in a caption (captions are capped at 1024 chars)
const MAX_TITLE_CHARS: usize = 200;

/// Handler settings
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub max_upload_bytes: u64,
    pub download_dir: PathBuf,
    pub ffprobe_path: String,
    pub max_concurrent_downloads: usize,
}

impl HandlerSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            max_upload_bytes: config.telegram.max_upload_bytes,
            download_dir: config.downloader.download_dir.clone(),
            ffprobe_path: config.downloader.ffprobe_path.clone(),
            max_concurrent_downloads: config.downloader.max_concurrent_downloads,
        }
    }
}

/// Message shown when a file exceeds the upload limit
pub fn too_large_text(limit_bytes: u64) -> String {
    format!(
        "❌ File is larger than {} MB. Telegram cannot send it.",
        limit_bytes / (1024 * 1024)
    )
}

/// Caption under the thumbnail, in MarkdownV2
pub fn video_caption(title: &str, platform: &str) -> String {
    let title: String = title.chars().take(MAX_TITLE_CHARS).collect();
    format!(
        "🎬 *{}*\n📌 Platform: {}",
        escape_markdown_v2(&title),
        escape_markdown_v2(platform)
    )
}

/// Keyboard with the single Download button
pub fn download_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        DOWNLOAD_BUTTON_TEXT,
        DOWNLOAD_CALLBACK,
    )]])
}

/// Handles every update the bot receives
pub struct BotHandler {
    api: Arc<dyn TelegramApi>,
    extractor: Arc<dyn MediaExtractor>,
    sessions: Arc<SessionStore>,
    download_permits: Arc<Semaphore>,
    settings: HandlerSettings,
}

impl BotHandler {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        extractor: Arc<dyn MediaExtractor>,
        sessions: Arc<SessionStore>,
        settings: HandlerSettings,
    ) -> Self {
        let permits = settings.max_concurrent_downloads.max(1);
        Self {
            api,
            extractor,
            sessions,
            download_permits: Arc::new(Semaphore::new(permits)),
            settings,
        }
    }

    /// Handle a single update
    pub async fn handle_update(&self, update: Update) -> Result<()> {
        match classify(&update) {
            Incoming::Command { chat_id, command } => self.handle_command(chat_id, &command).await,
            Incoming::Text {
                chat_id,
                user_id,
                text,
                entities,
            } => self.handle_text(chat_id, user_id, &text, &entities).await,
            Incoming::Callback {
                query_id,
                chat_id,
                message_id,
                user_id,
                data,
            } => {
                self.handle_callback(&query_id, chat_id, message_id, user_id, &data)
                    .await
            }
            Incoming::Ignored => Ok(()),
        }
    }

    async fn handle_command(&self, chat_id: ChatId, command: &str) -> Result<()> {
        info!(chat_id = chat_id.0, command = command, "Received command");

        // Every command, known or not, gets the usage hint
        self.api.send_message(chat_id, START_TEXT).await?;
        Ok(())
    }

    async fn handle_text(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        text: &str,
        entities: &[MessageEntity],
    ) -> Result<()> {
        let url = match extract_url(text, entities) {
            Some(url) => url,
            None => {
                self.api.send_message(chat_id, START_TEXT).await?;
                return Ok(());
            }
        };

        info!(chat_id = chat_id.0, user_id = user_id.0, url = %url, "Received link");
        let _ = self.api.send_chat_action(chat_id, ChatAction::Typing).await;

        let info = match self.extractor.fetch_info(&url).await {
            Ok(info) => info,
            Err(e) => {
                error!(url = %url, error = %e, "Metadata lookup failed");
                self.api.send_message(chat_id, METADATA_FAILED_TEXT).await?;
                return Ok(());
            }
        };

        let caption = video_caption(&info.title, info.platform());
        let keyboard = download_keyboard();

        let (sent, prompt) = match info.thumbnail.as_deref() {
            Some(thumbnail) => {
                let sent = self
                    .api
                    .send_photo(chat_id, thumbnail, &caption, Some(ParseMode::MarkdownV2), Some(&keyboard))
                    .await;
                match sent {
                    Ok(sent) => (sent, PromptKind::Photo),
                    Err(e) => {
                        // Telegram could not fetch the thumbnail; fall back to text
                        warn!(url = %url, error = %e, "Failed to send thumbnail");
                        let sent = self
                            .api
                            .send_rich_message(chat_id, &caption, Some(ParseMode::MarkdownV2), Some(&keyboard))
                            .await?;
                        (sent, PromptKind::Text)
                    }
                }
            }
            None => {
                let sent = self
                    .api
                    .send_rich_message(chat_id, &caption, Some(ParseMode::MarkdownV2), Some(&keyboard))
                    .await?;
                (sent, PromptKind::Text)
            }
        };

        self.sessions
            .remember(
                user_id,
                PendingLink::new(url, info.title, prompt).with_message_id(sent),
            )
            .await;

        Ok(())
    }

    async fn handle_callback(
        &self,
        query_id: &str,
        chat_id: Option<ChatId>,
        message_id: Option<MessageId>,
        user_id: UserId,
        data: &str,
    ) -> Result<()> {
        if let Err(e) = self.api.answer_callback_query(query_id, None).await {
            // The spinner on the button times out by itself
            warn!(query_id = query_id, error = %e, "Failed to answer callback query");
        }

        if data != DOWNLOAD_CALLBACK {
            return Ok(());
        }
        let chat_id = match chat_id {
            Some(id) => id,
            None => return Ok(()),
        };

        let link = match self.sessions.take_for_message(user_id, message_id).await {
            Some(link) => link,
            None => {
                self.api.send_message(chat_id, LINK_EXPIRED_TEXT).await?;
                return Ok(());
            }
        };

        let job_id = Uuid::new_v4();
        info!(
            job_id = %job_id,
            chat_id = chat_id.0,
            user_id = user_id.0,
            url = %link.url,
            "Download requested"
        );

        match self.download_and_send(job_id, chat_id, message_id, &link).await {
            Ok(()) => {
                info!(job_id = %job_id, "Video delivered");
                Ok(())
            }
            Err(VidgrabError::FileTooLarge { size, limit }) => {
                warn!(job_id = %job_id, size = size, limit = limit, "Video exceeds upload limit");
                self.api.send_message(chat_id, &too_large_text(limit)).await?;
                Ok(())
            }
            Err(e) => {
                error!(job_id = %job_id, url = %link.url, error = %e, "Download failed");
                self.api.send_message(chat_id, DOWNLOAD_FAILED_TEXT).await?;
                Ok(())
            }
        }
    }

    async fn download_and_send(
        &self,
        job_id: Uuid,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        link: &PendingLink,
    ) -> Result<()> {
        let permit = match self.download_permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                info!(job_id = %job_id, "All download slots busy, queueing");
                self.set_status(chat_id, message_id, link.prompt, QUEUED_TEXT).await;
                self.download_permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| VidgrabError::Download("download queue closed".to_string()))?
            }
        };
        self.set_status(chat_id, message_id, link.prompt, DOWNLOADING_TEXT).await;

        tokio::fs::create_dir_all(&self.settings.download_dir).await?;
        let job_dir = tempfile::Builder::new()
            .prefix(&format!("vidgrab-{}-", job_id))
            .tempdir_in(&self.settings.download_dir)?;

        let path = self.extractor.download(&link.url, job_dir.path()).await?;
        // Slot is only needed while yt-dlp runs
        drop(permit);

        let size_bytes = tokio::fs::metadata(&path).await?.len();
        if size_bytes > self.settings.max_upload_bytes {
            return Err(VidgrabError::FileTooLarge {
                size: size_bytes,
                limit: self.settings.max_upload_bytes,
            });
        }

        let probe = match probe_video(&self.settings.ffprobe_path, &path).await {
            Ok(probe) => probe,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "ffprobe failed, uploading without dimensions");
                VideoProbe::default()
            }
        };

        let video = DownloadedVideo {
            path,
            size_bytes,
            title: link.title.clone(),
            duration_secs: probe.duration_secs,
            width: probe.width,
            height: probe.height,
        };

        let _ = self.api.send_chat_action(chat_id, ChatAction::UploadVideo).await;
        self.api.send_video(chat_id, &video).await?;

        if let Err(e) = job_dir.close() {
            warn!(job_id = %job_id, error = %e, "Failed to remove job directory");
        }
        Ok(())
    }

    /// Best-effort update of the prompt message
    async fn set_status(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        prompt: PromptKind,
        text: &str,
    ) {
        let message_id = match message_id {
            Some(id) => id,
            None => return,
        };

        let result = match prompt {
            PromptKind::Photo => self.api.edit_message_caption(chat_id, message_id, text).await,
            PromptKind::Text => self.api.edit_message_text(chat_id, message_id, text).await,
        };
        if let Err(e) = result {
            warn!(chat_id = chat_id.0, message_id = message_id.0, error = %e, "Failed to update status");
        }
    }
}

#[async_trait]
impl UpdateHandler for BotHandler {
    async fn handle_update(&self, update: Update) -> Result<()> {
        BotHandler::handle_update(self, update).await
    }
}
