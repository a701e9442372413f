//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::types::{ChatAction, ChatId, InlineKeyboardMarkup, MessageId, ParseMode, Update};
use vidgrab_bot::extractor::MediaExtractor;
use vidgrab_bot::handlers::{BotHandler, HandlerSettings};
use vidgrab_bot::session::SessionStore;
use vidgrab_bot::telegram::{BotIdentity, TelegramApi};
use vidgrab_types::{DownloadedVideo, Result, VideoInfo, VidgrabError};

/// A call made against the mock Bot API
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    SetWebhook { url: String, secret: Option<String> },
    Message { chat_id: i64, text: String },
    RichMessage { chat_id: i64, text: String, keyboard: bool },
    Photo { chat_id: i64, photo: String, caption: String },
    AnswerCallback { query_id: String },
    EditCaption { chat_id: i64, message_id: i32, text: String },
    EditText { chat_id: i64, message_id: i32, text: String },
    ChatAction { chat_id: i64, action: ChatAction },
    Video { chat_id: i64, file_name: String, size_bytes: u64, title: String },
}

/// Records every call; optionally rejects photos or the webhook
pub struct MockTelegramApi {
    calls: Mutex<Vec<ApiCall>>,
    next_message_id: AtomicI32,
    pub fail_photos: bool,
    pub fail_webhook: bool,
}

impl MockTelegramApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI32::new(100),
            fail_photos: false,
            fail_webhook: false,
        }
    }

    pub fn failing_photos() -> Self {
        Self {
            fail_photos: true,
            ..Self::new()
        }
    }

    /// setWebhook always fails with a transient error
    pub fn failing_webhook() -> Self {
        Self {
            fail_webhook: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts of plain messages sent to users
    pub fn messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn videos(&self) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ApiCall::Video { .. }))
            .collect()
    }

    /// Status texts written into prompt messages, in order
    pub fn status_edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::EditCaption { text, .. } | ApiCall::EditText { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Message id handed out by the most recent send
    pub fn last_message_id(&self) -> i32 {
        self.next_message_id.load(Ordering::SeqCst) - 1
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn sent(&self) -> MessageId {
        MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl TelegramApi for MockTelegramApi {
    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        self.record(ApiCall::SetWebhook {
            url: url.to_string(),
            secret: secret_token.map(str::to_string),
        });
        if self.fail_webhook {
            return Err(VidgrabError::Network("setWebhook: connection reset".to_string()));
        }
        Ok(())
    }

    async fn get_me(&self) -> Result<BotIdentity> {
        Ok(BotIdentity {
            id: 1,
            username: Some("vidgrab_bot".to_string()),
        })
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        self.record(ApiCall::Message {
            chat_id: chat_id.0,
            text: text.to_string(),
        });
        Ok(self.sent())
    }

    async fn send_rich_message(
        &self,
        chat_id: ChatId,
        text: &str,
        _parse_mode: Option<ParseMode>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        self.record(ApiCall::RichMessage {
            chat_id: chat_id.0,
            text: text.to_string(),
            keyboard: reply_markup.is_some(),
        });
        Ok(self.sent())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        caption: &str,
        _parse_mode: Option<ParseMode>,
        _reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        if self.fail_photos {
            return Err(VidgrabError::Telegram(
                "sendPhoto: Bad Request: wrong file identifier/HTTP URL specified".to_string(),
            ));
        }
        self.record(ApiCall::Photo {
            chat_id: chat_id.0,
            photo: photo_url.to_string(),
            caption: caption.to_string(),
        });
        Ok(self.sent())
    }

    async fn answer_callback_query(&self, query_id: &str, _text: Option<&str>) -> Result<()> {
        self.record(ApiCall::AnswerCallback {
            query_id: query_id.to_string(),
        });
        Ok(())
    }

    async fn edit_message_caption(&self, chat_id: ChatId, message_id: MessageId, caption: &str) -> Result<()> {
        self.record(ApiCall::EditCaption {
            chat_id: chat_id.0,
            message_id: message_id.0,
            text: caption.to_string(),
        });
        Ok(())
    }

    async fn edit_message_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        self.record(ApiCall::EditText {
            chat_id: chat_id.0,
            message_id: message_id.0,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.record(ApiCall::ChatAction {
            chat_id: chat_id.0,
            action,
        });
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, video: &DownloadedVideo) -> Result<MessageId> {
        // The file must still be on disk while uploading
        assert!(video.path.is_file(), "video file missing during upload");
        self.record(ApiCall::Video {
            chat_id: chat_id.0,
            file_name: video.file_name(),
            size_bytes: video.size_bytes,
            title: video.title.clone(),
        });
        Ok(self.sent())
    }
}

/// Extractor that never touches the network
pub struct FakeExtractor {
    pub info: Option<VideoInfo>,
    /// Size of the file "downloaded"; `None` makes downloads fail
    pub file_size: Option<usize>,
    /// Time each download takes
    pub delay: Duration,
    pub downloads: AtomicUsize,
    in_flight: AtomicUsize,
    /// Most downloads ever running at once
    pub peak_in_flight: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(info: VideoInfo, file_size: usize) -> Self {
        Self {
            info: Some(info),
            file_size: Some(file_size),
            delay: Duration::ZERO,
            downloads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            info: None,
            file_size: None,
            ..Self::new(video_info("unused", None), 0)
        }
    }

    pub fn broken_download(info: VideoInfo) -> Self {
        Self {
            file_size: None,
            ..Self::new(info, 0)
        }
    }

    pub fn slow(info: VideoInfo, file_size: usize, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(info, file_size)
        }
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn fetch_info(&self, _url: &str) -> Result<VideoInfo> {
        self.info
            .clone()
            .ok_or_else(|| VidgrabError::Extraction("ERROR: Unsupported URL".to_string()))
    }

    async fn download(&self, _url: &str, dest_dir: &Path) -> Result<PathBuf> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let size = self
            .file_size
            .ok_or_else(|| VidgrabError::Download("ERROR: Requested format is not available".to_string()))?;

        let path = dest_dir.join("Test_Video [abc123].mp4");
        tokio::fs::write(&path, vec![0u8; size]).await?;
        Ok(path)
    }
}

pub fn video_info(title: &str, thumbnail: Option<&str>) -> VideoInfo {
    let mut value = json!({
        "id": "abc123",
        "title": title,
        "extractor_key": "Youtube",
        "duration": 212.0,
    });
    if let Some(thumbnail) = thumbnail {
        value["thumbnail"] = json!(thumbnail);
    }
    serde_json::from_value(value).unwrap()
}

pub fn settings(download_dir: &Path, max_upload_bytes: u64) -> HandlerSettings {
    HandlerSettings {
        max_upload_bytes,
        download_dir: download_dir.to_path_buf(),
        // Probing is best effort; a missing binary must not break delivery
        ffprobe_path: "/nonexistent/ffprobe".to_string(),
        max_concurrent_downloads: 2,
    }
}

pub fn handler(
    api: Arc<MockTelegramApi>,
    extractor: Arc<FakeExtractor>,
    settings: HandlerSettings,
) -> BotHandler {
    vidgrab_logging::init_test_logging();
    BotHandler::new(
        api,
        extractor,
        Arc::new(SessionStore::new(std::time::Duration::from_secs(60))),
        settings,
    )
}

pub fn text_update_json(update_id: i32, chat_id: i64, user_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1700000000,
            "chat": { "id": chat_id, "type": "private", "first_name": "Ana" },
            "from": { "id": user_id, "is_bot": false, "first_name": "Ana" },
            "text": text,
        }
    })
}

pub fn text_update(update_id: i32, chat_id: i64, user_id: i64, text: &str) -> Update {
    serde_json::from_value(text_update_json(update_id, chat_id, user_id, text)).unwrap()
}

pub fn callback_update(update_id: i32, chat_id: i64, user_id: i64, message_id: i32, data: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb-{}", update_id),
            "from": { "id": user_id, "is_bot": false, "first_name": "Ana" },
            "message": {
                "message_id": message_id,
                "date": 1700000000,
                "chat": { "id": chat_id, "type": "private", "first_name": "Ana" },
                "text": "prompt",
            },
            "chat_instance": "42",
            "data": data,
        }
    }))
    .unwrap()
}
