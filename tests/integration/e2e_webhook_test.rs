//! End-to-End Integration Test: Webhook → Dispatcher → Handler → Bot API
//!
//! This test runs the whole bot the way `main` does, with two stand-ins:
//! 1. a recording Bot API instead of api.telegram.org
//! 2. an extractor that writes a small file instead of calling yt-dlp
//!
//! Telegram's side is played by plain HTTP posts to the webhook.

use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::types::{
    ChatAction, ChatId, InlineKeyboardButtonKind, InlineKeyboardMarkup, MessageId, ParseMode,
};
use tempfile::TempDir;
use tokio::sync::oneshot;
use vidgrab_bot::app::run_with;
use vidgrab_bot::extractor::MediaExtractor;
use vidgrab_bot::handlers::{DOWNLOADING_TEXT, START_TEXT};
use vidgrab_bot::server::SECRET_TOKEN_HEADER;
use vidgrab_bot::telegram::{BotIdentity, TelegramApi};
use vidgrab_config::BotConfig;
use vidgrab_types::{DownloadedVideo, Result, VideoInfo};

const TOKEN: &str = "424242:e2e-token";
const SECRET: &str = "e2e-secret";

/// Bot API stand-in that logs each call as a short line
struct RecordingApi {
    log: Mutex<Vec<String>>,
    next_id: AtomicI32,
}

impl RecordingApi {
    fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(500),
        }
    }

    fn push(&self, line: String) -> MessageId {
        self.log.lock().unwrap().push(line);
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn find(&self, prefix: &str) -> Option<String> {
        self.log().into_iter().find(|line| line.starts_with(prefix))
    }
}

#[async_trait]
impl TelegramApi for RecordingApi {
    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        self.push(format!("setWebhook {} {}", url, secret_token.unwrap_or("-")));
        Ok(())
    }

    async fn get_me(&self) -> Result<BotIdentity> {
        Ok(BotIdentity {
            id: 424242,
            username: Some("vidgrab_e2e_bot".to_string()),
        })
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        Ok(self.push(format!("sendMessage {} {}", chat_id.0, text)))
    }

    async fn send_rich_message(
        &self,
        chat_id: ChatId,
        text: &str,
        _parse_mode: Option<ParseMode>,
        _reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        Ok(self.push(format!("sendRichMessage {} {}", chat_id.0, text)))
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        _caption: &str,
        _parse_mode: Option<ParseMode>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        let button = reply_markup
            .and_then(|m| m.inline_keyboard.first())
            .and_then(|row| row.first())
            .and_then(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(self.push(format!("sendPhoto {} {} {}", chat_id.0, photo_url, button)))
    }

    async fn answer_callback_query(&self, query_id: &str, _text: Option<&str>) -> Result<()> {
        self.push(format!("answerCallbackQuery {}", query_id));
        Ok(())
    }

    async fn edit_message_caption(&self, chat_id: ChatId, message_id: MessageId, caption: &str) -> Result<()> {
        self.push(format!("editMessageCaption {} {} {}", chat_id.0, message_id.0, caption));
        Ok(())
    }

    async fn edit_message_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        self.push(format!("editMessageText {} {} {}", chat_id.0, message_id.0, text));
        Ok(())
    }

    async fn send_chat_action(&self, _chat_id: ChatId, _action: ChatAction) -> Result<()> {
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, video: &DownloadedVideo) -> Result<MessageId> {
        Ok(self.push(format!(
            "sendVideo {} {} {}",
            chat_id.0,
            video.file_name(),
            video.size_bytes
        )))
    }
}

struct StubExtractor;

#[async_trait]
impl MediaExtractor for StubExtractor {
    async fn fetch_info(&self, _url: &str) -> Result<VideoInfo> {
        Ok(serde_json::from_value(json!({
            "id": "e2e",
            "title": "E2E clip",
            "thumbnail": "https://img.example.com/e2e.jpg",
            "extractor_key": "TikTok",
        }))
        .unwrap())
    }

    async fn download(&self, _url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let path = dest_dir.join("E2E_clip [e2e].mp4");
        tokio::fs::write(&path, vec![1u8; 4096]).await?;
        Ok(path)
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Poll `check` until it holds or five seconds pass
async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

async fn post(client: &reqwest::Client, base: &str, body: serde_json::Value) -> u16 {
    client
        .post(format!("{}/{}", base, TOKEN))
        .header(SECRET_TOKEN_HEADER, SECRET)
        .json(&body)
        .send()
        .await
        .unwrap()
        .status()
        .as_u16()
}

#[tokio::test]
async fn test_link_to_video_over_webhook() {
    let download_dir = TempDir::new().unwrap();
    let port = free_port();

    let mut config = BotConfig::with_token(TOKEN);
    config.telegram.public_host = Some("bot.example.com".to_string());
    config.telegram.webhook_secret = Some(SECRET.to_string());
    config.server.bind_address = "127.0.0.1".to_string();
    config.server.port = port;
    config.downloader.download_dir = download_dir.path().to_path_buf();
    config.downloader.ffprobe_path = "/nonexistent/ffprobe".to_string();

    let api = Arc::new(RecordingApi::new());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let bot = tokio::spawn(run_with(config, api.clone(), Arc::new(StubExtractor), async move {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    // Wait for the server to come up
    let mut up = false;
    for _ in 0..100 {
        if let Ok(response) = client.get(format!("{}/health", base)).send().await {
            up = response.status().is_success();
            if up {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(up, "server did not start");

    assert_eq!(
        api.find("setWebhook").as_deref(),
        Some(format!("setWebhook https://bot.example.com/{} {}", TOKEN, SECRET).as_str())
    );

    let status: serde_json::Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert_eq!(status["status"], "Bot running");

    // /start
    let start = json!({
        "update_id": 1,
        "message": {
            "message_id": 1,
            "date": 1700000000,
            "chat": { "id": 99, "type": "private", "first_name": "Ana" },
            "from": { "id": 5, "is_bot": false, "first_name": "Ana" },
            "text": "/start"
        }
    });
    assert_eq!(post(&client, &base, start).await, 200);
    let expected_start = format!("sendMessage 99 {}", START_TEXT);
    assert!(eventually(|| api.log().contains(&expected_start)).await);

    // A link
    let link = json!({
        "update_id": 2,
        "message": {
            "message_id": 2,
            "date": 1700000001,
            "chat": { "id": 99, "type": "private", "first_name": "Ana" },
            "from": { "id": 5, "is_bot": false, "first_name": "Ana" },
            "text": "https://www.tiktok.com/@someone/video/123",
            "entities": [{ "type": "url", "offset": 0, "length": 41 }]
        }
    });
    assert_eq!(post(&client, &base, link).await, 200);
    assert!(eventually(|| api.find("sendPhoto").is_some()).await);
    assert_eq!(
        api.find("sendPhoto").unwrap(),
        "sendPhoto 99 https://img.example.com/e2e.jpg dl"
    );

    // The Download button under the thumbnail (second message sent, id 502)
    let press = json!({
        "update_id": 3,
        "callback_query": {
            "id": "q-1",
            "from": { "id": 5, "is_bot": false, "first_name": "Ana" },
            "message": {
                "message_id": 502,
                "date": 1700000002,
                "chat": { "id": 99, "type": "private", "first_name": "Ana" },
                "text": "E2E clip"
            },
            "chat_instance": "99",
            "data": "dl"
        }
    });
    assert_eq!(post(&client, &base, press).await, 200);
    assert!(eventually(|| api.find("sendVideo").is_some()).await);

    assert_eq!(api.find("sendVideo").unwrap(), "sendVideo 99 E2E_clip [e2e].mp4 4096");
    assert!(api.log().contains(&"answerCallbackQuery q-1".to_string()));
    assert!(api
        .log()
        .contains(&format!("editMessageCaption 99 502 {}", DOWNLOADING_TEXT)));

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), bot)
        .await
        .expect("bot did not shut down")
        .unwrap()
        .unwrap();

    // Nothing left behind in the download directory
    assert!(std::fs::read_dir(download_dir.path()).unwrap().next().is_none());
}
