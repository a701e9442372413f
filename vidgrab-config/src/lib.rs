//! Configuration management for vidgrab services

use config::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Desktop browser user agent sent to video sites
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0 Safari/537.36";

/// Upload limit of the public Bot API for bots (50 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Console,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "console" | "pretty" | "text" => Ok(LogFormat::Console),
            other => Err(ConfigError::Message(format!(
                "LOG_FORMAT must be 'json' or 'console', got '{}'",
                other
            ))),
        }
    }
}

/// Telegram side of the configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_url: String,
    /// Public host name the webhook is reachable at (no scheme)
    pub public_host: Option<String>,
    pub webhook_secret: Option<String>,
    pub max_upload_bytes: u64,
}

/// yt-dlp / ffmpeg side of the configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DownloaderConfig {
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub cookies_file: PathBuf,
    pub download_dir: PathBuf,
    pub user_agent: String,
    pub retries: u32,
    pub max_concurrent_downloads: usize,
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    pub downloader: DownloaderConfig,
    pub server: ServerConfig,
    pub session_ttl_secs: u64,
    pub log_level: Option<String>,
    pub log_format: LogFormat,
}

impl BotConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("BOT_TOKEN")
            .ok_or_else(|| ConfigError::NotFound("BOT_TOKEN".to_string()))?;

        let mut config = Self::with_token(bot_token);

        if let Some(api_url) = get("TELEGRAM_API_URL") {
            config.telegram.api_url = api_url.trim_end_matches('/').to_string();
        }
        // Render injects RENDER_EXTERNAL_HOSTNAME; PUBLIC_HOST works elsewhere
        config.telegram.public_host = get("RENDER_EXTERNAL_HOSTNAME").or_else(|| get("PUBLIC_HOST"));
        config.telegram.webhook_secret = get("WEBHOOK_SECRET");
        if let Some(v) = get("MAX_UPLOAD_BYTES") {
            config.telegram.max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", &v)?;
        }

        let downloader = &mut config.downloader;
        if let Some(v) = get("YTDLP_PATH") {
            downloader.ytdlp_path = v;
        }
        if let Some(v) = get("FFMPEG_PATH") {
            downloader.ffmpeg_path = v;
        }
        if let Some(v) = get("FFPROBE_PATH") {
            downloader.ffprobe_path = v;
        }
        if let Some(v) = get("COOKIES_FILE") {
            downloader.cookies_file = PathBuf::from(v);
        }
        if let Some(v) = get("DOWNLOAD_DIR") {
            downloader.download_dir = PathBuf::from(v);
        }
        if let Some(v) = get("USER_AGENT") {
            downloader.user_agent = v;
        }
        if let Some(v) = get("DOWNLOAD_RETRIES") {
            downloader.retries = parse_var("DOWNLOAD_RETRIES", &v)?;
        }
        if let Some(v) = get("MAX_CONCURRENT_DOWNLOADS") {
            downloader.max_concurrent_downloads = parse_var("MAX_CONCURRENT_DOWNLOADS", &v)?;
            if downloader.max_concurrent_downloads == 0 {
                return Err(ConfigError::Message(
                    "MAX_CONCURRENT_DOWNLOADS must be at least 1".to_string(),
                ));
            }
        }
        if let Some(v) = get("METADATA_TIMEOUT_SECS") {
            downloader.metadata_timeout_secs = parse_var("METADATA_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("DOWNLOAD_TIMEOUT_SECS") {
            downloader.download_timeout_secs = parse_var("DOWNLOAD_TIMEOUT_SECS", &v)?;
        }

        if let Some(v) = get("BIND_ADDRESS") {
            config.server.bind_address = v;
        }
        if let Some(v) = get("PORT") {
            config.server.port = parse_var("PORT", &v)?;
        }

        if let Some(v) = get("SESSION_TTL_SECS") {
            config.session_ttl_secs = parse_var("SESSION_TTL_SECS", &v)?;
        }
        if let Some(v) = get("LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            config.log_level = Some(v);
        }
        if let Some(v) = get("LOG_FORMAT") {
            config.log_format = v.parse()?;
        }

        Ok(config)
    }

    /// Configuration with defaults for everything but the token
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: bot_token.into(),
                api_url: "https://api.telegram.org".to_string(),
                public_host: None,
                webhook_secret: None,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            downloader: DownloaderConfig {
                ytdlp_path: "yt-dlp".to_string(),
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                cookies_file: PathBuf::from("/app/cookies.txt"),
                download_dir: PathBuf::from("/tmp"),
                user_agent: DEFAULT_USER_AGENT.to_string(),
                retries: 10,
                max_concurrent_downloads: 2,
                metadata_timeout_secs: 60,
                download_timeout_secs: 600,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8000,
            },
            session_ttl_secs: 3600,
            log_level: None,
            log_format: LogFormat::Console,
        }
    }

    /// Path the webhook is served on
    pub fn webhook_path(&self) -> String {
        format!("/{}", self.telegram.bot_token)
    }

    /// Public webhook URL, if a public host is known
    pub fn webhook_url(&self) -> Option<String> {
        self.telegram
            .public_host
            .as_deref()
            .map(|host| format!("https://{}{}", host.trim_end_matches('/'), self.webhook_path()))
    }

    /// Socket address the HTTP server binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Message(format!("Invalid value for {}: '{}'", key, value)))
}
