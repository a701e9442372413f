//! Error types for vidgrab
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


use thiserror::Error;

/// Errors that can occur in vidgrab services
#[derive(Error, Debug)]
pub enum VidgrabError {
    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Telegram unreachable: {0}")]
    Network(String),

    #[error("Rate limited by Telegram, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Metadata extraction failed: {0}")]
    Extraction(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("File is too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VidgrabError {
    /// Whether the failed operation is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            VidgrabError::RateLimited { .. } | VidgrabError::Timeout(_) | VidgrabError::Network(_) => {
                true
            }
            VidgrabError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Minimum wait requested by the server before the next attempt
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            VidgrabError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VidgrabError>;
