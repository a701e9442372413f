//! Media metadata types
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


use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_title() -> String {
    "Untitled".to_string()
}

/// Video metadata as reported by `yt-dlp --dump-single-json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub extractor_key: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>, // Duration in seconds
}

impl VideoInfo {
    /// Name of the site the video comes from
    pub fn platform(&self) -> &str {
        self.extractor_key.as_deref().unwrap_or("Unknown")
    }
}

/// A video file on local disk, ready to be uploaded
#[derive(Debug, Clone)]
pub struct DownloadedVideo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub title: String,
    pub duration_secs: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl DownloadedVideo {
    /// File name used for the upload
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string())
    }
}
