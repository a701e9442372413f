//! Media extraction - yt-dlp operations
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


use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use vidgrab_config::DownloaderConfig;
use vidgrab_types::{Result, VideoInfo, VidgrabError};

/// Source of video metadata and files
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetch metadata without downloading
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo>;

    /// Download the best MP4 rendition into `dest_dir`, returning the file path
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// yt-dlp command line wrapper
pub struct YtDlp {
    config: DownloaderConfig,
}

impl YtDlp {
    pub fn new(config: DownloaderConfig) -> Self {
        Self { config }
    }

    /// Arguments shared by metadata and download invocations
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
            "--add-header".to_string(),
            "Accept-Language:en-US,en;q=0.9".to_string(),
            // YouTube needs the web + android player clients to expose formats
            "--extractor-args".to_string(),
            "youtube:player_client=web,android".to_string(),
        ];

        if self.config.cookies_file.is_file() {
            args.push("--cookies".to_string());
            args.push(self.config.cookies_file.to_string_lossy().into_owned());
        }

        args
    }

    pub(crate) fn metadata_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
        ];
        args.extend(self.common_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    pub(crate) fn download_args(&self, url: &str, dest_dir: &Path) -> Vec<String> {
        let template = dest_dir.join("%(title).80B [%(id)s].%(ext)s");

        let mut args = vec![
            "-f".to_string(),
            "bestvideo+bestaudio/best".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--retries".to_string(),
            self.config.retries.to_string(),
            "--no-part".to_string(),
            "--restrict-filenames".to_string(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            // --print alone implies --simulate
            "--no-simulate".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ];
        args.extend(self.common_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Run yt-dlp with a deadline. The child is killed if the deadline passes.
    async fn run(&self, args: &[String], timeout: Duration) -> Result<Output> {
        debug!(binary = %self.config.ytdlp_path, args = ?args, "Running yt-dlp");

        let child = Command::new(&self.config.ytdlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VidgrabError::Extraction(format!(
                    "Failed to start {}: {}",
                    self.config.ytdlp_path, e
                ))
            })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(VidgrabError::Timeout(format!(
                "yt-dlp did not finish within {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Probe the yt-dlp binary, returning its version
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.config.ytdlp_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Check if FFmpeg is available (yt-dlp needs it to merge streams)
    pub async fn ffmpeg_available(&self) -> bool {
        match Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo> {
        info!(url = url, "Fetching video metadata");

        let args = self.metadata_args(url);
        let output = self
            .run(&args, Duration::from_secs(self.config.metadata_timeout_secs))
            .await?;

        if !output.status.success() {
            return Err(VidgrabError::Extraction(failure_reason(&output)));
        }

        let info: VideoInfo = serde_json::from_slice(&output.stdout).map_err(|e| {
            VidgrabError::Extraction(format!("Unparseable yt-dlp metadata: {}", e))
        })?;

        info!(
            url = url,
            title = %info.title,
            platform = info.platform(),
            "Video metadata fetched"
        );
        Ok(info)
    }

    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        info!(
            url = url,
            destination = %dest_dir.display(),
            "Downloading video"
        );

        let args = self.download_args(url, dest_dir);
        let output = self
            .run(&args, Duration::from_secs(self.config.download_timeout_secs))
            .await?;

        if !output.status.success() {
            return Err(VidgrabError::Download(failure_reason(&output)));
        }

        let printed = String::from_utf8_lossy(&output.stdout);
        let path = match last_line(&printed).map(PathBuf::from) {
            Some(path) if path.is_file() => path,
            other => {
                if let Some(path) = other {
                    warn!(
                        printed = %path.display(),
                        "yt-dlp reported a path that does not exist, scanning download directory"
                    );
                }
                find_downloaded_file(dest_dir).await?
            }
        };

        info!(
            url = url,
            file = %path.display(),
            "Video downloaded"
        );
        Ok(path)
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// Most useful line of a failed yt-dlp run
fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR"))
        .last()
        .or_else(|| last_line(&stderr));

    match line {
        Some(line) => line.to_string(),
        None => format!("yt-dlp exited with {}", output.status),
    }
}

/// Largest regular file in `dir`, skipping partial downloads
async fn find_downloaded_file(dir: &Path) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut best: Option<(u64, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let is_partial = path
            .extension()
            .map(|ext| ext == "part" || ext == "ytdl")
            .unwrap_or(false);
        if is_partial {
            continue;
        }
        if best.as_ref().map(|(size, _)| metadata.len() > *size).unwrap_or(true) {
            best = Some((metadata.len(), path));
        }
    }

    best.map(|(_, path)| path)
        .ok_or_else(|| VidgrabError::Download("yt-dlp produced no output file".to_string()))
}
