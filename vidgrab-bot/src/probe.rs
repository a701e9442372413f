//! FFprobe helpers for uploaded videos
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


use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use vidgrab_types::{Result, VidgrabError};

/// Video properties Telegram shows in the player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoProbe {
    pub duration_secs: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    // ffprobe prints numbers as strings in JSON output
    duration: Option<String>,
}

/// Extract duration and resolution using FFprobe
pub async fn probe_video(ffprobe_path: &str, input_path: &Path) -> Result<VideoProbe> {
    let output = Command::new(ffprobe_path)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(input_path)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(VidgrabError::Download(format!(
            "ffprobe failed for {}",
            input_path.display()
        )));
    }

    parse_probe_output(&output.stdout)
}

/// Parse `ffprobe -of json` output
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoProbe> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)?;

    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d.round() as u32);

    let stream = parsed.streams.into_iter().next();

    Ok(VideoProbe {
        duration_secs,
        width: stream.as_ref().and_then(|s| s.width),
        height: stream.as_ref().and_then(|s| s.height),
    })
}
