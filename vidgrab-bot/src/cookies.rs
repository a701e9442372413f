//! Cookie jar bootstrap
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


use std::path::Path;
use tracing::info;
use vidgrab_types::Result;

/// First line yt-dlp expects in a cookie file
pub const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// What [`ensure_cookie_file`] found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieFileState {
    /// A file was already there and was left untouched
    Existing,
    /// A placeholder was written
    Created,
}

/// Make sure a cookie file exists at `path`.
///
/// Real cookies exported from a browser are never overwritten; when
/// nothing is there an empty Netscape jar is written so yt-dlp can load it.
pub async fn ensure_cookie_file(path: &Path) -> Result<CookieFileState> {
    if tokio::fs::try_exists(path).await? {
        return Ok(CookieFileState::Existing);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, format!("{}\n", NETSCAPE_HEADER)).await?;

    info!(path = %path.display(), "Created placeholder cookie file");
    Ok(CookieFileState::Created)
}
