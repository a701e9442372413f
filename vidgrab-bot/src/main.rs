//! vidgrab bot
//!
//! Receives Telegram updates on a webhook and answers video links with
//! a thumbnail, a Download button and finally the MP4 itself.
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


use anyhow::Result;
use tracing::info;
use vidgrab_config::BotConfig;
use vidgrab_logging::init_from_format;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = BotConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_from_format("vidgrab-bot", config.log_level(), config.log_format);

    info!(
        port = config.server.port,
        max_concurrent_downloads = config.downloader.max_concurrent_downloads,
        "Starting vidgrab bot"
    );

    vidgrab_bot::app::run(config).await
}
