//! Application wiring
//!
//! Startup order: cookie jar, tool probes, Bot API check, webhook
//! registration, then the dispatcher and the HTTP server.
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


use crate::cookies::{ensure_cookie_file, CookieFileState};
use crate::dispatcher::{Dispatcher, UpdateQueue};
use crate::extractor::{MediaExtractor, YtDlp};
use crate::handlers::{BotHandler, HandlerSettings};
use crate::server::{shutdown_signal, ServerState, WebhookServer};
use crate::session::SessionStore;
use crate::telegram::{BotApiClient, BotApiConfig, TelegramApi};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use vidgrab_config::BotConfig;

/// Updates accepted but not yet picked up by the dispatcher
const UPDATE_QUEUE_CAPACITY: usize = 256;

/// Time in-flight updates get to finish on shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Run the bot with the real Bot API client and yt-dlp until SIGINT/SIGTERM
pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    match ensure_cookie_file(&config.downloader.cookies_file).await {
        Ok(CookieFileState::Existing) => {
            info!(path = %config.downloader.cookies_file.display(), "Using cookie file")
        }
        Ok(CookieFileState::Created) => {}
        Err(e) => warn!(
            path = %config.downloader.cookies_file.display(),
            error = %e,
            "Could not create cookie file, continuing without cookies"
        ),
    }

    let ytdlp = YtDlp::new(config.downloader.clone());
    match ytdlp.version().await {
        Some(version) => info!(version = %version, "yt-dlp available"),
        None => error!(
            binary = %config.downloader.ytdlp_path,
            "yt-dlp not found, link lookups will fail"
        ),
    }
    if !ytdlp.ffmpeg_available().await {
        warn!(
            binary = %config.downloader.ffmpeg_path,
            "FFmpeg not found, separate video and audio streams cannot be merged"
        );
    }

    let api = BotApiClient::new(BotApiConfig::from_config(&config))
        .map_err(|e| anyhow::anyhow!("Failed to create Bot API client: {}", e))?;

    run_with(config, Arc::new(api), Arc::new(ytdlp), shutdown_signal()).await
}

/// Run the bot with the given collaborators until `shutdown` resolves
pub async fn run_with<F>(
    config: BotConfig,
    api: Arc<dyn TelegramApi>,
    extractor: Arc<dyn MediaExtractor>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    match api.get_me().await {
        Ok(me) => info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or(""),
            "Bot API reachable"
        ),
        Err(e) => return Err(anyhow::anyhow!("Bot API check failed: {}", e)),
    }

    let webhook_url = config.webhook_url();
    match webhook_url {
        Some(ref url) => {
            let secret = config.telegram.webhook_secret.as_deref();
            // The client retries transient failures itself
            api.set_webhook(url, secret)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to register webhook: {}", e))?;
            info!(
                host = config.telegram.public_host.as_deref().unwrap_or(""),
                secret = secret.is_some(),
                "Webhook registered"
            );
        }
        None => warn!(
            "No public host configured (RENDER_EXTERNAL_HOSTNAME / PUBLIC_HOST), webhook not registered"
        ),
    }

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(config.session_ttl_secs)));
    let handler = Arc::new(BotHandler::new(
        api,
        extractor,
        sessions.clone(),
        HandlerSettings::from_config(&config),
    ));

    let (queue, rx) = UpdateQueue::new(UPDATE_QUEUE_CAPACITY);
    let dispatcher_handle = tokio::spawn(Dispatcher::new(rx, handler).run(DRAIN_TIMEOUT));

    let purge_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    let state = Arc::new(ServerState {
        bot_token: config.telegram.bot_token.clone(),
        webhook_url,
        webhook_secret: config.telegram.webhook_secret.clone(),
        queue,
    });
    let server = WebhookServer::bind(&config.listen_addr(), state).await?;

    info!(address = %config.listen_addr(), "vidgrab bot running");
    // The server owns the only queue handle; once it stops the dispatcher drains
    let served = server.serve(shutdown).await;

    info!("Waiting for in-flight updates to complete...");
    if let Err(e) = dispatcher_handle.await {
        error!(error = %e, "Dispatcher task failed");
    }
    purge_handle.abort();

    info!("vidgrab bot stopped");
    served
}
