//! HTTP server: Telegram webhook, status page and health checks
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


use crate::dispatcher::{EnqueueResult, UpdateQueue};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use teloxide::types::Update;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Header Telegram sends when the webhook was registered with a secret
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared server state
pub struct ServerState {
    pub bot_token: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub queue: UpdateQueue,
}

/// Build the router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        // The token itself is the webhook path
        .route("/:token", post(webhook))
        .with_state(state)
}

/// HTTP server
pub struct WebhookServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl WebhookServer {
    /// Bind the listening socket
    pub async fn bind(addr: &str, state: Arc<ServerState>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind server to {}: {}", addr, e))?;

        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.listener.local_addr()?;
        info!(address = %addr, "HTTP server started");

        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Status page handler
async fn status(State(state): State<Arc<ServerState>>) -> Json<Value> {
    Json(json!({
        "status": "Bot running",
        "webhook": state.webhook_url,
    }))
}

/// Health check handler
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "vidgrab-bot",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Webhook handler
async fn webhook(
    State(state): State<Arc<ServerState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if token != state.bot_token {
        return StatusCode::NOT_FOUND;
    }

    if let Some(ref secret) = state.webhook_secret {
        let presented = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("Webhook call with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Malformed webhook payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    let update_id = update.id;
    match state.queue.enqueue(update) {
        EnqueueResult::Queued => {
            debug!(update_id = update_id, "Update queued");
            StatusCode::OK
        }
        // Already being handled; acknowledge so Telegram stops resending
        EnqueueResult::Duplicate => StatusCode::OK,
        EnqueueResult::Full | EnqueueResult::Closed => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal (Ctrl+C) received");
        },
        _ = terminate => {
            info!("Shutdown signal (SIGTERM) received");
        },
    }
}
