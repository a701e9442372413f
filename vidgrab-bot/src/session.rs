//! Per-user pending links
//!
//! The Download button carries only a short tag, so the link it refers to
//! is kept here, keyed by the user who sent it. A newer link from the same
//! user replaces the older one.
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


use std::collections::HashMap;
use std::time::{Duration, Instant};
use teloxide::types::{MessageId, UserId};
use tokio::sync::RwLock;
use tracing::debug;

/// How the bot presented the link to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Thumbnail photo with caption
    Photo,
    /// Text message (no thumbnail available)
    Text,
}

/// A link waiting for the user to press Download
#[derive(Debug, Clone)]
pub struct PendingLink {
    pub url: String,
    pub title: String,
    pub prompt: PromptKind,
    /// Message carrying the Download button
    pub message_id: Option<MessageId>,
    created_at: Instant,
}

impl PendingLink {
    pub fn new(url: impl Into<String>, title: impl Into<String>, prompt: PromptKind) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            prompt,
            message_id: None,
            created_at: Instant::now(),
        }
    }

    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// In-memory store of pending links
pub struct SessionStore {
    ttl: Duration,
    links: RwLock<HashMap<UserId, PendingLink>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Remember the latest link of a user
    pub async fn remember(&self, user_id: UserId, link: PendingLink) {
        self.links.write().await.insert(user_id, link);
    }

    /// Pending link of a user, if still fresh
    pub async fn peek(&self, user_id: UserId) -> Option<PendingLink> {
        self.links
            .read()
            .await
            .get(&user_id)
            .filter(|link| !link.is_expired(self.ttl))
            .cloned()
    }

    /// Remove and return the pending link of a user, if still fresh
    pub async fn take(&self, user_id: UserId) -> Option<PendingLink> {
        self.links
            .write()
            .await
            .remove(&user_id)
            .filter(|link| !link.is_expired(self.ttl))
    }

    /// Take the pending link only if it belongs to the pressed button.
    ///
    /// A button under an older prompt must not download the user's newer
    /// link, so a mismatch leaves the pending link in place.
    pub async fn take_for_message(
        &self,
        user_id: UserId,
        message_id: Option<MessageId>,
    ) -> Option<PendingLink> {
        let mut links = self.links.write().await;

        let matches = match (links.get(&user_id), message_id) {
            (Some(link), Some(pressed)) => link.message_id.map_or(true, |id| id == pressed),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return None;
        }

        links
            .remove(&user_id)
            .filter(|link| !link.is_expired(self.ttl))
    }

    /// Drop expired links, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut links = self.links.write().await;
        let before = links.len();
        links.retain(|_, link| !link.is_expired(self.ttl));
        let removed = before - links.len();

        if removed > 0 {
            debug!(removed = removed, remaining = links.len(), "Purged expired sessions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.read().await.is_empty()
    }
}
