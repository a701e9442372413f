//! Update dispatcher
//!
//! The webhook acknowledges Telegram as soon as an update is queued; a
//! single dispatcher task drains the queue and runs one handler task per
//! update, so a long download never blocks other chats.
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
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::types::Update;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use vidgrab_types::Result;

/// Number of recent update ids remembered for redelivery detection
const RECENT_UPDATE_WINDOW: usize = 1024;

/// Something that reacts to one update
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle_update(&self, update: Update) -> Result<()>;
}

/// Outcome of offering an update to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Queued,
    /// Same `update_id` seen recently (Telegram redelivery)
    Duplicate,
    /// Queue is at capacity
    Full,
    /// Dispatcher has stopped
    Closed,
}

/// Bounded window of recently seen update ids
struct RecentUpdates {
    order: VecDeque<i64>,
    seen: HashSet<i64>,
    capacity: usize,
}

impl RecentUpdates {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an id, returning false if it was already present
    fn insert(&mut self, update_id: i64) -> bool {
        if !self.seen.insert(update_id) {
            return false;
        }
        self.order.push_back(update_id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    fn forget(&mut self, update_id: i64) {
        if self.seen.remove(&update_id) {
            self.order.retain(|id| *id != update_id);
        }
    }
}

/// Sending side of the update queue, shared with the HTTP server
#[derive(Clone)]
pub struct UpdateQueue {
    tx: mpsc::Sender<Update>,
    recent: Arc<Mutex<RecentUpdates>>,
}

impl UpdateQueue {
    /// Create a queue holding at most `capacity` pending updates
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Update>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            tx,
            recent: Arc::new(Mutex::new(RecentUpdates::new(RECENT_UPDATE_WINDOW))),
        };
        (queue, rx)
    }

    /// Offer an update without waiting
    pub fn enqueue(&self, update: Update) -> EnqueueResult {
        let update_id = i64::from(update.id);

        {
            let mut recent = match self.recent.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !recent.insert(update_id) {
                debug!(update_id = update_id, "Dropping redelivered update");
                return EnqueueResult::Duplicate;
            }
        }

        match self.tx.try_send(update) {
            Ok(()) => EnqueueResult::Queued,
            Err(e) => {
                // Telegram will redeliver; let that attempt through
                let mut recent = match self.recent.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                recent.forget(update_id);

                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!(update_id = update_id, "Update queue full");
                        EnqueueResult::Full
                    }
                    mpsc::error::TrySendError::Closed(_) => EnqueueResult::Closed,
                }
            }
        }
    }
}

/// Consumes queued updates and runs the handler for each
pub struct Dispatcher {
    rx: mpsc::Receiver<Update>,
    handler: Arc<dyn UpdateHandler>,
}

impl Dispatcher {
    pub fn new(rx: mpsc::Receiver<Update>, handler: Arc<dyn UpdateHandler>) -> Self {
        Self { rx, handler }
    }

    /// Run until every [`UpdateQueue`] is dropped, then wait up to
    /// `drain_timeout` for in-flight handlers.
    pub async fn run(mut self, drain_timeout: Duration) {
        info!("Dispatcher started");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                maybe_update = self.rx.recv() => {
                    let update = match maybe_update {
                        Some(update) => update,
                        None => break,
                    };
                    let handler = self.handler.clone();
                    tasks.spawn(async move {
                        let update_id = update.id;
                        if let Err(e) = handler.handle_update(update).await {
                            error!(update_id = update_id, error = %e, "Failed to handle update");
                        }
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Update handler panicked");
                    }
                }
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight updates to complete");
        }

        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Update handler panicked");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(aborted = tasks.len(), "Drain timeout reached, aborting remaining updates");
            tasks.abort_all();
        }
        info!("Dispatcher stopped");
    }
}
