//! vidgrab bot library
//!
//! Telegram bot that turns video links into MP4 uploads using yt-dlp.
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


pub mod app;
pub mod cookies;
pub mod dispatcher;
pub mod extractor;
pub mod handlers;
pub mod links;
pub mod probe;
pub mod retry;
pub mod server;
pub mod session;
pub mod telegram;
pub mod updates;

pub use dispatcher::{Dispatcher, EnqueueResult, UpdateHandler, UpdateQueue};
pub use extractor::{MediaExtractor, YtDlp};
pub use handlers::{BotHandler, HandlerSettings};
pub use telegram::{BotApiClient, BotApiConfig, BotIdentity, TelegramApi};
