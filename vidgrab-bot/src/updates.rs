//! Classification of incoming updates
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


use teloxide::types::{ChatId, MessageEntity, MessageId, Update, UpdateKind, UserId};

/// What an update asks the bot to do
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// `/command`, with any `@bot` suffix removed and lowercased
    Command { chat_id: ChatId, command: String },
    /// Plain text message
    Text {
        chat_id: ChatId,
        user_id: UserId,
        text: String,
        entities: Vec<MessageEntity>,
    },
    /// Inline keyboard button press
    Callback {
        query_id: String,
        chat_id: Option<ChatId>,
        message_id: Option<MessageId>,
        user_id: UserId,
        data: String,
    },
    Ignored,
}

/// Classify an update
pub fn classify(update: &Update) -> Incoming {
    match &update.kind {
        UpdateKind::CallbackQuery(query) => Incoming::Callback {
            query_id: query.id.clone(),
            chat_id: query.message.as_ref().map(|m| m.chat.id),
            message_id: query.message.as_ref().map(|m| m.id),
            user_id: query.from.id,
            data: query.data.clone().unwrap_or_default(),
        },
        UpdateKind::Message(message) => {
            let text = match message.text().map(str::trim) {
                Some(t) if !t.is_empty() => t,
                _ => return Incoming::Ignored,
            };

            if let Some(rest) = text.strip_prefix('/') {
                let head = rest.split(char::is_whitespace).next().unwrap_or(rest);
                // "/start@my_bot" in group chats
                let command = head.split('@').next().unwrap_or(head).to_lowercase();
                return Incoming::Command {
                    chat_id: message.chat.id,
                    command,
                };
            }

            // Anonymous senders have nobody to keep a pending link for
            let user_id = match message.from() {
                Some(user) => user.id,
                None => return Incoming::Ignored,
            };

            // Entity offsets refer to the untrimmed text
            let raw = message.text().unwrap_or_default();
            Incoming::Text {
                chat_id: message.chat.id,
                user_id,
                text: raw.to_string(),
                entities: message.entities().map(<[_]>::to_vec).unwrap_or_default(),
            }
        }
        _ => Incoming::Ignored,
    }
}
