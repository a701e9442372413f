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

// Simple script to post a fake Telegram update to a locally running bot
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bot_token = std::env::var("BOT_TOKEN")?;
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let base_url = std::env::var("BOT_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));

    let chat_id: i64 = std::env::var("TEST_CHAT_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string());

    // Update ids only need to be unique per bot
    let update_id = (uuid::Uuid::new_v4().as_u128() & 0x7fff_ffff) as i64;
    let update = json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 0,
            "chat": { "id": chat_id, "type": "private" },
            "from": { "id": chat_id, "is_bot": false, "first_name": "Tester" },
            "text": text
        }
    });

    println!("📤 Posting test update to {}", base_url);
    println!("   Update ID: {}", update_id);
    println!("   Chat ID: {}", chat_id);
    println!("   Text: {}", text);

    let mut request = reqwest::Client::new()
        .post(format!("{}/{}", base_url.trim_end_matches('/'), bot_token))
        .json(&update);
    if let Ok(secret) = std::env::var("WEBHOOK_SECRET") {
        request = request.header("X-Telegram-Bot-Api-Secret-Token", secret);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        println!("❌ Webhook answered {}", status);
        return Err(format!("webhook returned {}", status).into());
    }

    println!("✅ Update accepted ({})", status);
    println!("");
    println!("📝 Next steps:");
    println!("   1. Check bot logs for \"Received link\"");
    println!("   2. Replies go to chat {} through the real Bot API", chat_id);
    println!("      (set TEST_CHAT_ID to your own chat to see them)");

    Ok(())
}
