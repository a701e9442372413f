//! Link detection in incoming messages

use teloxide::types::{MessageEntity, MessageEntityKind};
use url::Url;

/// Find the video link a user sent.
///
/// Telegram's own `url` entities win; otherwise the whole text, then each
/// whitespace-separated token, is tried as a link.
pub fn extract_url(text: &str, entities: &[MessageEntity]) -> Option<String> {
    for entity in entities.iter().filter(|e| matches!(e.kind, MessageEntityKind::Url)) {
        if let Some(url) = entity_text(text, entity).as_deref().and_then(normalize) {
            return Some(url);
        }
    }

    normalize(text.trim()).or_else(|| text.split_whitespace().find_map(normalize))
}

/// Slice an entity out of the text. Offsets count UTF-16 code units.
fn entity_text(text: &str, entity: &MessageEntity) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = entity.offset.checked_add(entity.length)?;
    let slice = units.get(entity.offset..end)?;
    String::from_utf16(slice).ok()
}

/// Accept `http`/`https` URLs with a dotted host, adding a scheme if missing
fn normalize(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate.contains(char::is_whitespace) {
        return None;
    }

    let parsed = match Url::parse(candidate) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", candidate)).ok()?
        }
        Err(_) => return None,
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?;
    let tld = host.rsplit_once('.').map(|(_, tld)| tld)?;
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some(parsed.to_string())
}
