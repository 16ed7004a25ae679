//! Bot API payloads, limited to the fields this bot reads or writes.

use gs_core::{ConversationId, InboundEvent, OutboundMessage, TextFormat};
use serde::{Deserialize, Serialize};

pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct BotUser {
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetUpdates {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
}

impl<'a> SendMessage<'a> {
    pub fn new(message: &OutboundMessage, text: &'a str) -> Self {
        Self {
            chat_id: message.conversation.get(),
            text,
            parse_mode: match message.format {
                TextFormat::Markdown => Some("Markdown"),
                TextFormat::Plain => None,
            },
        }
    }
}

/// Converts a batch of updates into inbound events and returns the offset
/// that acknowledges them.
pub fn events_from_updates(updates: Vec<Update>) -> (Vec<InboundEvent>, Option<i64>) {
    let next_offset = updates.iter().map(|update| update.update_id + 1).max();
    let events = updates
        .into_iter()
        .filter_map(|update| update.message)
        .map(|message| {
            let conversation = ConversationId::new(message.chat.id);
            InboundEvent::from_text(conversation, message.text.as_deref().unwrap_or_default())
        })
        .collect();
    (events, next_offset)
}

/// Splits `text` at line boundaries so every chunk fits the API limit.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if !current.is_empty() && current.len() + line.len() + 1 > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        if line.len() > max_len {
            let mut rest = line;
            while !rest.is_empty() {
                let mut end = rest.len().min(max_len);
                while !rest.is_char_boundary(end) {
                    end -= 1;
                }
                chunks.push(rest[..end].to_string());
                rest = &rest[end..];
            }
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_become_events() {
        let body = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"message_id":1,"chat":{"id":-55,"type":"group"},"text":"/report@StatBot"}},
            {"update_id":11,"edited_message":{"message_id":1,"chat":{"id":-55}}},
            {"update_id":12,"message":{"message_id":2,"chat":{"id":9,"type":"private"}}}
        ]}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        assert!(response.ok);
        let (events, offset) = events_from_updates(response.result.unwrap());

        assert_eq!(offset, Some(13));
        assert_eq!(
            events,
            [
                InboundEvent::new(ConversationId::new(-55), Some("report".to_string())),
                InboundEvent::new(ConversationId::new(9), None),
            ]
        );
    }

    #[test]
    fn empty_batch_keeps_offset() {
        assert_eq!(events_from_updates(Vec::new()), (Vec::new(), None));
    }

    #[test]
    fn send_message_sets_parse_mode_for_markdown() {
        let message = OutboundMessage::markdown(ConversationId::new(1), "*Rust* 100.0%");
        let json = serde_json::to_value(SendMessage::new(&message, &message.text)).unwrap();
        assert_eq!(json["parse_mode"], "Markdown");
        let plain = OutboundMessage::plain(ConversationId::new(1), "hi");
        let json = serde_json::to_value(SendMessage::new(&plain, &plain.text)).unwrap();
        assert!(json.get("parse_mode").is_none());
    }

    #[test]
    fn split_keeps_short_text_whole() {
        assert_eq!(split_message("a\nb", 10), ["a\nb"]);
    }

    #[test]
    fn split_breaks_on_lines_and_long_lines() {
        let text = "aaaa\nbbbb\ncccccccccc";
        let chunks = split_message(text, 9);
        assert_eq!(chunks, ["aaaa\nbbbb", "ccccccccc", "c"]);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 9));
    }
}
