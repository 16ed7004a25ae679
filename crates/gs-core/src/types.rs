use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Identifier of one chat session. Key into the credential store and value
/// stored behind every correlation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(i64);

impl ConversationId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

impl From<i64> for ConversationId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Bytes per category for a single repository.
pub type CategoryCount = HashMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub name: String,
    /// Percentage with one decimal place, stored in tenths (`1005` is `100.5`).
    pub tenths: u32,
}

impl RankedEntry {
    pub fn percent(&self) -> f64 {
        f64::from(self.tenths) / 10.0
    }
}

impl fmt::Display for RankedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "*{}* {}.{}%",
            escape_markdown(&self.name),
            self.tenths / 10,
            self.tenths % 10
        )
    }
}

/// Escapes the characters that open an entity in Telegram's legacy Markdown.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '_' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Start,
    Authorize,
    Report,
    Cancel,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Start, Lane::Authorize, Lane::Report, Lane::Cancel];

    /// Keywords are matched case-sensitively; anything else, or no keyword at
    /// all, falls back to `Start`.
    pub fn classify(command: Option<&str>) -> Self {
        match command {
            Some("authorize") => Lane::Authorize,
            Some("report") => Lane::Report,
            Some("cancel") => Lane::Cancel,
            _ => Lane::Start,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Start => "start",
            Lane::Authorize => "authorize",
            Lane::Report => "report",
            Lane::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One update received from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub conversation: ConversationId,
    pub command: Option<String>,
}

impl InboundEvent {
    pub fn new(conversation: ConversationId, command: Option<String>) -> Self {
        Self {
            conversation,
            command,
        }
    }

    /// Extracts the command keyword from a slash-prefixed message such as
    /// `/report` or `/report@SomeBot extra words`.
    pub fn from_text(conversation: ConversationId, text: &str) -> Self {
        let command = text
            .trim_start()
            .strip_prefix('/')
            .and_then(|rest| rest.split_whitespace().next())
            .map(|word| word.split('@').next().unwrap_or(word))
            .filter(|word| !word.is_empty())
            .map(str::to_string);
        Self::new(conversation, command)
    }

    pub fn lane(&self) -> Lane {
        Lane::classify(self.command.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextFormat {
    Plain,
    Markdown,
}

/// A reply queued for delivery to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub conversation: ConversationId,
    pub text: String,
    pub format: TextFormat,
}

impl OutboundMessage {
    pub fn plain(conversation: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation,
            text: text.into(),
            format: TextFormat::Plain,
        }
    }

    pub fn markdown(conversation: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation,
            text: text.into(),
            format: TextFormat::Markdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_keywords() {
        assert_eq!(Lane::classify(Some("start")), Lane::Start);
        assert_eq!(Lane::classify(Some("authorize")), Lane::Authorize);
        assert_eq!(Lane::classify(Some("report")), Lane::Report);
        assert_eq!(Lane::classify(Some("cancel")), Lane::Cancel);
    }

    #[test]
    fn classify_falls_back_to_start() {
        assert_eq!(Lane::classify(None), Lane::Start);
        assert_eq!(Lane::classify(Some("Report")), Lane::Start);
        assert_eq!(Lane::classify(Some("stats")), Lane::Start);
    }

    #[test]
    fn parse_command_from_text() {
        let id = ConversationId::new(7);
        assert_eq!(
            InboundEvent::from_text(id, "/report").command.as_deref(),
            Some("report")
        );
        assert_eq!(
            InboundEvent::from_text(id, "/cancel@StatBot now").command.as_deref(),
            Some("cancel")
        );
        assert_eq!(InboundEvent::from_text(id, "hello").command, None);
        assert_eq!(InboundEvent::from_text(id, "/").command, None);
    }

    #[test]
    fn ranked_entry_renders_one_decimal() {
        let entry = RankedEntry {
            name: "Rust".to_string(),
            tenths: 1000,
        };
        assert_eq!(entry.to_string(), "*Rust* 100.0%");
        assert!((entry.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ranked_entry_escapes_markdown_in_name() {
        let entry = RankedEntry {
            name: "F*".to_string(),
            tenths: 5,
        };
        assert_eq!(entry.to_string(), "*F\\** 0.5%");
        assert_eq!(escape_markdown("a_b`c[d"), "a\\_b\\`c\\[d");
        assert_eq!(escape_markdown("C++"), "C++");
    }
}
