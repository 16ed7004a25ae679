//! Single-use tokens tying an OAuth callback back to the conversation that
//! started the handshake.

use crate::types::ConversationId;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn generate(length: usize) -> Self {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CorrelationToken(..)")
    }
}

#[derive(Debug)]
struct Pending {
    conversation: ConversationId,
    issued_at: Instant,
}

#[derive(Debug, Default)]
struct Entries {
    by_token: HashMap<String, Pending>,
    by_conversation: HashMap<ConversationId, String>,
}

#[derive(Debug)]
pub struct CorrelationStore {
    entries: Mutex<Entries>,
    ttl: Duration,
    token_length: usize,
}

impl CorrelationStore {
    pub fn new(ttl: Duration, token_length: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            ttl,
            token_length,
        }
    }

    /// Issues a fresh token for `conversation`. Any earlier unconsumed token
    /// of the same conversation stops resolving.
    pub fn create(&self, conversation: ConversationId) -> CorrelationToken {
        let mut entries = self.lock();
        let ttl = self.ttl;
        entries
            .by_token
            .retain(|_, pending| pending.issued_at.elapsed() < ttl);
        let Entries {
            by_token,
            by_conversation,
        } = &mut *entries;
        by_conversation.retain(|_, token| by_token.contains_key(token));

        if let Some(previous) = by_conversation.remove(&conversation) {
            by_token.remove(&previous);
        }

        let token = loop {
            let candidate = CorrelationToken::generate(self.token_length);
            if !by_token.contains_key(candidate.as_str()) {
                break candidate;
            }
        };
        by_token.insert(
            token.as_str().to_string(),
            Pending {
                conversation,
                issued_at: Instant::now(),
            },
        );
        by_conversation.insert(conversation, token.as_str().to_string());
        token
    }

    /// Consumes `token`. Unknown, expired and already consumed tokens all
    /// resolve to `None`.
    pub fn resolve(&self, token: &str) -> Option<ConversationId> {
        let mut entries = self.lock();
        let pending = entries.by_token.remove(token)?;
        if entries.by_conversation.get(&pending.conversation).map(String::as_str) == Some(token) {
            entries.by_conversation.remove(&pending.conversation);
        }
        if pending.issued_at.elapsed() >= self.ttl {
            return None;
        }
        Some(pending.conversation)
    }

    pub fn pending(&self) -> usize {
        self.lock().by_token.len()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // The map stays consistent even if a holder panicked mid-operation.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
