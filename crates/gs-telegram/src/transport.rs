use crate::api::{
    ApiResponse, BotUser, GetUpdates, MAX_MESSAGE_LEN, SendMessage, Update, events_from_updates,
    split_message,
};
use async_trait::async_trait;
use gs_bot::ChatTransport;
use gs_core::error::TransportError;
use gs_core::{InboundEvent, OutboundMessage};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_SECS: u64 = 60;

/// Telegram Bot API over long polling.
pub struct TelegramTransport {
    http: reqwest::Client,
    endpoint: String,
    offset: AtomicI64,
}

impl TelegramTransport {
    pub fn new(token: &str) -> Result<Self, TransportError> {
        Self::with_base(token, API_BASE)
    }

    pub fn with_base(token: &str, base: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()
            .map_err(http_error)?;
        Ok(Self {
            http,
            endpoint: format!("{}/bot{token}", base.trim_end_matches('/')),
            offset: AtomicI64::new(0),
        })
    }

    /// Username of the bot account, used to build its chat link.
    pub async fn bot_username(&self) -> Result<String, TransportError> {
        let me: BotUser = self.call("getMe", &serde_json::json!({})).await?;
        me.username.ok_or_else(|| TransportError::Rejected {
            message: "bot account has no username".to_string(),
        })
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .json(body)
            .send()
            .await
            .map_err(http_error)?;
        let reply: ApiResponse<T> = response.json().await.map_err(http_error)?;
        match reply.result {
            Some(result) if reply.ok => Ok(result),
            _ => Err(TransportError::Rejected {
                message: reply
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            }),
        }
    }
}

fn http_error(err: reqwest::Error) -> TransportError {
    // Strip the URL: it embeds the bot token.
    TransportError::Http {
        message: err.without_url().to_string(),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn poll(&self) -> Result<Vec<InboundEvent>, TransportError> {
        let request = GetUpdates {
            offset: self.offset.load(Ordering::SeqCst),
            timeout: LONG_POLL_SECS,
            allowed_updates: &["message"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;
        let (events, next_offset) = events_from_updates(updates);
        if let Some(next_offset) = next_offset {
            self.offset.fetch_max(next_offset, Ordering::SeqCst);
        }
        if !events.is_empty() {
            debug!(count = events.len(), "received updates");
        }
        Ok(events)
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        for chunk in split_message(&message.text, MAX_MESSAGE_LEN) {
            let _: serde_json::Value = self
                .call("sendMessage", &SendMessage::new(message, &chunk))
                .await?;
        }
        Ok(())
    }
}
