//! Chat delivery: the sink trait, message splitting and the bundled sinks.

use crate::error::{InterpreterError, InterpreterResult};
use apbridge_core::constants::MAX_CHAT_MESSAGE_LENGTH;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Destination for outgoing chat text.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Deliver one message. Callers keep it under the chat length limit.
    async fn send(&self, text: &str) -> InterpreterResult<()>;
}

/// Break `text` into chat-sized messages.
///
/// Each non-blank line becomes its own message; a line longer than
/// `max_chars` is hard-split at character boundaries.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let mut rest = line;
        while rest.chars().count() > max_chars {
            let cut = rest
                .char_indices()
                .nth(max_chars)
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        if !rest.is_empty() {
            chunks.push(rest.to_string());
        }
    }

    chunks
}

/// Split `text` and send every chunk in order. Stops at the first failure.
pub async fn send_split(sink: &dyn ChatSink, text: &str) -> InterpreterResult<()> {
    for chunk in split_message(text, MAX_CHAT_MESSAGE_LENGTH) {
        sink.send(&chunk).await?;
    }
    Ok(())
}

/// Writes messages to standard output.
#[derive(Debug, Default, Clone)]
pub struct ConsoleSink {
    prefix: Option<String>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `prefix` to every printed line.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl ChatSink for ConsoleSink {
    async fn send(&self, text: &str) -> InterpreterResult<()> {
        match &self.prefix {
            Some(prefix) => println!("{} {}", prefix, text),
            None => println!("{}", text),
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts messages as `{"content": ...}` JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> InterpreterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout.max(Duration::from_secs(1)))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ChatSink for WebhookSink {
    async fn send(&self, text: &str) -> InterpreterResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { content: text })
            .send()
            .await?;

        if response.status().is_success() {
            debug!("webhook accepted message ({} chars)", text.chars().count());
            return Ok(());
        }

        Err(InterpreterError::delivery(format!(
            "http status {}",
            response.status()
        )))
    }
}
