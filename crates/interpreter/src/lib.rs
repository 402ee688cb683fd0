//! Chat-facing side of apbridge.
//!
//! This crate provides:
//! - A message catalog with `{name}` placeholders and built-in fallbacks
//! - Chat sinks and the message splitter
//! - The announcement pipeline that polls the snapshot for new items
//! - Read-only queries and the chat command router
//! - [`BridgeService`], which wires them together

#![warn(unsafe_code)]

pub mod chat;
pub mod commands;
pub mod enrichment;
pub mod error;
pub mod messages;
pub mod permissions;
pub mod pipeline;
pub mod queries;
pub mod service;

pub use chat::{ChatSink, ConsoleSink, WebhookSink};
pub use commands::{Command, CommandRouter};
pub use error::{InterpreterError, InterpreterResult};
pub use messages::{MessageCatalog, MessageFormatter};
pub use permissions::ChatUser;
pub use pipeline::{AnnouncementPipeline, PollOutcome};
pub use queries::{Answer, QueryHandlers, QuerySettings};
pub use service::BridgeService;
