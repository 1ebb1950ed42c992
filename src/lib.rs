//! kafka-facade - Simple Kafka consumer and producer library
//!
//! This library wraps a Kafka client behind a small facade: one consumer
//! group, a fixed list of topics, and three operations (blocking receive,
//! acknowledged send, fire-and-forget send) with sensible defaults.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: The [`Client`] facade and its session lifecycle
//! - `config`: Configuration, defaults, and broker property mapping
//! - `message`: The [`Message`] record exchanged with callers
//! - `session`: The [`session::Backend`] seam and lazily opened session slots
//! - `drain`: Background tasks draining session error/success channels
//! - `kafka`: rdkafka implementation of the session seam
//! - `testing`: In-memory implementation of the session seam
//! - `logging`: Subscriber setup for binaries
//! - `metrics`: Counters emitted through the `metrics` facade
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use kafka_facade::{Client, Config, Message};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml")?;
//!     let client = Client::new(config);
//!
//!     client.async_send(&Message::new("ping")).await?;
//!     let reply = client.receive().await?;
//!     println!("{}: {}", reply.topic, reply.value_lossy());
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod drain;
pub mod error;
pub mod kafka;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod session;
pub mod testing;

// Re-export commonly used types
pub use client::Client;
pub use config::{Config, OffsetReset};
pub use drain::DeliveryObserver;
pub use error::{ClientError, ConfigError, Result};
pub use message::Message;
pub use session::{SessionEvent, SessionKind};
