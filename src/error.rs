//! Error types for kafka-facade
//!
//! This module defines the error types returned by the client facade and the
//! configuration adapter, using `thiserror` for ergonomic error handling.
//!
//! Per-message delivery errors reported asynchronously by the broker library
//! are not represented here: they travel as [`crate::session::SessionEvent`]s
//! to the drain task and are logged, never returned to a caller.

use thiserror::Error;

use crate::session::SessionKind;

/// Errors that can occur while resolving or loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A comma-separated list produced no usable entries.
    #[error("{0} list is empty")]
    EmptyList(&'static str),

    /// Invalid initial offset policy specified.
    #[error("Invalid offset reset policy: {0}")]
    InvalidOffsetReset(String),

    /// Invalid security protocol specified.
    #[error("Invalid security protocol: {0}")]
    InvalidSecurityProtocol(String),

    /// Invalid SASL mechanism specified.
    #[error("Invalid SASL mechanism: {0}")]
    InvalidSaslMechanism(String),

    /// Config file could not be read.
    #[error("Failed to read config file: {0}")]
    Read(String),

    /// Config file could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Main error type for client operations
///
/// Callers see either a setup-time failure, a per-topic failure from a
/// synchronous send, or [`ClientError::Closed`] once the client has been
/// closed.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration could not be turned into a session.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The broker library refused to open a session.
    #[error("Failed to open {kind} session: {message}")]
    Setup {
        /// Which session was being opened
        kind: SessionKind,
        /// Error reported by the broker library
        message: String,
    },

    /// A synchronous send was not acknowledged for one destination topic.
    ///
    /// Topics earlier in the configured list may already have been delivered.
    #[error("Send to topic '{topic}' failed: {message}")]
    Send {
        /// Destination topic of the failed send
        topic: String,
        /// Error reported by the broker library
        message: String,
    },

    /// The broker library rejected an offset for commit.
    #[error("Failed to mark offset {offset} on {topic}/{partition}: {message}")]
    MarkOffset {
        /// Topic of the message
        topic: String,
        /// Partition of the message
        partition: i32,
        /// Offset of the message
        offset: i64,
        /// Error reported by the broker library
        message: String,
    },

    /// A session did not shut down cleanly.
    #[error("Failed to close {kind} session: {message}")]
    Close {
        /// Which session was being closed
        kind: SessionKind,
        /// Error reported by the broker library
        message: String,
    },

    /// The client or session has been closed.
    #[error("Client is closed")]
    Closed,
}

impl ClientError {
    /// Build a setup error for the given session kind.
    pub fn setup(kind: SessionKind, message: impl Into<String>) -> Self {
        Self::Setup {
            kind,
            message: message.into(),
        }
    }

    /// Build a per-topic send error.
    pub fn send(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the client can no longer be used.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
