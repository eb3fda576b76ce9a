//! Layered error definitions
//!
//! Categorized by source: config / queue / decode

use std::io;

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Queue Errors =====
    /// Queue transport error
    #[error(transparent)]
    Queue(#[from] QueueError),

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Message-queue transport error
///
/// Read errors are split into transient (retry the read) and fatal
/// (the connection is unusable) via [`QueueError::is_transient`].
#[derive(Debug, Error)]
pub enum QueueError {
    /// Could not establish a connection to the broker
    #[error("failed to connect to broker: {message}")]
    Connection { message: String },

    /// Temporary condition, the operation may succeed if retried
    #[error("transient error on topic '{topic}': {message}")]
    Transient { topic: String, message: String },

    /// Connection was closed, locally or by the broker
    #[error("connection to topic '{topic}' is closed")]
    Closed { topic: String },

    /// Broker rejected a write
    #[error("write to topic '{topic}' failed: {message}")]
    Write { topic: String, message: String },

    /// Offset commit failed
    #[error("offset commit on topic '{topic}' failed: {message}")]
    Commit { topic: String, message: String },

    /// Underlying IO failure
    #[error("queue io error: {0}")]
    Io(#[from] io::Error),
}

impl QueueError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn transient(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn closed(topic: impl Into<String>) -> Self {
        Self::Closed {
            topic: topic.into(),
        }
    }

    pub fn write(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Whether a failed read is worth retrying on the same connection
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } | Self::Commit { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            Self::Connection { .. } | Self::Closed { .. } | Self::Write { .. } => false,
        }
    }

    /// Short label used for structured logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Transient { .. } => "transient",
            Self::Closed { .. } => "closed",
            Self::Write { .. } => "write",
            Self::Commit { .. } => "commit",
            Self::Io(_) => "io",
        }
    }
}

/// Payload decode failure
///
/// Terminal for the message: it cannot be classified and is never dispatched.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON or misses required fields
    #[error("malformed payload: {message}")]
    Malformed { message: String },

    /// Level field is not one of the known severity tiers
    #[error("unknown severity level '{level}'")]
    UnknownLevel { level: String },
}

impl DecodeError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
