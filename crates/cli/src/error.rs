//! Error types for CLI operations.

use contracts::{ContractError, QueueError};
use ingestion::IngestionError;
use thiserror::Error;

/// Exit code for a graceful shutdown
pub const EXIT_OK: u8 = 0;
/// Exit code for failures without a more specific code
pub const EXIT_FAILURE: u8 = 1;
/// Exit code for configuration failures
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for unrecoverable transport failures
pub const EXIT_TRANSPORT: u8 = 3;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or is invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ContractError),

    /// Broker connection or writer setup failed
    #[error("Failed to {action}: {source}")]
    Transport {
        action: String,
        #[source]
        source: QueueError,
    },

    /// The source became unreadable while running
    #[error("Ingestion stopped: {0}")]
    Ingestion(#[from] IngestionError),

    /// Pipeline execution error
    #[error("Pipeline execution failed: {message}")]
    PipelineExecution { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn transport(action: impl Into<String>, source: QueueError) -> Self {
        Self::Transport {
            action: action.into(),
            source,
        }
    }

    pub fn pipeline_execution(message: impl Into<String>) -> Self {
        Self::PipelineExecution {
            message: message.into(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigNotFound { .. } | Self::Config(_) => EXIT_CONFIG,
            Self::Transport { .. } | Self::Ingestion(_) => EXIT_TRANSPORT,
            Self::PipelineExecution { .. } | Self::Io(_) => EXIT_FAILURE,
        }
    }
}

/// Exit code for an error chain, using the first `CliError` found in it
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|e| e.downcast_ref::<CliError>())
        .map_or(EXIT_FAILURE, CliError::exit_code)
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
