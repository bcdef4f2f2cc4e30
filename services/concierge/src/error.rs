//! services/concierge/src/error.rs
//!
//! Defines the primary error type for the concierge service.

use crate::config::ConfigError;
use concierge_core::flow::{DefinitionError, FlowError};
use concierge_core::ports::PortError;

/// The primary error type for the `concierge` service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The flow definition could not be loaded.
    #[error("Flow definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// A user action that the current step does not allow.
    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A client line that is not a valid protocol message.
    #[error("Protocol Error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading the client stream).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
