//! Error types for orchestrated cluster operations.
//!
//! Driver failures ([`CliError`]) and planning failures ([`PlanError`]) are
//! wrapped here together with the multi-step failure of a rebalance.

use thiserror::Error;

use crate::client::valkey_cli::CliError;
use crate::slots::planner::PlanError;

/// Error type for orchestrator operations
#[derive(Error, Debug)]
pub enum Error {
    /// Admin tool invocation failed
    #[error(transparent)]
    Cli(#[from] CliError),

    /// Topology check failed before any command ran
    #[error("{operation} rejected: {source}")]
    Plan {
        operation: &'static str,
        #[source]
        source: PlanError,
    },

    /// A multi-step rebalance stopped partway; earlier steps stay applied
    #[error(
        "reshard step {step}/{total} into {failed_node} failed after {} completed step(s): {source}",
        .completed.len()
    )]
    PartialReshard {
        step: usize,
        total: usize,
        failed_node: String,
        completed: Vec<String>,
        #[source]
        source: CliError,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn plan(operation: &'static str, source: PlanError) -> Self {
        Error::Plan { operation, source }
    }

    /// Check if the operation was rejected before touching the cluster
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Plan { .. })
            || matches!(self, Error::Cli(CliError::InvalidConfig(_)))
    }

    /// Check if the operation was stopped through its cancellation token
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cli(e) => e.is_cancelled(),
            Error::PartialReshard { source, .. } => source.is_cancelled(),
            Error::Plan { .. } | Error::Serialization(_) => false,
        }
    }
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;
