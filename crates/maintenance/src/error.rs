//! Error types for the maintenance crate.
//!
//! Missing substructure in a topology document is never an error; these
//! variants cover fragments that exist but have the wrong shape, and the
//! failures of the collaborators a maintenance cycle hands its output to.

use crate::types::ServerRole;
use thiserror::Error;

/// Errors that can occur while diffing topologies or running a cycle
#[derive(Debug, Error)]
pub enum MaintenanceError {
    /// A fragment exists but cannot be interpreted
    #[error("malformed fragment at {path}: {reason}")]
    MalformedFragment {
        /// `/`-joined path of the offending fragment
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// The actuator refused an action
    #[error("failed to submit {action}: {message}")]
    Submit {
        /// Display form of the rejected action
        action: String,
        /// Error reported by the actuator
        message: String,
    },

    /// The configuration store refused a batch of report patches
    #[error("failed to publish {count} report patches: {message}")]
    Publish {
        /// Number of patches in the rejected batch
        count: usize,
        /// Error reported by the store
        message: String,
    },

    /// Maintenance was invoked on a node that does not host shards
    #[error("maintenance only runs on database servers, this node is {role}")]
    NotDatabaseServer {
        /// Role the node was configured with
        role: ServerRole,
    },

    /// A second cycle was started while one is still running
    #[error("a maintenance cycle is already running")]
    CycleInProgress,

    /// A topology document could not be parsed
    #[error("invalid topology document: {0}")]
    Json(#[from] serde_json::Error),

    /// A topology document could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaintenanceError {
    /// Build a [`MaintenanceError::MalformedFragment`] from path segments.
    pub fn malformed(path: &[&str], reason: impl Into<String>) -> Self {
        Self::MalformedFragment {
            path: path.join("/"),
            reason: reason.into(),
        }
    }
}

/// Result type for maintenance operations
pub type Result<T> = std::result::Result<T, MaintenanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_joins_path() {
        let err = MaintenanceError::malformed(&["Collections", "d1", "c1"], "not an object");
        assert_eq!(
            err.to_string(),
            "malformed fragment at Collections/d1/c1: not an object"
        );
    }

    #[test]
    fn test_not_database_server_names_role() {
        let err = MaintenanceError::NotDatabaseServer {
            role: ServerRole::Coordinator,
        };
        assert!(err.to_string().contains("COORDINATOR"));
    }
}
