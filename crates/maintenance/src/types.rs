//! Core types for maintenance cycles

use crate::action::ActionDescription;
use crate::patch::ReportPatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role a node plays in the cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
    /// Role not determined yet
    Undefined,
    /// Standalone server, no cluster
    Single,
    /// Database server hosting shards
    #[default]
    #[serde(alias = "dbserver")]
    Primary,
    /// Query coordinator, hosts no shards
    Coordinator,
    /// Member of the configuration store
    Agent,
}

impl ServerRole {
    /// Upper-case name as used in cluster listings
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Single => "SINGLE",
            Self::Primary => "PRIMARY",
            Self::Coordinator => "COORDINATOR",
            Self::Agent => "AGENT",
        }
    }

    /// Whether nodes of this role host shards and therefore run maintenance
    pub fn hosts_shards(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNDEFINED" => Ok(Self::Undefined),
            "SINGLE" => Ok(Self::Single),
            "PRIMARY" | "DBSERVER" => Ok(Self::Primary),
            "COORDINATOR" => Ok(Self::Coordinator),
            "AGENT" => Ok(Self::Agent),
            other => Err(format!("unknown server role: {other}")),
        }
    }
}

/// Outcome of one phase of a maintenance cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseReport {
    /// Version of the document this phase was computed from
    pub version: Option<u64>,
    /// Actions derived in this phase
    pub actions: Vec<ActionDescription>,
    /// Report patches derived in this phase
    pub patches: Vec<ReportPatch>,
    /// Actions the actuator accepted
    pub submitted: usize,
    /// Patches the configuration store accepted
    pub published: usize,
    /// Collaborator failures, already logged
    pub errors: Vec<String>,
}

impl PhaseReport {
    /// Start a report for a phase reading the given document version
    pub fn new(version: Option<u64>) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    /// Check if every action and patch was handed off
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether the phase found nothing to do
    pub fn is_converged(&self) -> bool {
        self.actions.is_empty() && self.patches.is_empty()
    }
}

/// Summary of a full two-phase maintenance cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// Node the cycle ran for
    pub server_id: String,
    /// Plan vs Local
    pub phase_one: PhaseReport,
    /// Local vs Current, and follower resynchronization
    pub phase_two: PhaseReport,
}

impl CycleReport {
    /// Create an empty report for a cycle starting now
    pub fn new(server_id: &str) -> Self {
        Self {
            started_at: Utc::now(),
            server_id: server_id.to_string(),
            phase_one: PhaseReport::default(),
            phase_two: PhaseReport::default(),
        }
    }

    /// Plan version consumed by phase one
    pub fn plan_version(&self) -> Option<u64> {
        self.phase_one.version
    }

    /// Current version consumed by phase two
    pub fn current_version(&self) -> Option<u64> {
        self.phase_two.version
    }

    /// Check if both phases handed off everything they derived
    pub fn is_success(&self) -> bool {
        self.phase_one.is_success() && self.phase_two.is_success()
    }

    /// Total number of actions derived in both phases
    pub fn total_actions(&self) -> usize {
        self.phase_one.actions.len() + self.phase_two.actions.len()
    }

    /// Total number of report patches derived
    pub fn total_patches(&self) -> usize {
        self.phase_one.patches.len() + self.phase_two.patches.len()
    }
}
