//! shardsync configuration (`config.toml`)
//!
//! ```toml
//! server_id = "PRMR-1"
//! role = "primary"
//! merge_duplicates = true
//!
//! [snapshots]
//! plan = "~/cluster/plan.json"
//! current = "~/cluster/current.json"
//! local = "~/cluster/local.json"
//! ```
//!
//! Every value can be overridden on the command line.

use crate::cli::SnapshotArgs;
use crate::paths;
use anyhow::{Context, Result, bail};
use maintenance::{MaintenanceContext, ServerRole};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardsyncConfig {
    /// Server id of this node
    #[serde(default)]
    pub server_id: Option<String>,

    /// Role of this node
    #[serde(default)]
    pub role: ServerRole,

    /// Let the actuator merge duplicate actions
    #[serde(default = "default_true")]
    pub merge_duplicates: bool,

    /// Default locations of the topology documents
    #[serde(default)]
    pub snapshots: SnapshotPaths,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotPaths {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub local: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ShardsyncConfig {
    fn default() -> Self {
        Self {
            server_id: None,
            role: ServerRole::default(),
            merge_duplicates: true,
            snapshots: SnapshotPaths::default(),
        }
    }
}

/// Fully resolved inputs of one command
#[derive(Debug, Clone)]
pub struct Invocation {
    pub ctx: MaintenanceContext,
    pub plan: PathBuf,
    pub current: PathBuf,
    pub local: PathBuf,
}

impl ShardsyncConfig {
    /// Load the config
    ///
    /// An explicit path must exist. Without one the default location is
    /// tried, and a missing file there means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let path = paths::config_file()?;
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load the config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in shardsync config")
    }

    /// Merge command-line arguments over this config
    pub fn invocation(&self, args: &SnapshotArgs) -> Result<Invocation> {
        let Some(server_id) = args.server_id.as_ref().or(self.server_id.as_ref()) else {
            bail!("No server id: pass --server-id, set SHARDSYNC_SERVER_ID or set server_id in config");
        };

        let ctx = MaintenanceContext::new(server_id.as_str())
            .with_role(self.role)
            .with_merge_duplicates(self.merge_duplicates);

        Ok(Invocation {
            ctx,
            plan: resolve_snapshot("plan", args.plan.as_ref(), self.snapshots.plan.as_ref())?,
            current: resolve_snapshot(
                "current",
                args.current.as_ref(),
                self.snapshots.current.as_ref(),
            )?,
            local: resolve_snapshot("local", args.local.as_ref(), self.snapshots.local.as_ref())?,
        })
    }
}

fn resolve_snapshot(name: &str, flag: Option<&String>, configured: Option<&String>) -> Result<PathBuf> {
    match flag.or(configured) {
        Some(path) => Ok(paths::expand(path)),
        None => bail!("No {name} document: pass --{name} or set snapshots.{name} in config"),
    }
}

// ============================================================================
// Tests
// ============================================================================
