use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use maintenance::ServerRole;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shardsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile a database server's shards against the cluster plan", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/shardsync/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the actions that bring Local in line with Plan
    Diff(SnapshotArgs),

    /// Show the patches that publish Local to Current
    Report(SnapshotArgs),

    /// Show followers that must resynchronize with their leader
    Sync(SnapshotArgs),

    /// Run a full maintenance cycle and print its report
    Cycle(CycleArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Snapshot Arguments
// ============================================================================

/// Where the three topology documents come from and who reads them
#[derive(Args, Debug, Clone, Default)]
pub struct SnapshotArgs {
    /// Server id of this node (overrides config)
    #[arg(short, long, env = "SHARDSYNC_SERVER_ID")]
    pub server_id: Option<String>,

    /// Plan document (JSON)
    #[arg(long, value_name = "FILE")]
    pub plan: Option<String>,

    /// Current document (JSON)
    #[arg(long, value_name = "FILE")]
    pub current: Option<String>,

    /// Local document (JSON)
    #[arg(long, value_name = "FILE")]
    pub local: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CycleArgs {
    #[command(flatten)]
    pub snapshots: SnapshotArgs,

    /// Role of this node (overrides config)
    #[arg(long, value_parser = parse_role)]
    pub role: Option<ServerRole>,

    /// Submit duplicate actions instead of letting the actuator merge them
    #[arg(long)]
    pub no_merge: bool,
}

fn parse_role(value: &str) -> Result<ServerRole, String> {
    value.parse()
}
