//! Command-line interface definitions for ctxm.
//!
//! The definitions are shared between the main binary and the xtask man
//! page generator.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use crate::model::Scenario;
use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;

/// Main CLI structure for ctxm.
#[derive(Parser)]
#[command(
    name = "ctxm",
    version = crate::VERSION,
    about = "Explorer context menu manager",
    long_about = "Lists, enables and disables Explorer context menu entries, with a backup taken before every change"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output (repeat for trace logging)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List context menu entries
    List {
        /// Only show entries of this scenario
        #[arg(short, long, value_enum)]
        scenario: Option<Scenario>,

        /// Only show entries whose state differs from the rollback default
        #[arg(short, long)]
        changed: bool,
    },

    /// Hide an entry from the context menu
    Disable {
        /// Entry id (subkey or handler name)
        id: String,

        #[command(flatten)]
        target: ToggleTarget,
    },

    /// Show a previously hidden entry again
    Enable {
        /// Entry id (subkey or handler name)
        id: String,

        #[command(flatten)]
        target: ToggleTarget,
    },

    /// Create, list, restore and prune backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Restore the state recorded on the first run
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Get and set configuration options
    Config {
        /// Configuration key, e.g. backup.retention
        key: Option<String>,

        /// Configuration value to set
        value: Option<String>,

        /// Reset the key to its default
        #[arg(long)]
        unset: bool,

        /// List all configuration values
        #[arg(short, long)]
        list: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Which items an enable or disable applies to.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ToggleTarget {
    /// Scenario the entry belongs to (required when the id is ambiguous)
    #[arg(short, long, value_enum)]
    pub scenario: Option<Scenario>,

    /// Apply to every scenario that has an entry with this id
    #[arg(short, long)]
    pub all_scenarios: bool,

    /// Do not ask before changing machine-wide entries
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum BackupAction {
    /// Snapshot the current state
    Create {
        /// Backup description
        #[arg(short, long, default_value = "manual")]
        message: String,
    },

    /// List backups, newest first
    List,

    /// Restore a backup by file name, path, or "latest"
    Restore {
        /// Backup to restore
        backup: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete all but the newest backups
    Cleanup {
        /// Number of backups to keep (defaults to backup.retention)
        #[arg(short, long)]
        keep: Option<usize>,
    },
}
