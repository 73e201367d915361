#![warn(missing_docs)]
#![allow(clippy::arithmetic_side_effects)] // Simple counters cannot overflow
#![allow(clippy::indexing_slicing)] // Bounds checked by logic

//! # ctxmenu - Context Menu Reconciliation Engine
//!
//! ctxmenu manages the Explorer context menu entries registered in the
//! Windows registry. It scans the layered store (per-user, machine-wide and
//! the merged class view), merges overlapping entries by precedence, tracks
//! requested enable/disable edits against the committed state, and commits
//! them with a backup taken first and a per-user fallback when a
//! machine-wide write is refused.
//!
//! ## Architecture
//!
//! - [`store`]: the hierarchical store abstraction and its backends
//! - [`model`]: the [`model::MenuItem`] entity and the working set
//! - [`scanner`]: enumerates and classifies entries per scenario
//! - [`mutation`]: writes enable/disable with privilege fallback
//! - [`storage`]: backups, restore and the first-run rollback default
//! - [`sync`]: mirrors pending edits across scenarios
//! - [`session`]: ties the above into one reconciliation session
//! - [`config`], [`lock`], [`output`], [`commands`]: the `ctxm` front end
//!
//! ## Example Usage
//!
//! ```no_run
//! use ctxmenu::MenuContext;
//! use ctxmenu::model::Scenario;
//! use ctxmenu::notify::LogNotifier;
//! use ctxmenu::session::Session;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = MenuContext::new()?;
//! let store = ctxmenu::store::open(ctx.config.core.backend, &ctx.data_dir)?;
//! let mut session = Session::open(&ctx, store, Arc::new(LogNotifier));
//!
//! session.set_enabled_by_id(Scenario::Directory, "git_gui", false)?;
//! let report = session.apply()?;
//! println!("{} applied, {} failed", report.success_count, report.fail_count);
//! # Ok(())
//! # }
//! ```

/// Known-identity catalog.
pub mod catalog;

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Command implementations for the `ctxm` binary.
pub mod commands;

/// Configuration parsing, validation, and management.
pub mod config;

/// Cross-process session locking.
pub mod lock;

/// Menu item entity and change tracking.
pub mod model;

/// Store mutation with privilege fallback.
pub mod mutation;

/// Shell change notification.
pub mod notify;

/// Output formatting.
pub mod output;

/// Namespace scanning.
pub mod scanner;

/// Reconciliation session.
pub mod session;

/// Backups and restore.
pub mod storage;

/// Hierarchical store abstraction and backends.
pub mod store;

/// Cross-scenario propagation of pending edits.
pub mod sync;

/// Utility functions and helpers.
pub mod utils;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Current version of the ctxm binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path relative to the user config directory.
pub const DEFAULT_CONFIG_PATH: &str = "ctxmenu/config.toml";

/// Directory name for backups inside the data directory.
pub const BACKUPS_DIR: &str = "Backups";

/// Sentinel marking that the first-run backup exists.
pub const FIRST_RUN_FLAG: &str = "FirstRunDone.flag";

/// File store image inside the data directory.
pub const STORE_FILE: &str = "store.bin";

/// Directory name for session locks inside the data directory.
pub const LOCKS_DIR: &str = "locks";

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "CTXMENU_CONFIG_PATH";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CTXMENU_DATA_DIR";

/// Central context for all ctxmenu operations.
///
/// Holds the data directory, the configuration and the interaction mode.
///
/// # Examples
///
/// ```no_run
/// use ctxmenu::MenuContext;
///
/// # fn main() -> anyhow::Result<()> {
/// // Context with default paths
/// let ctx = MenuContext::new()?;
///
/// // Context with explicit paths (for testing)
/// let ctx = MenuContext::new_explicit("/tmp/ctxm-data".into(), "/tmp/ctxm.toml".into())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MenuContext {
    /// Directory holding backups, locks and the file store.
    pub data_dir: PathBuf,

    /// Path to the configuration file.
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,

    /// Whether to run in non-interactive mode (no prompts).
    pub non_interactive: bool,
}

impl MenuContext {
    /// Creates a context from the default configuration path, honouring the
    /// `CTXMENU_CONFIG_PATH` and `CTXMENU_DATA_DIR` overrides.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined or the
    /// configuration file cannot be read or created.
    pub fn new() -> Result<Self> {
        let config_path = if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            PathBuf::from(path)
        } else {
            let config_dir = dirs::config_dir().context("Could not find config directory")?;
            config_dir.join(DEFAULT_CONFIG_PATH)
        };

        let config = config::Config::load(&config_path)?;

        let data_dir = if let Ok(path) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(path)
        } else {
            config.core.data_dir.clone()
        };

        let validator = config::validator::ConfigValidator::new();
        if let Err(e) = validator.validate_config_file(&config_path) {
            tracing::warn!(error = %e, "Configuration validation failed");
        }

        if let Err(e) = utils::thread_pool::configure_from_config(&config) {
            tracing::debug!(error = %e, "Scan thread pool left at defaults");
        }

        Ok(Self {
            data_dir,
            config_path,
            config,
            non_interactive: false,
        })
    }

    /// Creates a context with explicit paths. A missing configuration file is
    /// created with defaults pointing at `data_dir`.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be loaded or created.
    pub fn new_with_explicit_paths(data_dir: PathBuf, config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            config::Config::load(&config_path)?
        } else {
            let mut config = config::Config::default();
            config.core.data_dir.clone_from(&data_dir);
            config.save(&config_path)?;
            config
        };

        Ok(Self {
            data_dir,
            config_path,
            config,
            non_interactive: false,
        })
    }

    /// Creates a non-interactive context with explicit paths.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be loaded or created.
    pub fn new_explicit(data_dir: PathBuf, config_path: PathBuf) -> Result<Self> {
        let mut context = Self::new_with_explicit_paths(data_dir, config_path)?;
        context.non_interactive = true;
        Ok(context)
    }

    /// Ensures that the data directory exists.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                self.data_dir.display()
            )
        })
    }
}
