pub mod validator;

use crate::model::Scenario;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    /// Backup retention
    #[serde(default)]
    pub backup: BackupConfig,

    /// Which scenarios are scanned
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub backend: Backend,
}

/// Store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Registry on Windows, file store elsewhere
    #[default]
    Auto,
    /// `store.bin` under the data directory
    File,
    /// The live registry (Windows only)
    Registry,
}

impl Backend {
    /// Replaces `Auto` with the concrete backend for this platform.
    #[must_use]
    pub const fn resolve(self) -> Self {
        match self {
            Self::Auto if cfg!(windows) => Self::Registry,
            Self::Auto => Self::File,
            other => other,
        }
    }

    /// Lowercase name as used in the config file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::File => "file",
            Self::Registry => "registry",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "file" => Ok(Self::File),
            "registry" => Ok(Self::Registry),
            _ => Err(anyhow::anyhow!(
                "Invalid backend: {s} (expected auto, file or registry)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupConfig {
    /// Number of backups kept by cleanup
    #[serde(default = "default_retention")]
    pub retention: usize,
    /// Prune after every automatic backup
    #[serde(default = "default_auto_cleanup")]
    pub auto_cleanup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanConfig {
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceConfig {
    /// Worker threads used for scanning, 0 lets rayon decide
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::Auto,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            auto_cleanup: default_auto_cleanup(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scenarios: default_scenarios(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot read or parse the configuration file
    /// - Configuration file contains invalid TOML or invalid values
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            // Create default config if it doesn't exist
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse TOML config")?;
        validator::ConfigValidator::validate_values(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot write to the file
    /// - TOML serialization fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }

    /// Every key accepted by [`Config::get`] and [`Config::set`].
    pub const KEYS: [&'static str; 6] = [
        "core.data_dir",
        "core.backend",
        "backup.retention",
        "backup.auto_cleanup",
        "scan.scenarios",
        "performance.parallel_threads",
    ];

    /// Get a configuration value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let (section, name) = key.split_once('.')?;

        match (section, name) {
            ("core", "data_dir") => Some(self.core.data_dir.display().to_string()),
            ("core", "backend") => Some(self.core.backend.as_str().to_string()),
            ("backup", "retention") => Some(self.backup.retention.to_string()),
            ("backup", "auto_cleanup") => Some(self.backup.auto_cleanup.to_string()),
            ("scan", "scenarios") => Some(
                self.scan
                    .scenarios
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ("performance", "parallel_threads") => {
                Some(self.performance.parallel_threads.to_string())
            }
            _ => None,
        }
    }

    /// Set a configuration value by key
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key format is invalid (must be section.key)
    /// - The key is unknown
    /// - The value is invalid for the key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, name) = key
            .split_once('.')
            .ok_or_else(|| anyhow::anyhow!("Invalid configuration key: {key}"))?;

        match (section, name) {
            ("core", "data_dir") => self.core.data_dir = PathBuf::from(value),
            ("core", "backend") => self.core.backend = value.parse()?,
            ("backup", "retention") => {
                let retention: usize = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
                if retention == 0 {
                    anyhow::bail!("Backup retention must be at least 1");
                }
                self.backup.retention = retention;
            }
            ("backup", "auto_cleanup") => {
                self.backup.auto_cleanup = value
                    .parse()
                    .with_context(|| format!("Invalid boolean: {value}"))?;
            }
            ("scan", "scenarios") => self.scan.scenarios = parse_scenarios(value)?,
            ("performance", "parallel_threads") => {
                self.performance.parallel_threads = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
            }
            _ => return Err(anyhow::anyhow!("Unknown configuration key: {key}")),
        }
        Ok(())
    }

    /// Reset a configuration value to its default
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown
    pub fn unset(&mut self, key: &str) -> Result<()> {
        let defaults = Self::default();
        match key {
            "core.data_dir" => self.core.data_dir = defaults.core.data_dir,
            "core.backend" => self.core.backend = defaults.core.backend,
            "backup.retention" => self.backup.retention = defaults.backup.retention,
            "backup.auto_cleanup" => self.backup.auto_cleanup = defaults.backup.auto_cleanup,
            "scan.scenarios" => self.scan.scenarios = defaults.scan.scenarios,
            "performance.parallel_threads" => {
                self.performance.parallel_threads = defaults.performance.parallel_threads;
            }
            _ => return Err(anyhow::anyhow!("Cannot unset configuration key: {key}")),
        }
        Ok(())
    }
}

/// Parses a comma-separated scenario list such as `file,background`.
///
/// # Errors
///
/// Returns an error for an empty list or an unknown scenario name.
pub fn parse_scenarios(value: &str) -> Result<Vec<Scenario>> {
    let mut scenarios = Vec::new();
    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let scenario = Scenario::from_str(name, true)
            .or_else(|_| {
                Scenario::ALL
                    .into_iter()
                    .find(|s| format!("{s:?}").eq_ignore_ascii_case(name))
                    .ok_or(())
            })
            .map_err(|()| anyhow::anyhow!("Unknown scenario: {name}"))?;
        if !scenarios.contains(&scenario) {
            scenarios.push(scenario);
        }
    }
    if scenarios.is_empty() {
        anyhow::bail!("At least one scenario is required");
    }
    Ok(scenarios)
}

// Default functions for serde
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("ctxmenu")
}

const fn default_retention() -> usize {
    10
}

const fn default_auto_cleanup() -> bool {
    true
}

fn default_scenarios() -> Vec<Scenario> {
    Scenario::ALL.to_vec()
}

fn default_parallel_threads() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(4)
}
