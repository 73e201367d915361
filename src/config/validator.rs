use super::Config;
use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::Path;

/// Checks configuration files for unknown fields and invalid values
pub struct ConfigValidator {
    /// Set of configuration fields recognized by ctxmenu
    known_fields: HashSet<&'static str>,
    /// Sections that may appear as tables
    known_sections: HashSet<&'static str>,
}

impl ConfigValidator {
    /// Create a new validator with known configuration fields
    #[must_use]
    pub fn new() -> Self {
        Self {
            known_fields: Config::KEYS.into_iter().collect(),
            known_sections: ["core", "backup", "scan", "performance"]
                .into_iter()
                .collect(),
        }
    }

    /// Rejects values that parse but make no sense.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate_values(config: &Config) -> Result<()> {
        if config.backup.retention == 0 {
            anyhow::bail!("Backup retention must be at least 1");
        }
        if config.scan.scenarios.is_empty() {
            anyhow::bail!("At least one scenario must be scanned");
        }
        Ok(())
    }

    /// Unknown fields present in a configuration file, as dotted keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn unknown_fields(&self, config_path: &Path) -> Result<Vec<String>> {
        if !config_path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(config_path)?;
        let parsed: toml::Value = toml::from_str(&content)?;

        let mut unknown = Vec::new();
        if let toml::Value::Table(sections) = parsed {
            for (section, value) in sections {
                if !self.known_sections.contains(section.as_str()) {
                    unknown.push(section);
                    continue;
                }
                let toml::Value::Table(fields) = value else {
                    unknown.push(section);
                    continue;
                };
                for key in fields.keys() {
                    let full_key = format!("{section}.{key}");
                    if !self.known_fields.contains(full_key.as_str()) {
                        unknown.push(full_key);
                    }
                }
            }
        }
        unknown.sort();
        Ok(unknown)
    }

    /// Validate a configuration file and warn about unknown fields
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn validate_config_file(&self, config_path: &Path) -> Result<()> {
        let unknown = self.unknown_fields(config_path)?;
        if !unknown.is_empty() {
            eprintln!("{}", "Configuration warnings:".yellow().bold());
            for field in &unknown {
                eprintln!("  Unknown configuration field: {}", field.yellow());
            }
            eprintln!();
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unknown_fields_are_reported() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[core]\nbackend = \"file\"\ncolour = true\n\n[remotes]\nx = 1\n",
        )?;

        let unknown = ConfigValidator::new().unknown_fields(&path)?;
        assert_eq!(unknown, vec!["core.colour".to_string(), "remotes".to_string()]);
        Ok(())
    }

    #[test]
    fn test_default_config_is_valid() -> Result<()> {
        ConfigValidator::validate_values(&Config::default())?;
        let mut config = Config::default();
        config.backup.retention = 0;
        assert!(ConfigValidator::validate_values(&config).is_err());
        Ok(())
    }
}
