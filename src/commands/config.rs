use crate::MenuContext;
use crate::config::Config;
use crate::config::validator::ConfigValidator;
use crate::output;
use anyhow::Result;
use colored::Colorize;

/// Gets, sets, unsets or lists configuration values.
///
/// # Errors
///
/// Returns an error if:
/// - The key is unknown or the value invalid
/// - The resulting configuration fails validation
/// - The configuration cannot be saved
pub fn execute(
    ctx: &mut MenuContext,
    key: Option<&str>,
    value: Option<String>,
    unset: bool,
    list: bool,
) -> Result<()> {
    let Some(key) = key.filter(|_| !list) else {
        show_all_config(&ctx.config);
        return Ok(());
    };

    if unset {
        ctx.config.unset(key)?;
        ConfigValidator::validate_values(&ctx.config)?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Unset {key}"));
    } else if let Some(val) = value {
        ctx.config.set(key, &val)?;
        ConfigValidator::validate_values(&ctx.config)?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Set {key} = {val}"));
    } else if let Some(val) = ctx.config.get(key) {
        println!("{val}");
    } else {
        output::warning(&format!("Unknown configuration key '{key}'"));
    }

    Ok(())
}

fn show_all_config(config: &Config) {
    let mut section = "";
    for key in Config::KEYS {
        let Some((name, field)) = key.split_once('.') else {
            continue;
        };
        if name != section {
            if !section.is_empty() {
                println!();
            }
            println!("{}", format!("[{name}]").bold());
            section = name;
        }
        println!("  {field} = {}", config.get(key).unwrap_or_default());
    }
}
