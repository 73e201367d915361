use crate::model::{ItemSource, MenuItem, RiskLevel};
use crate::store::Scope;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;

/// Formats an item's desired state, marking pending changes with `*`
#[must_use]
pub fn format_state(item: &MenuItem) -> String {
    let state = if item.is_enabled() {
        "on ".green().to_string()
    } else {
        "off".red().to_string()
    };
    if item.has_changes() {
        format!("{state}{}", "*".yellow().bold())
    } else {
        format!("{state} ")
    }
}

/// Formats a risk level, highlighting anything above low
#[must_use]
pub fn format_risk(risk: RiskLevel) -> String {
    match risk {
        RiskLevel::Low => "low".dimmed().to_string(),
        RiskLevel::Medium => "medium".yellow().to_string(),
        RiskLevel::High => "high".red().bold().to_string(),
    }
}

/// Short scope tag shown next to an item
#[must_use]
pub const fn scope_tag(scope: Scope) -> &'static str {
    match scope {
        Scope::UserScope => "user",
        Scope::SystemScope => "system",
        Scope::MergedView => "classes",
    }
}

/// Vendor or origin column for an item
#[must_use]
pub fn format_source(item: &MenuItem) -> String {
    if !item.source_name.is_empty() {
        return item.source_name.clone();
    }
    match item.source {
        ItemSource::System => "Windows".to_string(),
        ItemSource::ThirdParty => "unknown".to_string(),
    }
}

/// Formats a timestamp in local time
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Formats a relative time from `now`
#[must_use]
pub fn format_relative_time(timestamp: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let diff = (*now - *timestamp).num_seconds();

    if diff < 0 {
        return "in the future".to_string();
    }

    let (value, unit) = if diff < 60 {
        (diff, "second")
    } else if diff < 3600 {
        (diff / 60, "minute")
    } else if diff < 86400 {
        (diff / 3600, "hour")
    } else if diff < 2_592_000 {
        (diff / 86400, "day")
    } else if diff < 31_536_000 {
        (diff / 2_592_000, "month")
    } else {
        (diff / 31_536_000, "year")
    };

    if value == 1 {
        format!("{value} {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

/// Truncates a string to at most `max_chars` characters with an ellipsis
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars < 3 {
        return s.chars().take(max_chars).collect();
    }
    let head: String = s.chars().take(max_chars - 3).collect();
    format!("{head}...")
}
