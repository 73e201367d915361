//! Terminal output for the `ctxm` CLI.
//!
//! Messages go to stderr so that listings on stdout stay pipeable. Routine
//! messages are dimmed, warnings and errors are bold, and everything but
//! warnings and errors honours the global [`Verbosity`].

use crate::mutation::ApplyReport;
use crate::utils::plural;
use colored::Colorize;
use std::sync::atomic::{AtomicU8, Ordering};

/// How chatty the CLI is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet = 0,
    /// Default
    Normal = 1,
    /// Also per-item detail
    Verbose = 2,
}

impl Verbosity {
    /// Maps the `-q`/`-v` flags to a level. Quiet wins over verbose.
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose > 0 {
            Self::Verbose
        } else {
            Self::Normal
        }
    }
}

static VERBOSITY: AtomicU8 = AtomicU8::new(Verbosity::Normal as u8);

/// Sets the global verbosity.
pub fn set_verbosity(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// Current global verbosity.
pub fn get_verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Normal,
    }
}

fn quiet() -> bool {
    get_verbosity() == Verbosity::Quiet
}

/// Green message, suppressed when quiet.
pub fn success(message: &str) {
    if !quiet() {
        eprintln!("{}", message.green());
    }
}

/// Bold red message, always shown.
pub fn error(message: &str) {
    eprintln!("{}", message.red().bold());
}

/// Bold yellow message, always shown.
pub fn warning(message: &str) {
    eprintln!("{}", message.yellow().bold());
}

/// Dimmed message, suppressed when quiet.
pub fn info(message: &str) {
    if !quiet() {
        eprintln!("{}", message.dimmed());
    }
}

/// Dimmed message shown only in verbose mode.
pub fn verbose(message: &str) {
    if get_verbosity() == Verbosity::Verbose {
        eprintln!("{}", message.dimmed());
    }
}

/// `verb message` with a dimmed bold verb, suppressed when quiet.
pub fn action(verb: &str, message: &str) {
    if !quiet() {
        eprintln!("{} {}", verb.dimmed().bold(), message);
    }
}

/// One-line summary of an [`ApplyReport`].
#[must_use]
pub fn summarize_report(report: &ApplyReport) -> String {
    let applied = report.success_count;
    let failed = report.fail_count;
    if failed == 0 {
        format!("{applied} change{} applied", plural(applied))
    } else {
        format!(
            "{applied} change{} applied, {failed} failed",
            plural(applied)
        )
    }
}

/// Prints the outcome of a batch, listing each failure.
///
/// Returns whether every item succeeded.
pub fn report(report: &ApplyReport) -> bool {
    let summary = summarize_report(report);
    if report.is_complete() {
        success(&summary);
        return true;
    }

    warning(&summary);
    for failure in &report.failures {
        eprintln!("  {} {failure}", "failed:".red());
    }
    false
}
