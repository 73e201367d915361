//! Utility functions and helpers.
//!
//! # Submodules
//!
//! - [`formatters`]: Output formatting
//! - [`serialization`]: Binary encoding of the file store image
//! - [`thread_pool`]: Scan thread pool configuration

/// Output formatting and colorization
pub mod formatters;
/// Binary serialization utilities
pub mod serialization;
/// Thread pool configuration for parallel scans
pub mod thread_pool;

/// Returns `"s"` when `count` calls for a plural.
#[must_use]
pub const fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
