use rayon::ThreadPoolBuilder;

/// Configures the global rayon pool used by parallel scans.
///
/// A thread count of 0 leaves rayon's default in place.
///
/// # Errors
///
/// Returns an error if the global pool was already initialized
pub fn configure_from_config(config: &crate::config::Config) -> anyhow::Result<()> {
    let threads = config.performance.parallel_threads;
    if threads == 0 {
        return Ok(());
    }

    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("ctxm-scan-{i}"))
        .build_global()?;
    tracing::debug!(threads, "Configured scan thread pool");
    Ok(())
}
