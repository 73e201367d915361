use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Tells the desktop shell that menu registrations changed.
///
/// Fire-and-forget: implementations must not fail the caller.
pub trait ShellNotifier: Send + Sync {
    /// Called once after a batch that committed at least one mutation.
    fn associations_changed(&self);
}

/// Emits a tracing event instead of notifying a real shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ShellNotifier for LogNotifier {
    fn associations_changed(&self) {
        info!("Context menu registrations changed; restart the shell to see every change");
    }
}

/// Counts notifications.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    count: AtomicUsize,
}

impl RecordingNotifier {
    /// Notifications received so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ShellNotifier for RecordingNotifier {
    fn associations_changed(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
