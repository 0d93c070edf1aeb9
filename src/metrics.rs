// Runtime counters
//
// Lightweight tracking of routed notifications and import outcomes

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-lifetime counters
///
/// Uses atomic operations so producer threads, import workers and the
/// consumer context can all record without locks. Shared as `Arc<Metrics>`
/// and logged once on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Envelopes taken off the notification channel by the router
    pub envelopes_routed: AtomicU64,

    /// Soft-error notifications appended to the error buffer
    pub soft_errors_buffered: AtomicU64,

    /// Error dialogs shown to the user
    pub error_reports: AtomicU64,

    /// Files copied into the mods directory by file import
    pub files_imported: AtomicUsize,

    /// Archives downloaded and unpacked by link import
    pub archives_imported: AtomicUsize,

    /// Import items that ended in an error report
    pub imports_failed: AtomicUsize,

    /// Wake attempts that found no consumer or were rejected
    pub wake_retries: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            envelopes_routed: AtomicU64::new(0),
            soft_errors_buffered: AtomicU64::new(0),
            error_reports: AtomicU64::new(0),
            files_imported: AtomicUsize::new(0),
            archives_imported: AtomicUsize::new(0),
            imports_failed: AtomicUsize::new(0),
            wake_retries: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_envelope(&self) {
        self.envelopes_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_soft_error(&self) {
        self.soft_errors_buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error_report(&self) {
        self.error_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_imported(&self) {
        self.files_imported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archive_imported(&self) {
        self.archives_imported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_import_failed(&self) {
        self.imports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wake_retry(&self) {
        self.wake_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Loader Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Notifications: {} routed, {} soft errors buffered, {} error reports",
            self.envelopes_routed.load(Ordering::Relaxed),
            self.soft_errors_buffered.load(Ordering::Relaxed),
            self.error_reports.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Imports: {} files, {} archives, {} failed",
            self.files_imported.load(Ordering::Relaxed),
            self.archives_imported.load(Ordering::Relaxed),
            self.imports_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Wake retries: {}",
            self.wake_retries.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.envelopes_routed.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.files_imported.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_import_outcomes() {
        let metrics = Metrics::new();

        metrics.record_file_imported();
        metrics.record_file_imported();
        metrics.record_archive_imported();
        metrics.record_import_failed();

        assert_eq!(metrics.files_imported.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.archives_imported.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.imports_failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_notification_counters() {
        let metrics = Metrics::new();

        metrics.record_envelope();
        metrics.record_soft_error();
        metrics.record_error_report();
        metrics.record_wake_retry();

        assert_eq!(metrics.envelopes_routed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.soft_errors_buffered.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.error_reports.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.wake_retries.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_uptime() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
