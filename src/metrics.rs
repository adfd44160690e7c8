use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

/// Filesystem operation metrics collector
pub struct FsMetrics {
    /// Total filesystem operations
    pub operations_total: CounterVec,
    /// Operation duration in seconds
    pub operation_duration: HistogramVec,
    /// Failed operations by error code
    pub operation_errors: CounterVec,
}

impl FsMetrics {
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let operations_total = CounterVec::new(
            Opts::new("bucketfs_operations_total", "Total filesystem operations"),
            &["operation"],
        )?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "bucketfs_operation_duration_seconds",
                "Filesystem operation duration in seconds",
            ),
            &["operation"],
        )?;

        let operation_errors = CounterVec::new(
            Opts::new("bucketfs_operation_errors_total", "Failed filesystem operations"),
            &["operation", "code"],
        )?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(operation_duration.clone()))?;
        registry.register(Box::new(operation_errors.clone()))?;

        Ok(Self { operations_total, operation_duration, operation_errors })
    }

    /// Record an operation; `error_code` is set when it failed
    pub fn record_operation(&self, operation: &str, duration_secs: f64, error_code: Option<&str>) {
        self.operations_total.with_label_values(&[operation]).inc();
        self.operation_duration.with_label_values(&[operation]).observe(duration_secs);
        if let Some(code) = error_code {
            self.operation_errors.with_label_values(&[operation, code]).inc();
        }
    }
}
