use metrics::{counter, Counter};

/// Output telemetry.
///
/// Counts what a running output did with the metrics handed to it.  Every counter is labelled
/// with the name of the output.
#[derive(Clone)]
pub(crate) struct Telemetry {
    metrics_written: Counter,
    metrics_rejected: Counter,
    metrics_overflowed: Counter,
    write_errors: Counter,
    write_retries: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance for the given output.
    pub fn new(output: &str) -> Self {
        let labels = [("output", output.to_string())];

        Self {
            metrics_written: counter!("courier.output.metrics_written", &labels),
            metrics_rejected: counter!("courier.output.metrics_rejected", &labels),
            metrics_overflowed: counter!("courier.output.metrics_overflowed", &labels),
            write_errors: counter!("courier.output.write_errors", &labels),
            write_retries: counter!("courier.output.write_retries", &labels),
        }
    }

    /// Creates a `Telemetry` instance that records nothing.
    pub fn noop() -> Self {
        Self {
            metrics_written: Counter::noop(),
            metrics_rejected: Counter::noop(),
            metrics_overflowed: Counter::noop(),
            write_errors: Counter::noop(),
            write_retries: Counter::noop(),
        }
    }

    /// Tracks a batch that was written.
    pub fn track_write_succeeded(&self, batch_len: usize) {
        self.metrics_written.increment(batch_len as u64);
    }

    /// Tracks a failed write attempt that will be retried.
    pub fn track_write_retried(&self) {
        self.write_errors.increment(1);
        self.write_retries.increment(1);
    }

    /// Tracks a batch that was given up on.
    pub fn track_write_failed(&self, batch_len: usize) {
        self.write_errors.increment(1);
        self.metrics_rejected.increment(batch_len as u64);
    }

    /// Tracks a metric rejected because the output buffer was full.
    pub fn track_overflow(&self) {
        self.metrics_overflowed.increment(1);
        self.metrics_rejected.increment(1);
    }

    /// Tracks a metric rejected because the output was no longer running.
    pub fn track_closed(&self) {
        self.metrics_rejected.increment(1);
    }
}
