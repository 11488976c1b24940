//! Running outputs: batching metrics to a sink on a background thread.
//!
//! An [`Output`] knows how to write a batch of metrics somewhere.  Wrapping it with
//! [`OutputBuilder::build`] yields a [`RunningOutput`], a [`Stage`](crate::Stage) that buffers
//! incoming metrics and hands them to the output in batches from a dedicated thread.  The running
//! output owns delivery accounting: every metric written is accepted, every metric given up on is
//! rejected, and metrics are never resolved while a write is still being retried.
use std::time::Duration;

use courier::{SharedString, TrackedMetric};
use thiserror::Error;

mod running;
pub use self::running::RunningOutput;

const DEFAULT_BATCH_SIZE: usize = 1000;
const DEFAULT_BUFFER_LIMIT: usize = 10_000;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Errors that could occur while writing a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The write failed but may succeed if retried, such as when a connection was reset.
    #[error("transient write failure: {reason}")]
    Transient {
        /// Details about the failure.
        reason: String,
    },

    /// The write failed and will not succeed if retried, such as when the batch was refused.
    #[error("permanent write failure: {reason}")]
    Permanent {
        /// Details about the failure.
        reason: String,
    },
}

impl WriteError {
    /// Creates a transient error.
    pub fn transient<R: Into<String>>(reason: R) -> Self {
        WriteError::Transient { reason: reason.into() }
    }

    /// Creates a permanent error.
    pub fn permanent<R: Into<String>>(reason: R) -> Self {
        WriteError::Permanent { reason: reason.into() }
    }

    /// Returns `true` if the write may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, WriteError::Transient { .. })
    }
}

/// Errors that could occur while building a running output.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The batch size was zero.
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,

    /// The buffer limit was zero.
    #[error("buffer limit must be greater than zero")]
    InvalidBufferLimit,

    /// Failed to spawn the background thread.
    #[error("failed to spawn background thread for output '{name}'")]
    Backend {
        /// Name of the output.
        name: String,
    },
}

/// A destination for metrics.
///
/// Implementations only write: resolving the tracked metrics of a batch is up to the
/// [`RunningOutput`] driving them, based on the returned result.
pub trait Output: Send + 'static {
    /// Writes a batch of metrics.
    ///
    /// # Errors
    ///
    /// If the batch could not be written, an error is returned indicating whether or not writing
    /// it again may succeed.
    fn write(&mut self, batch: &[TrackedMetric]) -> Result<(), WriteError>;
}

/// Builder for a [`RunningOutput`].
pub struct OutputBuilder {
    name: SharedString,
    batch_size: usize,
    buffer_limit: usize,
    flush_interval: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    telemetry: bool,
}

impl OutputBuilder {
    /// Creates a builder for an output with the given name.
    ///
    /// The name identifies the output in logs and telemetry.
    pub fn new<N: Into<SharedString>>(name: N) -> Self {
        OutputBuilder { name: name.into(), ..Default::default() }
    }

    /// Set the maximum number of metrics written in a single batch.
    ///
    /// A batch is written as soon as it is full, or when the flush interval elapses, whichever
    /// comes first.
    ///
    /// Defaults to 1,000.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the maximum number of metrics waiting to be written.
    ///
    /// When the buffer is full, incoming metrics are rejected straight away.
    ///
    /// Defaults to 10,000.
    #[must_use]
    pub fn with_buffer_limit(mut self, buffer_limit: usize) -> Self {
        self.buffer_limit = buffer_limit;
        self
    }

    /// Set the interval at which partial batches are written.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Set how many times a batch is retried after a transient write failure.
    ///
    /// Once retries are exhausted, every metric of the batch is rejected.  Permanent failures are
    /// never retried.
    ///
    /// Defaults to 3.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff between retries.
    ///
    /// The wait before the `n`th retry is `n` times this value.
    ///
    /// Defaults to 100 milliseconds.
    #[must_use]
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Sets whether or not to emit telemetry for the output.
    ///
    /// When enabled, counters of metrics written, rejected and overflowed, and of write errors and
    /// retries, are emitted through the globally installed `metrics` recorder, or the local one
    /// if one is set when building.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Builds the running output, spawning its background thread.
    ///
    /// # Errors
    ///
    /// If the batch size or buffer limit is zero, or the background thread could not be spawned,
    /// an error will be returned.
    pub fn build<O: Output>(self, output: O) -> Result<RunningOutput, BuildError> {
        if self.batch_size == 0 {
            return Err(BuildError::InvalidBatchSize);
        }
        if self.buffer_limit == 0 {
            return Err(BuildError::InvalidBufferLimit);
        }

        RunningOutput::spawn(self, output)
    }
}

impl Default for OutputBuilder {
    fn default() -> Self {
        OutputBuilder {
            name: SharedString::Borrowed("output"),
            batch_size: DEFAULT_BATCH_SIZE,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            telemetry: true,
        }
    }
}
