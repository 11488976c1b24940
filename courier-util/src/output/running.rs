use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    thread::{self, sleep, JoinHandle},
    time::{Duration, Instant},
};

use courier::{SharedString, TrackedMetric};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, trace, warn};

use super::{BuildError, Output, OutputBuilder, WriteError};
use crate::{telemetry::Telemetry, Stage};

/// An [`Output`] being driven on a background thread.
///
/// Metrics processed by a running output are buffered, and written out by the background thread
/// in batches.  Each metric is resolved once the output is done with its batch: accepted if the
/// batch was written, rejected if writing it failed for good.  When the buffer is full, incoming
/// metrics are rejected immediately.
///
/// Call [`close`](RunningOutput::close) to write out everything still buffered and wait for the
/// background thread to finish.  Dropping a running output also writes out the buffer, but
/// without waiting for it.
pub struct RunningOutput {
    name: SharedString,
    sender: Option<Sender<TrackedMetric>>,
    handle: Option<JoinHandle<()>>,
    telemetry: Telemetry,
}

impl RunningOutput {
    pub(super) fn spawn<O: Output>(builder: OutputBuilder, output: O) -> Result<Self, BuildError> {
        let telemetry = if builder.telemetry {
            Telemetry::new(builder.name.as_ref())
        } else {
            Telemetry::noop()
        };

        let (sender, receiver) = bounded(builder.buffer_limit);
        let worker = Worker {
            name: builder.name.clone(),
            output,
            receiver,
            batch_size: builder.batch_size,
            flush_interval: builder.flush_interval,
            max_retries: builder.max_retries,
            retry_backoff: builder.retry_backoff,
            telemetry: telemetry.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("courier-output-{}", builder.name))
            .spawn(move || worker.run())
            .map_err(|e| {
                error!(output = &*builder.name, error = %e, "Failed to spawn output thread.");
                BuildError::Backend { name: builder.name.to_string() }
            })?;

        debug!(
            output = &*builder.name,
            batch_size = builder.batch_size,
            buffer_limit = builder.buffer_limit,
            "Started output."
        );

        Ok(RunningOutput {
            name: builder.name,
            sender: Some(sender),
            handle: Some(handle),
            telemetry,
        })
    }

    /// Name of the output.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Number of metrics buffered and waiting to be written.
    pub fn buffered(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Closes the output.
    ///
    /// Stops taking in metrics, writes out everything still buffered and waits for the background
    /// thread to finish.  Every metric handed to the output is resolved by the time this returns.
    /// A panicking output fails the batch it was writing, like a permanent write error.
    pub fn close(mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(output = self.name(), "Output thread panicked before draining its buffer.");
            }
        }
    }
}

impl Stage for RunningOutput {
    fn process(&self, metric: TrackedMetric) {
        let result = match &self.sender {
            Some(sender) => sender.try_send(metric),
            None => Err(TrySendError::Disconnected(metric)),
        };

        match result {
            Ok(()) => {}
            Err(TrySendError::Full(metric)) => {
                warn!(
                    output = self.name(),
                    tracking_id = metric.tracking_id().get(),
                    "Output buffer full, rejecting metric."
                );
                self.telemetry.track_overflow();
                metric.reject();
            }
            Err(TrySendError::Disconnected(metric)) => {
                error!(
                    output = self.name(),
                    tracking_id = metric.tracking_id().get(),
                    "Output is no longer running, rejecting metric."
                );
                self.telemetry.track_closed();
                metric.reject();
            }
        }
    }
}

impl Drop for RunningOutput {
    fn drop(&mut self) {
        // Disconnecting the channel lets the worker drain what's left and exit on its own.
        self.sender.take();
    }
}

struct Worker<O> {
    name: SharedString,
    output: O,
    receiver: Receiver<TrackedMetric>,
    batch_size: usize,
    flush_interval: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    telemetry: Telemetry,
}

impl<O: Output> Worker<O> {
    fn run(mut self) {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut next_flush = Instant::now() + self.flush_interval;

        loop {
            let timeout = next_flush.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(timeout) {
                Ok(metric) => {
                    batch.push(metric);
                    if batch.len() >= self.batch_size {
                        self.flush(&mut batch);
                        next_flush = Instant::now() + self.flush_interval;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.flush(&mut batch);
                    next_flush = Instant::now() + self.flush_interval;
                }
                // Only reported once the buffer is empty.
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush(&mut batch);
                    break;
                }
            }
        }

        debug!(output = &*self.name, "Output stopped.");
    }

    fn flush(&mut self, batch: &mut Vec<TrackedMetric>) {
        if batch.is_empty() {
            return;
        }

        let batch_len = batch.len();
        match self.write_with_retries(batch) {
            Ok(()) => {
                trace!(output = &*self.name, batch_len, "Wrote batch.");
                self.telemetry.track_write_succeeded(batch_len);
                batch.drain(..).for_each(TrackedMetric::accept);
            }
            Err(e) => {
                error!(output = &*self.name, batch_len, error = %e, "Failed to write batch.");
                self.telemetry.track_write_failed(batch_len);
                batch.drain(..).for_each(TrackedMetric::reject);
            }
        }
    }

    fn write_with_retries(&mut self, batch: &[TrackedMetric]) -> Result<(), WriteError> {
        let mut attempt = 0;
        loop {
            let output = &mut self.output;
            let result = panic::catch_unwind(AssertUnwindSafe(|| output.write(batch)))
                .unwrap_or_else(|payload| Err(WriteError::permanent(panic_reason(&*payload))));

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.retry_backoff.saturating_mul(attempt);
                    warn!(
                        output = &*self.name,
                        attempt,
                        ?backoff,
                        error = %e,
                        "Failed to write batch, retrying."
                    );
                    self.telemetry.track_write_retried();
                    sleep(backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("output panicked: {}", message)
}
