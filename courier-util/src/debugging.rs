//! Stages for debugging and testing pipelines.
use std::sync::{Arc, Mutex};

use courier::{Metric, TrackedMetric, TrackingId};

use crate::Stage;

type Received = Arc<Mutex<Vec<(TrackingId, Metric)>>>;

/// How a [`DebuggingSink`] resolves the metrics it receives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
    /// Accept every metric.
    #[default]
    Accept,
    /// Reject every metric.
    Reject,
    /// Drop every metric.
    Drop,
}

/// Captures point-in-time snapshots of a [`DebuggingSink`].
#[derive(Clone)]
pub struct Snapshotter {
    received: Received,
}

impl Snapshotter {
    /// Takes a snapshot of every metric received so far, in order of arrival, along with the
    /// delivery unit it belonged to.
    pub fn snapshot(&self) -> Vec<(TrackingId, Metric)> {
        self.received.lock().expect("received lock poisoned").clone()
    }

    /// Number of metrics received so far.
    pub fn len(&self) -> usize {
        self.received.lock().expect("received lock poisoned").len()
    }

    /// Returns `true` if no metrics were received yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A simplistic sink that can be used for debugging or testing.
///
/// Records a copy of the plain value of every metric it receives, then resolves the metric as
/// configured.  Callers can take snapshots of what was received at any time.
pub struct DebuggingSink {
    resolution: Resolution,
    received: Received,
}

impl DebuggingSink {
    /// Creates a new `DebuggingSink` that accepts every metric.
    pub fn new() -> DebuggingSink {
        Self::with_resolution(Resolution::Accept)
    }

    /// Creates a new `DebuggingSink` that resolves every metric with the given resolution.
    pub fn with_resolution(resolution: Resolution) -> DebuggingSink {
        DebuggingSink { resolution, received: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Gets a `Snapshotter` attached to this sink.
    pub fn snapshotter(&self) -> Snapshotter {
        Snapshotter { received: Arc::clone(&self.received) }
    }
}

impl Default for DebuggingSink {
    fn default() -> Self {
        DebuggingSink::new()
    }
}

impl Stage for DebuggingSink {
    fn process(&self, metric: TrackedMetric) {
        self.received
            .lock()
            .expect("received lock poisoned")
            .push((metric.tracking_id(), metric.inner().clone()));

        match self.resolution {
            Resolution::Accept => metric.accept(),
            Resolution::Reject => metric.reject(),
            Resolution::Drop => metric.drop(),
        }
    }
}
