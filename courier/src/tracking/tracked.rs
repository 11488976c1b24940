use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use super::{TrackingId, TrackingRecord};
use crate::Metric;

/// A metric whose delivery is reported back to its producer.
///
/// `TrackedMetric` dereferences to the underlying [`Metric`], so stages that don't care about
/// delivery can read and modify it like any other metric.  Stages that do care resolve it with
/// exactly one of [`accept`](TrackedMetric::accept), [`reject`](TrackedMetric::reject) or
/// [`drop`](TrackedMetric::drop), each of which consumes the metric.  A stage that needs to send
/// the metric down more than one path calls [`copy`](TrackedMetric::copy) once per extra path; each
/// copy must be resolved on its own.
///
/// Letting a tracked metric go out of scope without resolving it leaks its reference: the unit it
/// belongs to never completes and its producer is never notified.
#[must_use = "tracked metrics must be resolved with `accept`, `reject` or `drop`"]
pub struct TrackedMetric {
    metric: Metric,
    record: Arc<TrackingRecord>,
}

impl TrackedMetric {
    pub(crate) fn new(metric: Metric, record: Arc<TrackingRecord>) -> Self {
        TrackedMetric { metric, record }
    }

    /// Identifier of the delivery unit this metric belongs to.
    pub fn tracking_id(&self) -> TrackingId {
        self.record.id()
    }

    /// Shared delivery state of the unit this metric belongs to.
    pub fn tracking_data(&self) -> &Arc<TrackingRecord> {
        &self.record
    }

    /// The underlying metric.
    pub fn inner(&self) -> &Metric {
        &self.metric
    }

    /// The underlying metric, mutably.
    pub fn inner_mut(&mut self) -> &mut Metric {
        &mut self.metric
    }

    /// Creates an independently resolvable copy of this metric.
    ///
    /// The copy holds a deep copy of the underlying metric, and shares the delivery unit of this
    /// one.
    pub fn copy(&self) -> TrackedMetric {
        self.record.increment_ref();
        TrackedMetric { metric: self.metric.clone(), record: Arc::clone(&self.record) }
    }

    /// Resolves this metric as successfully delivered.
    pub fn accept(self) {
        self.record.record_accept();
        self.record.release();
    }

    /// Resolves this metric as definitively failed to be delivered.
    ///
    /// Sinks that retry must not reject until they have given up retrying.
    pub fn reject(self) {
        self.record.record_reject();
        self.record.release();
    }

    /// Resolves this metric as discarded.
    ///
    /// Dropping is neither a success nor a failure: it only releases the reference, and a unit
    /// whose references were all dropped is reported as delivered.
    pub fn drop(self) {
        self.record.release();
    }
}

impl Deref for TrackedMetric {
    type Target = Metric;

    fn deref(&self) -> &Metric {
        &self.metric
    }
}

impl DerefMut for TrackedMetric {
    fn deref_mut(&mut self) -> &mut Metric {
        &mut self.metric
    }
}

impl fmt::Debug for TrackedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedMetric")
            .field("tracking_id", &self.record.id())
            .field("metric", &self.metric)
            .finish()
    }
}
