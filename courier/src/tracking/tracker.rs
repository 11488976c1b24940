use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use super::{
    DeliveryNotifier, IdAllocator, TrackedMetric, TrackingId, TrackingRecord, TrackingRegistry,
};
use crate::Metric;

/// Delivery units that have not completed.
///
/// Returned by [`Tracker::ensure_completed`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{} delivery unit(s) still in flight, {} leaked", .in_flight.len(), .leaked.len())]
pub struct IncompleteDeliveries {
    /// Units with references that are still live.
    pub in_flight: Vec<TrackingId>,

    /// Units whose references were all dropped without being resolved.
    pub leaked: Vec<TrackingId>,
}

struct Inner {
    ids: IdAllocator,
    registry: Option<TrackingRegistry>,
    warn_on_leak: bool,
}

/// Entry point for producers of tracked metrics.
///
/// A `Tracker` owns its own identifier space and registry, so independent pipelines, or tests,
/// never observe each other's delivery units.  Cloning a tracker is cheap, and clones share state.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl Tracker {
    /// Creates a `Tracker` with the default configuration.
    pub fn new() -> Self {
        TrackerBuilder::default().build()
    }

    /// Creates a builder for configuring a `Tracker`.
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::default()
    }

    /// Wraps a single metric with tracking.
    ///
    /// `notify` is invoked exactly once, when the returned metric and every copy made of it have
    /// been resolved.
    pub fn track<N>(&self, metric: Metric, notify: N) -> (TrackedMetric, TrackingId)
    where
        N: DeliveryNotifier + 'static,
    {
        let record = self.new_record(1, Box::new(notify));
        let id = record.id();
        (TrackedMetric::new(metric, record), id)
    }

    /// Wraps a group of metrics with tracking, as a single delivery unit.
    ///
    /// Used when one input event produces many metrics: `notify` is invoked exactly once, when
    /// every returned metric and every copy made of them have been resolved.  If `metrics` is
    /// empty, `notify` is invoked before this method returns, reporting the unit as delivered.
    pub fn track_group<I, N>(&self, metrics: I, notify: N) -> (Vec<TrackedMetric>, TrackingId)
    where
        I: IntoIterator<Item = Metric>,
        N: DeliveryNotifier + 'static,
    {
        let metrics = metrics.into_iter().collect::<Vec<_>>();
        let record = self.new_record(metrics.len(), Box::new(notify));
        let id = record.id();

        if metrics.is_empty() {
            record.complete();
            return (Vec::new(), id);
        }

        let tracked =
            metrics.into_iter().map(|m| TrackedMetric::new(m, Arc::clone(&record))).collect();
        (tracked, id)
    }

    /// The registry of in-flight units, if enabled.
    pub fn registry(&self) -> Option<&TrackingRegistry> {
        self.inner.registry.as_ref()
    }

    /// Looks up the record of an in-flight unit.
    ///
    /// Always returns `None` if the registry is disabled.
    pub fn lookup(&self, id: TrackingId) -> Option<Arc<TrackingRecord>> {
        self.inner.registry.as_ref().and_then(|registry| registry.lookup(id))
    }

    /// Number of registered units that have not completed, including leaked ones.
    ///
    /// Always zero if the registry is disabled.
    pub fn in_flight(&self) -> usize {
        self.inner.registry.as_ref().map_or(0, TrackingRegistry::len)
    }

    /// Checks that every unit tracked so far has completed.
    ///
    /// Intended for tests and supervisory tasks that want to catch leaked references.  Requires
    /// the registry: if it is disabled, this always succeeds.
    ///
    /// # Errors
    ///
    /// If any unit is still in flight, or was leaked, an error listing them is returned.
    pub fn ensure_completed(&self) -> Result<(), IncompleteDeliveries> {
        let registry = match &self.inner.registry {
            Some(registry) => registry,
            None => return Ok(()),
        };

        let leaked = registry.leaked();
        let in_flight = registry
            .ids()
            .into_iter()
            .filter(|id| leaked.binary_search(id).is_err())
            .collect::<Vec<_>>();

        if in_flight.is_empty() && leaked.is_empty() {
            Ok(())
        } else {
            Err(IncompleteDeliveries { in_flight, leaked })
        }
    }

    fn new_record(&self, refs: usize, notifier: Box<dyn DeliveryNotifier>) -> Arc<TrackingRecord> {
        let id = self.inner.ids.next_id();
        let record = Arc::new(TrackingRecord::new(
            id,
            refs,
            notifier,
            self.inner.registry.clone(),
            self.inner.warn_on_leak,
        ));

        // Empty groups complete immediately and are never visible in the registry.
        if refs > 0 {
            if let Some(registry) = &self.inner.registry {
                registry.register(id, &record);
            }
        }

        trace!(tracking_id = id.get(), refs, "Tracking new delivery unit.");
        record
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Tracker::new()
    }
}

/// Builder for a [`Tracker`].
pub struct TrackerBuilder {
    registry: bool,
    warn_on_leak: bool,
}

impl TrackerBuilder {
    /// Sets whether or not to maintain a registry of in-flight units.
    ///
    /// The registry powers [`Tracker::lookup`], [`Tracker::in_flight`] and
    /// [`Tracker::ensure_completed`].  Delivery tracking works the same without it, and skips a
    /// lock acquisition when each unit is created and completed.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_registry(mut self, registry: bool) -> Self {
        self.registry = registry;
        self
    }

    /// Sets whether or not to log a warning when a unit is freed without having completed.
    ///
    /// This happens when every handle to a tracked metric of the unit is dropped without being
    /// resolved, and means its producer will never be notified.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_leak_warnings(mut self, warn_on_leak: bool) -> Self {
        self.warn_on_leak = warn_on_leak;
        self
    }

    /// Builds the tracker.
    pub fn build(self) -> Tracker {
        Tracker {
            inner: Arc::new(Inner {
                ids: IdAllocator::new(),
                registry: self.registry.then(TrackingRegistry::new),
                warn_on_leak: self.warn_on_leak,
            }),
        }
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        TrackerBuilder { registry: true, warn_on_leak: true }
    }
}
