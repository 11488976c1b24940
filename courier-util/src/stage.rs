use std::sync::Arc;

use courier::TrackedMetric;

/// A step of a metric pipeline.
///
/// A stage takes ownership of every metric handed to it, and must either pass it on to another
/// stage or resolve it.  Stages that need to send a metric down more than one path use
/// [`TrackedMetric::copy`] for every extra path.
pub trait Stage: Send + Sync {
    /// Processes a single metric.
    fn process(&self, metric: TrackedMetric);

    /// Processes a batch of metrics.
    fn process_batch(&self, metrics: Vec<TrackedMetric>) {
        for metric in metrics {
            self.process(metric);
        }
    }
}

impl<S> Stage for Arc<S>
where
    S: Stage + ?Sized,
{
    fn process(&self, metric: TrackedMetric) {
        (**self).process(metric)
    }

    fn process_batch(&self, metrics: Vec<TrackedMetric>) {
        (**self).process_batch(metrics)
    }
}

impl<S> Stage for Box<S>
where
    S: Stage + ?Sized,
{
    fn process(&self, metric: TrackedMetric) {
        (**self).process(metric)
    }

    fn process_batch(&self, metrics: Vec<TrackedMetric>) {
        (**self).process_batch(metrics)
    }
}

/// A stage that drops every metric.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discard;

impl Stage for Discard {
    fn process(&self, metric: TrackedMetric) {
        metric.drop();
    }
}
