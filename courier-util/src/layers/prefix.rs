use courier::{SharedString, TrackedMetric};

use crate::{layers::Layer, Stage};

/// Applies a prefix to every metric name.
///
/// Names will be prefixed in the format of `<prefix>.<remaining>`.
pub struct Prefix<S> {
    prefix: SharedString,
    inner: S,
}

impl<S: Stage> Stage for Prefix<S> {
    fn process(&self, mut metric: TrackedMetric) {
        let mut new_name = String::with_capacity(self.prefix.len() + 1 + metric.name().len());
        new_name.push_str(self.prefix.as_ref());
        new_name.push('.');
        new_name.push_str(metric.name());
        metric.set_name(new_name);

        self.inner.process(metric)
    }
}

/// A layer for applying a prefix to every metric name.
///
/// More information on the behavior of the layer can be found in [`Prefix`].
pub struct PrefixLayer(SharedString);

impl PrefixLayer {
    /// Creates a new `PrefixLayer` based on the given prefix.
    pub fn new<P: Into<SharedString>>(prefix: P) -> PrefixLayer {
        PrefixLayer(prefix.into())
    }
}

impl<S> Layer<S> for PrefixLayer {
    type Output = Prefix<S>;

    fn layer(&self, inner: S) -> Self::Output {
        Prefix { prefix: self.0.clone(), inner }
    }
}
