//! Layers are composable helpers that can be "layered" on top of an existing [`Stage`] to alter
//! what reaches it, without having to change the stage itself.
//!
//! [`Stack`] can be used to compose multiple layers together.
//!
//! Here's an example of a layer that drops every metric without any fields:
//!
//! ```rust
//! # use courier::TrackedMetric;
//! # use courier_util::{Discard, Stage};
//! # use courier_util::layers::{Layer, Stack, PrefixLayer};
//! pub struct RequireFields<S>(S);
//!
//! impl<S: Stage> Stage for RequireFields<S> {
//!     fn process(&self, metric: TrackedMetric) {
//!         if metric.fields().is_empty() {
//!             metric.drop();
//!         } else {
//!             self.0.process(metric);
//!         }
//!     }
//! }
//!
//! pub struct RequireFieldsLayer;
//!
//! impl<S> Layer<S> for RequireFieldsLayer {
//!     type Output = RequireFields<S>;
//!
//!     fn layer(&self, inner: S) -> Self::Output {
//!         RequireFields(inner)
//!     }
//! }
//!
//! // Layers can be applied directly...
//! let stage = RequireFieldsLayer.layer(Discard);
//!
//! // ...but `Stack` makes it easy to chain them together.
//! let stage = Stack::new(Discard)
//!     .push(RequireFieldsLayer)
//!     .push(PrefixLayer::new("agent"));
//! ```
use courier::TrackedMetric;

use crate::Stage;

mod fanout;
pub use fanout::{Fanout, FanoutBuilder};

mod filter;
pub use filter::{Filter, FilterLayer};

mod prefix;
pub use prefix::{Prefix, PrefixLayer};

/// Decorates an object by wrapping it within another type.
pub trait Layer<S> {
    /// The output type after wrapping.
    type Output;

    /// Wraps `inner` based on this layer.
    fn layer(&self, inner: S) -> Self::Output;
}

/// Builder for composing layers together in a top-down/inside-out order.
///
/// The last layer pushed is the first one a metric goes through.
pub struct Stack<S> {
    inner: S,
}

impl<S> Stack<S> {
    /// Creates a new `Stack` around the given object.
    pub fn new(inner: S) -> Self {
        Stack { inner }
    }

    /// Pushes the given layer on to the stack, wrapping the existing stack.
    pub fn push<L: Layer<S>>(self, layer: L) -> Stack<L::Output> {
        Stack::new(layer.layer(self.inner))
    }

    /// Consumes the stack, returning the outermost wrapped object.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Stage> Stage for Stack<S> {
    fn process(&self, metric: TrackedMetric) {
        self.inner.process(metric);
    }

    fn process_batch(&self, metrics: Vec<TrackedMetric>) {
        self.inner.process_batch(metrics);
    }
}
