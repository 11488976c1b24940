//! Tracked delivery of telemetry metrics.
//!
//! A telemetry agent pulls or receives measurements from many sources, passes them through
//! optional transformation stages, and writes them to many sinks concurrently.  Some producers
//! need to know what became of what they produced: a message-queue consumer must not commit its
//! offset until the metrics decoded from a message have been written, and must redeliver them if
//! any sink failed.
//!
//! `courier` provides the plain [`Metric`] value that flows through such a pipeline, and the
//! tracked-delivery machinery that reports back to producers.
//!
//! # Overview
//!
//! A producer wraps a metric (or every metric decoded from one input event) using a
//! [`Tracker`], supplying a [`DeliveryNotifier`].  The resulting [`TrackedMetric`]s travel through
//! the pipeline, where stages may:
//!
//! - read and modify the underlying metric, as `TrackedMetric` dereferences to [`Metric`]
//! - [`copy`](TrackedMetric::copy) it, to send it down more than one path
//! - [`accept`](TrackedMetric::accept) it, when a sink has written it
//! - [`reject`](TrackedMetric::reject) it, when a sink has definitively failed to write it
//! - [`drop`](TrackedMetric::drop) it, when a stage discards it
//!
//! Once every tracked metric of a unit, including every copy, has been resolved, the notifier is
//! invoked exactly once with a [`DeliveryInfo`].
//!
//! # Example
//!
//! ```rust
//! use courier::{DeliveryInfo, Metric, Tracker};
//! use std::{sync::mpsc, time::SystemTime};
//!
//! let (tx, rx) = mpsc::channel();
//! let tracker = Tracker::new();
//!
//! let metric = Metric::new("cpu", SystemTime::now()).with_field("usage_idle", 97.5);
//! let (tracked, id) = tracker.track(metric, move |info: DeliveryInfo| {
//!     let _ = tx.send(info);
//! });
//!
//! // Send the metric to two sinks: one of them writes it, the other one fails.
//! let copy = tracked.copy();
//! tracked.accept();
//! copy.reject();
//!
//! let info = rx.recv().unwrap();
//! assert_eq!(info.id(), id);
//! assert!(!info.delivered());
//! assert_eq!((info.accepted(), info.rejected()), (1, 1));
//! ```
//!
//! # Programming errors
//!
//! Resolving a tracked metric consumes it, so a single handle can't be resolved twice.  If the
//! reference count of a unit is nonetheless driven below zero, the resolving call panics: the
//! outcome of that unit can no longer be trusted.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod metric;
pub use self::metric::{FieldValue, IntoTags, Metric, MetricKind, SharedString, Tag};

pub mod tracking;
pub use self::tracking::{
    DeliveryInfo, DeliveryNotifier, IncompleteDeliveries, TrackedMetric, Tracker, TrackerBuilder,
    TrackingId,
};
