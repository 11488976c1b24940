//! Pipeline building blocks for `courier`.
//!
//! Everything here moves [`TrackedMetric`](courier::TrackedMetric)s around while keeping their
//! delivery accounting intact: every metric handed to a [`Stage`] is eventually passed on, copied
//! or resolved, so producers are always notified.
//!
//! - [`layers`] wraps stages to filter, rename or fan out metrics
//! - [`RunningOutput`] batches metrics to an [`Output`] on a background thread
//! - [`debugging`] has sinks for tests
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod stage;
pub use stage::{Discard, Stage};

pub mod debugging;
pub mod layers;

mod output;
pub use output::{BuildError, Output, OutputBuilder, RunningOutput, WriteError};

mod telemetry;

#[cfg(test)]
mod test_util;
