//! Tracked delivery of metrics.
//!
//! A producer that needs to know whether a metric made it out of the pipeline, such as a queue
//! consumer that must not acknowledge a message until every sink has handled it, wraps the
//! metric, or the batch of metrics decoded from one message, with tracking.  Every wrapped metric,
//! and every copy made of it downstream, shares a single [`TrackingRecord`].  Each of them must be
//! resolved exactly once with [`accept`](TrackedMetric::accept),
//! [`reject`](TrackedMetric::reject) or [`drop`](TrackedMetric::drop).  When the last one is
//! resolved, the producer's [`DeliveryNotifier`] is invoked exactly once with a [`DeliveryInfo`]
//! summarizing the outcome.
//!
//! Accounting on the hot path is entirely atomic.  The only lock is the one guarding the
//! [`TrackingRegistry`], which is taken once when a unit is registered and once when it completes.
mod id;
pub use self::id::{IdAllocator, TrackingId};

mod record;
pub use self::record::TrackingRecord;

mod registry;
pub use self::registry::TrackingRegistry;

mod tracked;
pub use self::tracked::TrackedMetric;

mod tracker;
pub use self::tracker::{IncompleteDeliveries, Tracker, TrackerBuilder};

/// Outcome of a tracked delivery unit.
///
/// Produced exactly once per unit, at the moment its last reference is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeliveryInfo {
    id: TrackingId,
    accepted: u64,
    rejected: u64,
}

impl DeliveryInfo {
    pub(crate) fn new(id: TrackingId, accepted: u64, rejected: u64) -> Self {
        DeliveryInfo { id, accepted, rejected }
    }

    /// Identifier of the unit this outcome is for.
    pub fn id(&self) -> TrackingId {
        self.id
    }

    /// Returns `true` if no reference to the unit was rejected.
    ///
    /// Dropped references are not rejections, so a unit whose references were all dropped is
    /// considered delivered.
    pub fn delivered(&self) -> bool {
        self.rejected == 0
    }

    /// Number of references that were accepted.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Number of references that were rejected.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

/// Receives the outcome of a tracked delivery unit.
///
/// `notify` runs on whichever pipeline thread resolves the last reference, so it must not block
/// for long.  No lock is held while it runs: the unit has already left the registry, and other
/// units may be tracked or resolved from within the call.  Implementations typically hand the
/// outcome off to a channel or queue and return.
///
/// Any `Fn(DeliveryInfo) + Send + Sync` closure is a notifier.
pub trait DeliveryNotifier: Send + Sync {
    /// Handles the outcome of a delivery unit.
    fn notify(&self, info: DeliveryInfo);
}

impl<F> DeliveryNotifier for F
where
    F: Fn(DeliveryInfo) + Send + Sync,
{
    fn notify(&self, info: DeliveryInfo) {
        (self)(info)
    }
}
