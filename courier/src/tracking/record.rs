use std::{
    fmt,
    sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
};

use tracing::{trace, warn};

use super::{DeliveryInfo, DeliveryNotifier, TrackingId, TrackingRegistry};

/// Shared delivery state of one tracked unit.
///
/// A record is shared by every [`TrackedMetric`](super::TrackedMetric) of the unit, including
/// copies made downstream.  It counts the references that are still live, how many of the resolved
/// ones were accepted or rejected, and fires the unit's notifier when the live count reaches zero.
///
/// The counters can be read at any time for diagnostics.
pub struct TrackingRecord {
    id: TrackingId,
    refs: AtomicI64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicBool,
    notifier: Box<dyn DeliveryNotifier>,
    registry: Option<TrackingRegistry>,
    warn_on_leak: bool,
}

impl TrackingRecord {
    pub(crate) fn new(
        id: TrackingId,
        refs: usize,
        notifier: Box<dyn DeliveryNotifier>,
        registry: Option<TrackingRegistry>,
        warn_on_leak: bool,
    ) -> Self {
        TrackingRecord {
            id,
            refs: AtomicI64::new(refs as i64),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            completed: AtomicBool::new(false),
            notifier,
            registry,
            warn_on_leak,
        }
    }

    /// Identifier of the unit.
    pub fn id(&self) -> TrackingId {
        self.id
    }

    /// Number of references that are still live.
    pub fn ref_count(&self) -> i64 {
        self.refs.load(Ordering::Acquire)
    }

    /// Number of references accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Acquire)
    }

    /// Number of references rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Acquire)
    }

    /// Returns `true` once every reference has been resolved and the notifier has been invoked.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) fn increment_ref(&self) {
        // Callers hold a live reference, so the count can't be concurrently reaching zero.
        let previous = self.refs.fetch_add(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "copied a reference of a completed unit");
    }

    /// Decrements the live reference count, returning the new count.
    ///
    /// The counter updates of the resolving reference must happen before this call: the release
    /// half of the decrement publishes them to whichever thread observes zero.
    pub(crate) fn decrement_ref(&self) -> i64 {
        self.refs.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub(crate) fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Releases one reference, completing the unit if it was the last one.
    ///
    /// # Panics
    ///
    /// Panics if the reference count goes negative, which means a reference was resolved twice or
    /// was never counted.  The accounting of the unit is corrupt at that point.
    pub(crate) fn release(&self) {
        let remaining = self.decrement_ref();
        if remaining < 0 {
            panic!("negative reference count ({}) for tracking id {}", remaining, self.id);
        }

        if remaining == 0 {
            self.complete();
        }
    }

    /// Marks the unit as completed and invokes its notifier.
    ///
    /// Only reachable from the single decrement that observed zero, or directly for an empty
    /// group, which never had any references.
    pub(crate) fn complete(&self) {
        self.completed.store(true, Ordering::Release);

        // Unregister before notifying: the entry must be gone even if the notifier panics.
        if let Some(registry) = &self.registry {
            registry.unregister(self.id);
        }

        let info = self.delivery_info();
        trace!(
            tracking_id = self.id.get(),
            accepted = info.accepted(),
            rejected = info.rejected(),
            "Delivery unit completed."
        );
        self.notifier.notify(info);
    }

    fn delivery_info(&self) -> DeliveryInfo {
        DeliveryInfo::new(
            self.id,
            self.accepted.load(Ordering::Acquire),
            self.rejected.load(Ordering::Acquire),
        )
    }
}

impl Drop for TrackingRecord {
    fn drop(&mut self) {
        if self.warn_on_leak && !*self.completed.get_mut() {
            warn!(
                tracking_id = self.id.get(),
                refs = *self.refs.get_mut(),
                accepted = *self.accepted.get_mut(),
                rejected = *self.rejected.get_mut(),
                "Tracked metric dropped without being resolved. Delivery will never be reported."
            );
        }
    }
}

impl fmt::Debug for TrackingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingRecord")
            .field("id", &self.id)
            .field("refs", &self.ref_count())
            .field("accepted", &self.accepted())
            .field("rejected", &self.rejected())
            .field("completed", &self.is_completed())
            .finish()
    }
}
