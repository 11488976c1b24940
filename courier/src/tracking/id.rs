use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Identifier of a single logical delivery unit.
///
/// Identifiers are issued by an [`IdAllocator`] and are unique, and increasing, for the lifetime of
/// that allocator.  They carry no meaning across process restarts.  Zero is never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingId(u64);

impl TrackingId {
    /// Raw value of this identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TrackingId> for u64 {
    fn from(id: TrackingId) -> u64 {
        id.0
    }
}

/// Issues monotonically increasing tracking identifiers.
///
/// The first identifier issued is `1`.  Allocation is a single atomic increment.  Exhausting the
/// 64-bit identifier space is not reachable in practice, so the counter simply wraps, skipping
/// the reserved zero value.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicU64,
}

impl IdAllocator {
    /// Creates a new `IdAllocator`.
    pub const fn new() -> Self {
        IdAllocator { last: AtomicU64::new(0) }
    }

    /// Issues the next identifier.
    pub fn next_id(&self) -> TrackingId {
        loop {
            let id = self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if id != 0 {
                return TrackingId(id);
            }
        }
    }

    /// The most recently issued identifier, if any.
    pub fn last_id(&self) -> Option<TrackingId> {
        match self.last.load(Ordering::Relaxed) {
            0 => None,
            id => Some(TrackingId(id)),
        }
    }
}
