use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;

use super::{TrackingId, TrackingRecord};

/// Registry of in-flight delivery units.
///
/// Maps the identifier of every unit that still has live references to its record, for external
/// reporting and administration.  Delivery itself never depends on the registry: a unit completes
/// purely through its reference count, and removes its own entry as it does so.
///
/// Entries hold weak references.  If every handle to an incomplete unit is dropped without being
/// resolved, its record is freed but its entry stays behind, and is reported by
/// [`leaked`](TrackingRegistry::leaked) until cleared.
///
/// Cloning the registry is cheap, and clones share the same entries.
#[derive(Clone, Default)]
pub struct TrackingRegistry {
    entries: Arc<Mutex<HashMap<TrackingId, Weak<TrackingRecord>>>>,
}

impl TrackingRegistry {
    /// Creates an empty `TrackingRegistry`.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, id: TrackingId, record: &Arc<TrackingRecord>) {
        self.entries.lock().insert(id, Arc::downgrade(record));
    }

    pub(crate) fn unregister(&self, id: TrackingId) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    /// Looks up the record of an in-flight unit.
    ///
    /// Returns `None` if the unit has completed, was never registered, or was leaked.
    pub fn lookup(&self, id: TrackingId) -> Option<Arc<TrackingRecord>> {
        let entries = self.entries.lock();
        entries.get(&id).and_then(Weak::upgrade).filter(|record| !record.is_completed())
    }

    /// Number of registered units, including leaked ones.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no units are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Identifiers of every registered unit, including leaked ones, in ascending order.
    pub fn ids(&self) -> Vec<TrackingId> {
        let mut ids = self.entries.lock().keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Identifiers of units whose references were all dropped without being resolved, in
    /// ascending order.
    pub fn leaked(&self) -> Vec<TrackingId> {
        let mut ids = self
            .entries
            .lock()
            .iter()
            .filter(|(_, record)| record.strong_count() == 0)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Removes the entries of leaked units, returning how many were removed.
    pub fn clear_leaked(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, record| record.strong_count() > 0);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::TrackingRegistry;
    use crate::tracking::{DeliveryInfo, IdAllocator, TrackingRecord};
    use std::sync::Arc;

    fn record(ids: &IdAllocator, registry: &TrackingRegistry) -> Arc<TrackingRecord> {
        let id = ids.next_id();
        let record = Arc::new(TrackingRecord::new(
            id,
            1,
            Box::new(|_: DeliveryInfo| {}),
            Some(registry.clone()),
            false,
        ));
        registry.register(id, &record);
        record
    }

    #[test]
    fn test_register_lookup_unregister() {
        let ids = IdAllocator::new();
        let registry = TrackingRegistry::new();
        assert!(registry.is_empty());

        let first = record(&ids, &registry);
        let second = record(&ids, &registry);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec![first.id(), second.id()]);

        let found = registry.lookup(first.id()).expect("first should be registered");
        assert_eq!(found.id(), first.id());

        assert!(registry.unregister(first.id()));
        assert!(!registry.unregister(first.id()));
        assert!(registry.lookup(first.id()).is_none());
        assert_eq!(registry.ids(), vec![second.id()]);
    }

    #[test]
    fn test_completion_removes_entry() {
        let ids = IdAllocator::new();
        let registry = TrackingRegistry::new();
        let record = record(&ids, &registry);

        record.release();
        assert!(record.is_completed());
        assert!(registry.lookup(record.id()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_leaked_entries() {
        let ids = IdAllocator::new();
        let registry = TrackingRegistry::new();
        let live = record(&ids, &registry);
        let leaked_id = {
            let leaked = record(&ids, &registry);
            leaked.id()
        };

        assert_eq!(registry.leaked(), vec![leaked_id]);
        assert!(registry.lookup(leaked_id).is_none());
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.clear_leaked(), 1);
        assert!(registry.leaked().is_empty());
        assert_eq!(registry.ids(), vec![live.id()]);
    }
}
