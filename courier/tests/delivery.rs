use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier, Mutex,
    },
    thread,
    time::SystemTime,
};

use courier::{DeliveryInfo, Metric, TrackedMetric, Tracker};
use proptest::{collection::vec, prelude::*};
use rand::seq::SliceRandom;

#[derive(Clone, Copy, Debug)]
enum Resolution {
    Accept,
    Reject,
    Drop,
}

impl Resolution {
    fn apply(self, metric: TrackedMetric) {
        match self {
            Resolution::Accept => metric.accept(),
            Resolution::Reject => metric.reject(),
            Resolution::Drop => metric.drop(),
        }
    }
}

fn resolution() -> impl Strategy<Value = Resolution> {
    prop_oneof![Just(Resolution::Accept), Just(Resolution::Reject), Just(Resolution::Drop)]
}

fn batch(n: usize) -> Vec<Metric> {
    (0..n)
        .map(|i| {
            Metric::new("kafka_consumer", SystemTime::now())
                .with_tag("partition", (i % 4).to_string())
                .with_field("offset", i as u64)
        })
        .collect()
}

#[derive(Default)]
struct Outcomes {
    infos: Mutex<Vec<DeliveryInfo>>,
}

impl Outcomes {
    fn notifier(self: &Arc<Self>) -> impl Fn(DeliveryInfo) + Send + Sync + 'static {
        let outcomes = Arc::clone(self);
        move |info| outcomes.infos.lock().unwrap().push(info)
    }

    fn take(&self) -> Vec<DeliveryInfo> {
        std::mem::take(&mut *self.infos.lock().unwrap())
    }
}

proptest! {
    #[test]
    fn group_notifies_once_with_resolution_counts(resolutions in vec(resolution(), 0..64)) {
        let tracker = Tracker::new();
        let outcomes = Arc::new(Outcomes::default());
        let (tracked, id) = tracker.track_group(batch(resolutions.len()), outcomes.notifier());
        prop_assert_eq!(tracked.len(), resolutions.len());

        for (metric, resolution) in tracked.into_iter().zip(resolutions.iter()) {
            resolution.apply(metric);
        }

        let accepted = resolutions.iter().filter(|r| matches!(r, Resolution::Accept)).count();
        let rejected = resolutions.iter().filter(|r| matches!(r, Resolution::Reject)).count();

        let infos = outcomes.take();
        prop_assert_eq!(infos.len(), 1);
        prop_assert_eq!(infos[0].id(), id);
        prop_assert_eq!(infos[0].accepted(), accepted as u64);
        prop_assert_eq!(infos[0].rejected(), rejected as u64);
        prop_assert_eq!(infos[0].delivered(), rejected == 0);
        prop_assert!(tracker.ensure_completed().is_ok());
    }

    #[test]
    fn copies_count_towards_completion(
        copies in 0usize..16,
        resolutions in vec(resolution(), 17),
    ) {
        let tracker = Tracker::new();
        let outcomes = Arc::new(Outcomes::default());
        let (original, id) = tracker.track(batch(1).remove(0), outcomes.notifier());

        let mut all = (0..copies).map(|_| original.copy()).collect::<Vec<_>>();
        all.push(original);
        prop_assert_eq!(tracker.lookup(id).map(|r| r.ref_count()), Some(copies as i64 + 1));

        let used = &resolutions[..all.len()];
        for (metric, resolution) in all.into_iter().zip(used.iter()) {
            prop_assert!(outcomes.take().is_empty());
            resolution.apply(metric);
        }

        let infos = outcomes.take();
        prop_assert_eq!(infos.len(), 1);
        let rejected = used.iter().filter(|r| matches!(r, Resolution::Reject)).count();
        prop_assert_eq!(infos[0].rejected(), rejected as u64);
        prop_assert!(tracker.lookup(id).is_none());
    }
}

#[test]
fn single_accept_reject_and_drop() {
    let tracker = Tracker::new();
    let outcomes = Arc::new(Outcomes::default());

    let (m, _) = tracker.track(batch(1).remove(0), outcomes.notifier());
    m.accept();
    let (m, _) = tracker.track(batch(1).remove(0), outcomes.notifier());
    m.reject();
    let (m, _) = tracker.track(batch(1).remove(0), outcomes.notifier());
    m.drop();

    let summary = outcomes
        .take()
        .iter()
        .map(|info| (info.delivered(), info.accepted(), info.rejected()))
        .collect::<Vec<_>>();
    assert_eq!(summary, vec![(true, 1, 0), (false, 0, 1), (true, 0, 0)]);
}

#[test]
fn ids_increase_per_tracker() {
    let tracker = Tracker::new();
    let (a, first) = tracker.track(batch(1).remove(0), |_: DeliveryInfo| {});
    let (b, second) = tracker.track_group(batch(2), |_: DeliveryInfo| {});
    let (_, third) = tracker.track_group(Vec::new(), |_: DeliveryInfo| {});

    assert_eq!(first.get(), 1);
    assert!(first < second && second < third);

    a.accept();
    b.into_iter().for_each(TrackedMetric::accept);
}

#[test]
fn concurrent_resolution_notifies_exactly_once() {
    const WORKERS: usize = 8;
    const COPIES_PER_WORKER: usize = 64;

    for _ in 0..50 {
        let tracker = Tracker::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let outcomes = Arc::new(Outcomes::default());
        let notify = {
            let calls = Arc::clone(&calls);
            let inner = outcomes.notifier();
            move |info: DeliveryInfo| {
                calls.fetch_add(1, Ordering::SeqCst);
                inner(info);
            }
        };

        let (mut group, id) = tracker.track_group(batch(WORKERS), notify);

        // Fan every metric out, then shuffle the copies so each worker resolves a random mix of
        // references from the whole unit.
        let mut references = Vec::new();
        for metric in group.drain(..) {
            for _ in 1..COPIES_PER_WORKER {
                references.push(metric.copy());
            }
            references.push(metric);
        }
        references.shuffle(&mut rand::rng());

        let total = references.len();
        let mut per_worker = Vec::new();
        while !references.is_empty() {
            let take = std::cmp::min(COPIES_PER_WORKER, references.len());
            per_worker.push(references.split_off(references.len() - take));
        }

        let (mut accepted, mut rejected) = (0u64, 0u64);
        for (worker, refs) in per_worker.iter().enumerate() {
            for i in 0..refs.len() {
                match (worker + i) % 3 {
                    0 => accepted += 1,
                    1 => rejected += 1,
                    _ => {}
                }
            }
        }

        assert_eq!(tracker.in_flight(), 1);
        assert_eq!(tracker.lookup(id).map(|r| r.ref_count()), Some(total as i64));

        let barrier = Arc::new(Barrier::new(per_worker.len()));
        let handles = per_worker
            .into_iter()
            .enumerate()
            .map(|(worker, refs)| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for (i, metric) in refs.into_iter().enumerate() {
                        match (worker + i) % 3 {
                            0 => metric.accept(),
                            1 => metric.reject(),
                            _ => metric.drop(),
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().expect("resolver thread panicked");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let infos = outcomes.take();
        assert_eq!(infos[0].id(), id);
        assert_eq!(infos[0].accepted(), accepted);
        assert_eq!(infos[0].rejected(), rejected);
        assert!(tracker.lookup(id).is_none());
        assert_eq!(tracker.ensure_completed(), Ok(()));
    }
}

#[test]
fn registry_entry_tracks_live_references() {
    let tracker = Tracker::new();
    let observed = Arc::new(Mutex::new(Vec::new()));

    let notify = {
        let tracker = tracker.clone();
        let observed = Arc::clone(&observed);
        move |info: DeliveryInfo| {
            observed.lock().unwrap().push(tracker.lookup(info.id()).is_some());
        }
    };

    let (group, id) = tracker.track_group(batch(4), notify);
    let mut remaining = group.len();
    for metric in group {
        assert!(tracker.lookup(id).is_some());
        assert_eq!(tracker.lookup(id).map(|r| r.ref_count()), Some(remaining as i64));
        metric.accept();
        remaining -= 1;
    }

    assert_eq!(*observed.lock().unwrap(), vec![false]);
    assert!(tracker.lookup(id).is_none());
    assert_eq!(tracker.in_flight(), 0);
}

#[test]
fn unresolved_metrics_leak_their_unit() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let tracker = Tracker::new();
    let outcomes = Arc::new(Outcomes::default());
    let (mut group, id) = tracker.track_group(batch(2), outcomes.notifier());

    group.pop().expect("group has two metrics").accept();
    std::mem::drop(group);

    assert!(outcomes.take().is_empty());
    let err = tracker.ensure_completed().unwrap_err();
    assert!(err.in_flight.is_empty());
    assert_eq!(err.leaked, vec![id]);
    assert_eq!(err.to_string(), "0 delivery unit(s) still in flight, 1 leaked");

    let registry = tracker.registry().expect("registry enabled by default");
    assert_eq!(registry.clear_leaked(), 1);
    assert_eq!(tracker.ensure_completed(), Ok(()));
}

#[test]
fn panicking_notifier_still_unregisters() {
    let tracker = Tracker::new();
    let metric = batch(1).remove(0);
    let (tracked, id) = tracker.track(metric, |_: DeliveryInfo| panic!("notifier failed"));
    assert!(tracker.lookup(id).is_some());

    let result = panic::catch_unwind(AssertUnwindSafe(|| tracked.accept()));
    assert!(result.is_err());

    assert!(tracker.lookup(id).is_none());
    assert_eq!(tracker.in_flight(), 0);
    assert_eq!(tracker.ensure_completed(), Ok(()));
}
