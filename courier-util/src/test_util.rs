use std::sync::{Arc, Mutex};

use courier::{DeliveryInfo, Metric, TrackedMetric, Tracker};
use mockall::{mock, Sequence};

use crate::{Output, WriteError};

#[derive(Clone, Debug)]
pub enum WriteOperation {
    Succeed(usize),
    FailTransient(usize),
    FailPermanent(usize),
}

impl WriteOperation {
    fn apply_to_mock(self, mock: &mut MockBasicOutput, seq: &mut Sequence) {
        let (batch_len, result) = match self {
            WriteOperation::Succeed(len) => (len, Ok(())),
            WriteOperation::FailTransient(len) => {
                (len, Err(WriteError::transient("connection reset")))
            }
            WriteOperation::FailPermanent(len) => {
                (len, Err(WriteError::permanent("batch refused")))
            }
        };

        mock.expect_write()
            .times(1)
            .in_sequence(seq)
            .withf(move |batch: &[TrackedMetric]| batch.len() == batch_len)
            .return_const(result);
    }
}

mock! {
    pub BasicOutput {}

    impl Output for BasicOutput {
        fn write(&mut self, batch: &[TrackedMetric]) -> Result<(), WriteError>;
    }
}

impl MockBasicOutput {
    pub fn from_operations<O>(operations: O) -> Self
    where
        O: IntoIterator<Item = WriteOperation>,
    {
        let mut output = Self::new();
        let mut seq = Sequence::new();
        for operation in operations.into_iter() {
            operation.apply_to_mock(&mut output, &mut seq);
        }
        output
    }
}

/// Collects every delivery notification it is handed.
#[derive(Clone, Default)]
pub struct Outcomes(Arc<Mutex<Vec<DeliveryInfo>>>);

impl Outcomes {
    pub fn notifier(&self) -> impl Fn(DeliveryInfo) + Send + Sync + 'static {
        let outcomes = Arc::clone(&self.0);
        move |info| outcomes.lock().unwrap().push(info)
    }

    pub fn take(&self) -> Vec<DeliveryInfo> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

pub fn tracked_batch(tracker: &Tracker, len: usize, outcomes: &Outcomes) -> Vec<TrackedMetric> {
    let metrics = (0..len).map(|i| {
        Metric::new(format!("test.metric_{}", i), std::time::SystemTime::now())
            .with_field("value", i as u64)
    });
    let (tracked, _) = tracker.track_group(metrics, outcomes.notifier());
    tracked
}
