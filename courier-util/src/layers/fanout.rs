use courier::TrackedMetric;

use crate::Stage;

/// Fans out metrics to multiple stages.
///
/// Every stage receives its own copy of each metric, and resolves it independently.  The delivery
/// unit of the metric only completes once every stage has resolved its copy.  With no stages,
/// metrics are dropped.
pub struct Fanout {
    stages: Vec<Box<dyn Stage>>,
}

impl Fanout {
    /// Number of stages metrics are fanned out to.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if there are no stages to fan out to.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Stage for Fanout {
    fn process(&self, metric: TrackedMetric) {
        match self.stages.split_last() {
            None => metric.drop(),
            Some((last, rest)) => {
                for stage in rest {
                    stage.process(metric.copy());
                }
                last.process(metric);
            }
        }
    }
}

/// Builder for fanning out metrics to multiple stages.
///
/// More information on the behavior of the fanout can be found in [`Fanout`].
#[derive(Default)]
pub struct FanoutBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl FanoutBuilder {
    /// Adds a stage to the fanout list.
    pub fn add_stage<S>(mut self, stage: S) -> FanoutBuilder
    where
        S: Stage + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Builds the `Fanout` stage.
    pub fn build(self) -> Fanout {
        Fanout { stages: self.stages }
    }
}
