use aho_corasick::{AhoCorasick, AhoCorasickBuilder, AhoCorasickKind};
use courier::TrackedMetric;
use tracing::trace;

use crate::{layers::Layer, Stage};

/// Filters and drops metrics matching certain name patterns.
///
/// More information on the behavior of the layer can be found in [`FilterLayer`].
pub struct Filter<S> {
    inner: S,
    automaton: AhoCorasick,
    pass_only_matching: bool,
}

impl<S> Filter<S> {
    fn should_filter(&self, name: &str) -> bool {
        self.automaton.is_match(name) != self.pass_only_matching
    }
}

impl<S: Stage> Stage for Filter<S> {
    fn process(&self, metric: TrackedMetric) {
        if self.should_filter(metric.name()) {
            trace!(
                tracking_id = metric.tracking_id().get(),
                metric_name = metric.name(),
                "Dropping filtered metric."
            );
            metric.drop();
            return;
        }
        self.inner.process(metric)
    }
}

/// A layer for filtering and dropping metrics matching certain name patterns.
///
/// Uses an [Aho-Corasick][ahocorasick] automaton to efficiently match a metric name against
/// multiple patterns at once.  Patterns are matched across the entire name i.e. they are matched
/// as substrings.
///
/// By default, a metric whose name matches any of the configured patterns is dropped.  With
/// [`pass_only_matching`](FilterLayer::pass_only_matching), only matching metrics are let
/// through instead.  Filtered metrics are resolved with [`TrackedMetric::drop`]: filtering is not
/// a delivery failure.
///
/// A number of options are exposed that control the underlying automaton, such as compilation to a
/// DFA, or case sensitivity.
///
/// [ahocorasick]: https://en.wikipedia.org/wiki/Aho–Corasick_algorithm
#[derive(Default)]
pub struct FilterLayer {
    patterns: Vec<String>,
    case_insensitive: bool,
    use_dfa: bool,
    pass_only_matching: bool,
}

impl FilterLayer {
    /// Creates a [`FilterLayer`] from an existing set of patterns.
    pub fn from_patterns<P, I>(patterns: P) -> Self
    where
        P: IntoIterator<Item = I>,
        I: AsRef<str>,
    {
        FilterLayer {
            patterns: patterns.into_iter().map(|s| s.as_ref().to_string()).collect(),
            case_insensitive: false,
            use_dfa: true,
            pass_only_matching: false,
        }
    }

    /// Adds a pattern to match.
    pub fn add_pattern<P>(&mut self, pattern: P) -> &mut FilterLayer
    where
        P: AsRef<str>,
    {
        self.patterns.push(pattern.as_ref().to_string());
        self
    }

    /// Sets the case sensitivity used for pattern matching.
    ///
    /// Defaults to `false` i.e. searches are case sensitive.
    pub fn case_insensitive(&mut self, case_insensitive: bool) -> &mut FilterLayer {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Sets whether or not to internally use a deterministic finite automaton.
    ///
    /// A DFA executes searches more quickly than an NFA, at the cost of more space and a longer
    /// build.  It's a good idea to enable this for a small number of fairly short patterns.
    ///
    /// Defaults to `true`.
    pub fn use_dfa(&mut self, dfa: bool) -> &mut FilterLayer {
        self.use_dfa = dfa;
        self
    }

    /// Sets whether matching metrics are the only ones let through, rather than the ones dropped.
    ///
    /// Defaults to `false`.
    pub fn pass_only_matching(&mut self, pass_only_matching: bool) -> &mut FilterLayer {
        self.pass_only_matching = pass_only_matching;
        self
    }
}

impl<S> Layer<S> for FilterLayer {
    type Output = Filter<S>;

    fn layer(&self, inner: S) -> Self::Output {
        let mut automaton_builder = AhoCorasickBuilder::new();
        let automaton = automaton_builder
            .ascii_case_insensitive(self.case_insensitive)
            .kind(self.use_dfa.then_some(AhoCorasickKind::DFA))
            .build(&self.patterns)
            // Building only fails when exceeding internal size limits, which metric name patterns
            // are nowhere near.
            .expect("should not fail to build filter automaton");
        Filter { inner, automaton, pass_only_matching: self.pass_only_matching }
    }
}

#[cfg(test)]
mod tests {
    use super::FilterLayer;
    use crate::{debugging::DebuggingSink, layers::Layer, Stage};
    use courier::{DeliveryInfo, Metric, Tracker};
    use std::{
        sync::{Arc, Mutex},
        time::SystemTime,
    };

    const NAMES: [&str; 5] = [
        "tokio.loops",
        "hyper.bytes_read",
        "hyper.response_latency",
        "Tokio.spurious_wakeups",
        "bB8.pooled_conns",
    ];

    fn run(layer: &FilterLayer) -> (Vec<String>, Vec<DeliveryInfo>) {
        let sink = DebuggingSink::new();
        let snapshotter = sink.snapshotter();
        let filter = layer.layer(sink);

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let notify = {
            let outcomes = Arc::clone(&outcomes);
            move |info: DeliveryInfo| outcomes.lock().unwrap().push(info)
        };
        let metrics = NAMES.iter().map(|name| Metric::new(*name, SystemTime::now()));
        let (tracked, _) = Tracker::new().track_group(metrics, notify);
        filter.process_batch(tracked);

        let names = snapshotter.snapshot().into_iter().map(|(_, m)| m.name().to_string()).collect();
        let outcomes = outcomes.lock().unwrap().clone();
        (names, outcomes)
    }

    #[test]
    fn test_basic_functionality() {
        let (names, outcomes) = run(&FilterLayer::from_patterns(["tokio", "bb8"]));

        assert_eq!(
            names,
            vec![
                "hyper.bytes_read",
                "hyper.response_latency",
                "Tokio.spurious_wakeups",
                "bB8.pooled_conns"
            ]
        );
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].delivered());
        assert_eq!(outcomes[0].accepted(), 4);
    }

    #[test]
    fn test_case_insensitivity() {
        let mut layer = FilterLayer::from_patterns(["tokio", "bb8"]);
        layer.case_insensitive(true);
        let (names, outcomes) = run(&layer);

        assert_eq!(names, vec!["hyper.bytes_read", "hyper.response_latency"]);
        assert_eq!(outcomes[0].accepted(), 2);
        assert_eq!(outcomes[0].rejected(), 0);
    }

    #[test]
    fn test_pass_only_matching() {
        let mut layer = FilterLayer::from_patterns(["hyper"]);
        layer.pass_only_matching(true).use_dfa(false);
        let (names, _) = run(&layer);

        assert_eq!(names, vec!["hyper.bytes_read", "hyper.response_latency"]);
    }
}
