mod counter;
pub use counter::Counter;

mod gauge;
pub use gauge::Gauge;

mod histogram;
pub use histogram::{Histogram, HistogramSnapshot};

use crate::MetricKind;

/// A metric stored in a [`Registry`](crate::Registry).
#[derive(Clone, Debug)]
pub enum Metric {
    /// A counter.
    Counter(Counter),
    /// A gauge.
    Gauge(Gauge),
    /// A histogram.
    Histogram(Histogram),
}

impl Metric {
    /// Creates an empty metric of the given kind.
    pub fn new(kind: MetricKind) -> Metric {
        match kind {
            MetricKind::Counter => Metric::Counter(Counter::default()),
            MetricKind::Gauge => Metric::Gauge(Gauge::default()),
            MetricKind::Histogram => Metric::Histogram(Histogram::default()),
        }
    }

    /// Kind of this metric.
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Histogram(_) => MetricKind::Histogram,
        }
    }

    pub(crate) fn as_counter(&self) -> Option<Counter> {
        match self {
            Metric::Counter(counter) => Some(counter.clone()),
            _ => None,
        }
    }

    pub(crate) fn as_gauge(&self) -> Option<Gauge> {
        match self {
            Metric::Gauge(gauge) => Some(gauge.clone()),
            _ => None,
        }
    }

    pub(crate) fn as_histogram(&self) -> Option<Histogram> {
        match self {
            Metric::Histogram(histogram) => Some(histogram.clone()),
            _ => None,
        }
    }
}
