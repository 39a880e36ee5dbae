use std::sync::Arc;

use parking_lot::Mutex;

/// A point-in-time view of a [`Histogram`].
///
/// When `count` is zero, `min` and `max` are reported as zero.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct HistogramSnapshot {
    /// Number of observed values.
    pub count: u64,
    /// Sum of all observed values.
    pub sum: i64,
    /// Smallest observed value.
    pub min: i64,
    /// Largest observed value.
    pub max: i64,
}

impl HistogramSnapshot {
    /// Gets the arithmetic mean of the observed values, or `0.0` if nothing has been observed.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    fn fold(self, value: i64) -> HistogramSnapshot {
        if self.count == 0 {
            return HistogramSnapshot { count: 1, sum: value, min: value, max: value };
        }

        HistogramSnapshot {
            count: self.count.wrapping_add(1),
            sum: self.sum.wrapping_add(value),
            min: self.min.min(value),
            max: self.max.max(value),
        }
    }
}

/// A handle to a histogram.
///
/// Histograms track the count, sum, minimum and maximum of every value observed, using a fixed
/// amount of memory regardless of how many values are recorded.  All four fields are updated
/// together under a lock owned by this histogram alone, so a
/// [`snapshot`](Histogram::snapshot) is always internally consistent.
///
/// Clones of a `Histogram` share the same underlying aggregate.
#[derive(Clone, Debug, Default)]
pub struct Histogram {
    inner: Arc<Mutex<HistogramSnapshot>>,
}

impl Histogram {
    /// Records `value` into the histogram.
    pub fn update(&self, value: i64) {
        let mut aggregate = self.inner.lock();
        *aggregate = aggregate.fold(value);
    }

    /// Takes a snapshot of the histogram.
    pub fn snapshot(&self) -> HistogramSnapshot {
        *self.inner.lock()
    }

    /// Whether or not both handles point at the same histogram.
    pub fn ptr_eq(&self, other: &Histogram) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{Histogram, HistogramSnapshot};

    #[test]
    fn test_empty() {
        let histogram = Histogram::default();
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot, HistogramSnapshot::default());
        assert_eq!(snapshot.mean(), 0.0);
    }

    #[test]
    fn test_aggregation() {
        let histogram = Histogram::default();
        for value in [1, 2, 3, 4] {
            histogram.update(value);
        }

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot, HistogramSnapshot { count: 4, sum: 10, min: 1, max: 4 });
        assert_eq!(snapshot.mean(), 2.5);
    }

    #[test]
    fn test_negative_first_value() {
        let histogram = Histogram::default();
        histogram.update(-5);
        histogram.update(3);

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.min, -5);
        assert_eq!(snapshot.max, 3);
    }

    #[test]
    fn test_concurrent_updates() {
        let histogram = Histogram::default();
        std::thread::scope(|s| {
            for t in 0..4i64 {
                let histogram = histogram.clone();
                s.spawn(move || {
                    for i in 1..=1_000i64 {
                        histogram.update(t * 1_000 + i);
                    }
                });
            }
        });

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count, 4_000);
        assert_eq!(snapshot.sum, (1..=4_000i64).sum::<i64>());
        assert_eq!(snapshot.min, 1);
        assert_eq!(snapshot.max, 4_000);
    }

    #[test]
    fn test_histograms_do_not_share_state() {
        let a = Histogram::default();
        let b = Histogram::default();
        assert!(!a.ptr_eq(&b));

        // Holding one histogram's lock must not block updates to another.
        let guard = a.inner.lock();
        b.update(7);
        drop(guard);

        assert_eq!(a.snapshot(), HistogramSnapshot::default());
        assert_eq!(b.snapshot(), HistogramSnapshot { count: 1, sum: 7, min: 7, max: 7 });
    }
}
