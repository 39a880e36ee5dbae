use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

/// A handle to a gauge.
///
/// Gauges hold a single value that can be set to anything at any time.  Clones of a `Gauge` share
/// the same underlying value.
#[derive(Clone, Debug, Default)]
pub struct Gauge {
    inner: Arc<AtomicI64>,
}

impl Gauge {
    /// Sets the gauge to `value`.
    pub fn update(&self, value: i64) {
        let _ = self.inner.swap(value, Ordering::AcqRel);
    }

    /// Increments the gauge by `delta`.
    pub fn inc(&self, delta: i64) {
        let _ = self.inner.fetch_add(delta, Ordering::AcqRel);
    }

    /// Decrements the gauge by `delta`.
    pub fn dec(&self, delta: i64) {
        let _ = self.inner.fetch_sub(delta, Ordering::AcqRel);
    }

    /// Gets the current value of the gauge.
    pub fn value(&self) -> i64 {
        self.inner.load(Ordering::Acquire)
    }

    /// Whether or not both handles point at the same gauge.
    pub fn ptr_eq(&self, other: &Gauge) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
