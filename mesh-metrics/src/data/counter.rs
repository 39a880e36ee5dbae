use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

/// A handle to a counter.
///
/// Counters are meant to only ever go up, but decrementing is allowed and the value may go
/// negative.  Clones of a `Counter` share the same underlying value.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    inner: Arc<AtomicI64>,
}

impl Counter {
    /// Increments the counter by `delta`.
    pub fn inc(&self, delta: i64) {
        let _ = self.inner.fetch_add(delta, Ordering::Release);
    }

    /// Decrements the counter by `delta`.
    pub fn dec(&self, delta: i64) {
        let _ = self.inner.fetch_sub(delta, Ordering::Release);
    }

    /// Gets the current value of the counter.
    pub fn value(&self) -> i64 {
        self.inner.load(Ordering::Acquire)
    }

    /// Whether or not both handles point at the same counter.
    pub fn ptr_eq(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::Counter;

    #[test]
    fn test_inc_dec() {
        let counter = Counter::default();
        assert_eq!(counter.value(), 0);

        counter.inc(1);
        counter.dec(1);
        assert_eq!(counter.value(), 0);

        counter.dec(3);
        assert_eq!(counter.value(), -3);

        let shared = counter.clone();
        shared.inc(10);
        assert_eq!(counter.value(), 7);
        assert!(counter.ptr_eq(&shared));
    }

    #[test]
    fn test_wraps_on_overflow() {
        let counter = Counter::default();
        counter.inc(i64::MAX);
        counter.inc(1);
        assert_eq!(counter.value(), i64::MIN);
    }

    #[test]
    fn test_concurrent_increments() {
        let counter = Counter::default();
        std::thread::scope(|s| {
            for _ in 0..8 {
                let counter = counter.clone();
                s.spawn(move || {
                    for _ in 0..10_000 {
                        counter.inc(1);
                    }
                });
            }
        });
        assert_eq!(counter.value(), 80_000);
    }
}
