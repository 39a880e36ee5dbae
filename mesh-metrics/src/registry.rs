use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::{Counter, Gauge, Histogram, Identity, LabelSet, Metric, MetricKind, MetricsError};

/// A label-qualified collection of metrics.
///
/// `Registry` maps a metric key to exactly one [`Metric`].  The first request for a key creates the
/// metric, and every later request for the same key returns a handle to that same metric.  A key
/// belongs to the kind it was first requested as: asking for it as any other kind fails with
/// [`MetricsError::KindConflict`].
///
/// Registries are created through a [`RegistryManager`](crate::RegistryManager), which guarantees a
/// single registry per [`Identity`].
///
/// ## Performance
///
/// `Registry` is optimized for reads.  Looking up an existing key only takes a shared lock, and the
/// returned handles can be updated without touching the registry at all.
#[derive(Debug)]
pub struct Registry {
    identity: Identity,
    metrics: RwLock<HashMap<String, Metric>>,
}

impl Registry {
    pub(crate) fn new(identity: Identity) -> Self {
        Registry { identity, metrics: RwLock::new(HashMap::new()) }
    }

    /// Identity of this registry.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Type name of this registry.
    pub fn type_name(&self) -> &str {
        self.identity.type_name()
    }

    /// Labels of this registry.
    pub fn labels(&self) -> &LabelSet {
        self.identity.labels()
    }

    /// Gets or creates the counter under the given `key`.
    ///
    /// ## Errors
    ///
    /// Returns [`MetricsError::KindConflict`] if `key` is already registered as another kind.
    pub fn counter(&self, key: &str) -> Result<Counter, MetricsError> {
        self.get_or_create(key, MetricKind::Counter, Metric::as_counter)
    }

    /// Gets or creates the gauge under the given `key`.
    ///
    /// ## Errors
    ///
    /// Returns [`MetricsError::KindConflict`] if `key` is already registered as another kind.
    pub fn gauge(&self, key: &str) -> Result<Gauge, MetricsError> {
        self.get_or_create(key, MetricKind::Gauge, Metric::as_gauge)
    }

    /// Gets or creates the histogram under the given `key`.
    ///
    /// ## Errors
    ///
    /// Returns [`MetricsError::KindConflict`] if `key` is already registered as another kind.
    pub fn histogram(&self, key: &str) -> Result<Histogram, MetricsError> {
        self.get_or_create(key, MetricKind::Histogram, Metric::as_histogram)
    }

    /// Gets the metric under the given `key`, if it exists.
    pub fn get(&self, key: &str) -> Option<Metric> {
        self.metrics.read().get(key).cloned()
    }

    /// Number of metrics in this registry.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// Whether or not this registry has any metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Gets the keys of all metrics in this registry.
    pub fn keys(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    /// Visits every metric stored in this registry.
    ///
    /// The visitor runs over a point-in-time copy of the registry's entries, so it never holds the
    /// registry lock: metrics can be created concurrently, and metrics created after `for_each` was
    /// called may not be observed.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &Metric),
    {
        let entries = {
            let metrics = self.metrics.read();
            metrics.iter().map(|(k, m)| (k.clone(), m.clone())).collect::<Vec<_>>()
        };

        for (key, metric) in &entries {
            visit(key, metric);
        }
    }

    fn get_or_create<T, E>(
        &self,
        key: &str,
        kind: MetricKind,
        extract: E,
    ) -> Result<T, MetricsError>
    where
        E: Fn(&Metric) -> Option<T>,
    {
        let conflict = |existing: &Metric| MetricsError::KindConflict {
            key: key.to_owned(),
            existing: existing.kind(),
            requested: kind,
        };

        // Try and get the metric if it exists.
        {
            let metrics = self.metrics.read();
            if let Some(metric) = metrics.get(key) {
                return extract(metric).ok_or_else(|| conflict(metric));
            }
        }

        // Switch to the write lock, checking again in case somebody else just inserted it.
        let mut metrics = self.metrics.write();
        let metric = metrics.entry(key.to_owned()).or_insert_with(|| Metric::new(kind));
        extract(metric).ok_or_else(|| conflict(metric))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::Registry;
    use crate::{Identity, LabelSet, Metric, MetricKind, MetricsError};

    fn registry() -> Registry {
        Registry::new(Identity::new("t1", LabelSet::new([("lbk1", "lbv1")])).unwrap())
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = registry();
        assert!(registry.is_empty());

        let first = registry.counter("k1").unwrap();
        first.inc(1);

        let second = registry.counter("k1").unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(second.value(), 1);
        assert_eq!(registry.len(), 1);

        let histogram = registry.histogram("k4").unwrap();
        assert!(histogram.ptr_eq(&registry.histogram("k4").unwrap()));

        let gauge = registry.gauge("k3").unwrap();
        assert!(gauge.ptr_eq(&registry.gauge("k3").unwrap()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_kind_conflict() {
        let registry = registry();
        registry.counter("k1").unwrap().inc(5);

        let err = registry.gauge("k1").unwrap_err();
        assert_eq!(
            err,
            MetricsError::KindConflict {
                key: "k1".to_owned(),
                existing: MetricKind::Counter,
                requested: MetricKind::Gauge,
            }
        );
        assert!(registry.histogram("k1").is_err());

        // The existing counter is untouched.
        assert_eq!(registry.len(), 1);
        match registry.get("k1") {
            Some(Metric::Counter(counter)) => assert_eq!(counter.value(), 5),
            other => panic!("unexpected metric: {:?}", other),
        }
    }

    #[test]
    fn test_for_each_visits_every_key_once() {
        let registry = registry();
        registry.counter("k1").unwrap();
        registry.counter("k2").unwrap();
        registry.gauge("k3").unwrap();
        registry.histogram("k4").unwrap();

        let mut seen = HashSet::new();
        registry.for_each(|key, _| {
            assert!(seen.insert(key.to_owned()), "key visited twice: {}", key);
        });

        let expected: HashSet<String> =
            ["k1", "k2", "k3", "k4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_for_each_allows_creation_from_visitor() {
        let registry = registry();
        registry.counter("k1").unwrap();

        let mut visited = 0;
        registry.for_each(|key, _| {
            visited += 1;
            registry.gauge(&format!("{}_shadow", key)).unwrap();
        });

        assert_eq!(visited, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_creation() {
        let registry = registry();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1_000 {
                        registry.counter("shared").unwrap().inc(1);
                    }
                });
            }
        });

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.counter("shared").unwrap().value(), 8_000);
    }
}
