use std::{fmt, io, sync::Arc};

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use mesh_metrics::{Registry, RegistryManager};
use tracing::trace;

use crate::{collectors::Collector, exposition};

struct Inner {
    manager: Arc<RegistryManager>,
    collectors: Vec<Box<dyn Collector>>,
    cache: ArcSwapOption<Bytes>,
    passive_flush: bool,
}

/// Renders the registries of a [`RegistryManager`] in the Prometheus exposition format.
///
/// `PrometheusSink` is cheap to clone: all clones share the same manager, collectors, and cache.
#[derive(Clone)]
pub struct PrometheusSink {
    inner: Arc<Inner>,
}

impl PrometheusSink {
    pub(crate) fn new(
        manager: Arc<RegistryManager>,
        collectors: Vec<Box<dyn Collector>>,
        passive_flush: bool,
    ) -> Self {
        let inner = Inner { manager, collectors, cache: ArcSwapOption::empty(), passive_flush };
        PrometheusSink { inner: Arc::new(inner) }
    }

    /// Manager whose registries this sink renders.
    pub fn manager(&self) -> &Arc<RegistryManager> {
        &self.inner.manager
    }

    /// Whether or not scrapes are served from the passively flushed cache.
    pub fn is_passive(&self) -> bool {
        self.inner.passive_flush
    }

    /// Runs every collector registered with this sink.
    pub fn collect(&self) {
        for collector in &self.inner.collectors {
            collector.collect(&self.inner.manager);
        }
    }

    /// Takes a snapshot of every registry and renders it in the Prometheus exposition format.
    ///
    /// Collectors run first, so their values are included.  The cache used for passive flush is
    /// left untouched.
    pub fn render(&self) -> String {
        self.collect();
        exposition::render(&self.inner.manager.registries())
    }

    /// Renders the given registries into `target`.
    ///
    /// Unlike [`render`](PrometheusSink::render), only the registries passed in are written, and
    /// collectors are not run.
    ///
    /// ## Errors
    ///
    /// If writing to `target` fails, the error is returned.
    pub fn flush<W>(&self, target: &mut W, registries: &[Arc<Registry>]) -> io::Result<()>
    where
        W: io::Write + ?Sized,
    {
        let output = exposition::render(registries);
        target.write_all(output.as_bytes())?;
        target.flush()
    }

    /// Renders every registry and stores the result as the cached scrape body.
    pub fn refresh(&self) {
        let output = Bytes::from(self.render());
        trace!(bytes = output.len(), "refreshed cached scrape output");
        self.inner.cache.store(Some(Arc::new(output)));
    }

    /// Gets the body to serve for a scrape.
    ///
    /// With passive flush enabled, this is the output of the last [`refresh`](PrometheusSink::refresh).
    /// Otherwise, or if no refresh has completed yet, a fresh render is returned.
    pub fn scrape(&self) -> Bytes {
        if self.inner.passive_flush {
            if let Some(cached) = self.inner.cache.load_full() {
                return Bytes::clone(&cached);
            }
        }

        Bytes::from(self.render())
    }
}

impl fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusSink")
            .field("registries", &self.inner.manager.len())
            .field("collectors", &self.inner.collectors.len())
            .field("passive_flush", &self.inner.passive_flush)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use mesh_metrics::{LabelSet, RegistryManager};

    use super::PrometheusSink;
    use crate::Collector;

    struct CountingCollector(Arc<AtomicUsize>);

    impl Collector for CountingCollector {
        fn collect(&self, manager: &RegistryManager) {
            let runs = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            manager
                .new_or_existing("collector", LabelSet::empty())
                .unwrap()
                .gauge("runs")
                .unwrap()
                .update(runs as i64);
        }
    }

    fn sink(passive_flush: bool) -> (PrometheusSink, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let collector: Box<dyn Collector> = Box::new(CountingCollector(Arc::clone(&runs)));
        let manager = Arc::new(RegistryManager::new());
        let sink = PrometheusSink::new(manager, vec![collector], passive_flush);
        (sink, runs)
    }

    #[test]
    fn test_render_runs_collectors() {
        let (sink, runs) = sink(false);
        assert_eq!(sink.render(), "collector_runs 1.0\n");
        assert_eq!(sink.render(), "collector_runs 2.0\n");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_flush_into_writer() {
        let (sink, runs) = sink(false);
        let registry = sink
            .manager()
            .new_or_existing("t1", LabelSet::new([("lbk1", "lbv1")]))
            .unwrap();
        registry.counter("k1").unwrap().inc(1);

        let mut target = Vec::new();
        sink.flush(&mut target, &sink.manager().registries()).unwrap();
        assert_eq!(String::from_utf8(target).unwrap(), "lbk1_t1_k1{lbk1=\"lbv1\"} 1.0\n");
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let mut empty = Vec::new();
        sink.flush(&mut empty, &[]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_scrape_passive() {
        let (sink, _) = sink(true);
        let registry = sink.manager().new_or_existing("t1", LabelSet::empty()).unwrap();
        let counter = registry.counter("k1").unwrap();

        // Nothing cached yet, so scrapes render fresh.
        counter.inc(1);
        assert!(std::str::from_utf8(&sink.scrape()).unwrap().contains("t1_k1 1.0\n"));

        sink.refresh();
        counter.inc(1);
        let cached = sink.scrape();
        assert!(std::str::from_utf8(&cached).unwrap().contains("t1_k1 1.0\n"));
        assert_eq!(cached, sink.scrape());

        sink.refresh();
        assert!(std::str::from_utf8(&sink.scrape()).unwrap().contains("t1_k1 2.0\n"));
    }

    #[test]
    fn test_scrape_active() {
        let (sink, _) = sink(false);
        let registry = sink.manager().new_or_existing("t1", LabelSet::empty()).unwrap();
        let counter = registry.counter("k1").unwrap();

        sink.refresh();
        counter.inc(1);
        assert!(std::str::from_utf8(&sink.scrape()).unwrap().contains("t1_k1 1.0\n"));
    }

    #[test]
    fn test_clones_share_state() {
        let (sink, runs) = sink(true);
        let clone = sink.clone();
        sink.refresh();
        assert_eq!(sink.scrape(), clone.scrape());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
