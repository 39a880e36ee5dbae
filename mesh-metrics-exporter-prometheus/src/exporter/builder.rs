#[cfg(feature = "http-listener")]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(feature = "http-listener")]
use std::thread;
use std::{sync::Arc, time::Duration};

use mesh_metrics::RegistryManager;
#[cfg(feature = "http-listener")]
use tokio::{task::JoinHandle, time::MissedTickBehavior};
#[cfg(feature = "http-listener")]
use tracing::{debug, warn};

#[cfg(feature = "http-listener")]
use super::ExporterFuture;
use crate::{
    collectors::{Collector, ProcessCollector},
    common::BuildError,
    PrometheusSink,
};

const DEFAULT_PORT: u16 = 9090;
const DEFAULT_ENDPOINT: &str = "/metrics";
const DEFAULT_PASSIVE_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Builder for creating and installing a Prometheus sink/exporter.
pub struct PrometheusBuilder {
    manager: Option<Arc<RegistryManager>>,
    #[cfg(feature = "http-listener")]
    listen_address: SocketAddr,
    #[cfg_attr(not(feature = "http-listener"), allow(dead_code))]
    endpoint: String,
    disable_process_collector: bool,
    disable_runtime_collector: bool,
    disable_passive_flush: bool,
    #[cfg_attr(not(feature = "http-listener"), allow(dead_code))]
    passive_flush_interval: Duration,
}

impl PrometheusBuilder {
    /// Creates a new [`PrometheusBuilder`].
    pub fn new() -> Self {
        PrometheusBuilder {
            manager: None,
            #[cfg(feature = "http-listener")]
            listen_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            disable_process_collector: false,
            disable_runtime_collector: false,
            disable_passive_flush: false,
            passive_flush_interval: DEFAULT_PASSIVE_FLUSH_INTERVAL,
        }
    }

    /// Sets the manager whose registries are exposed.
    ///
    /// Defaults to the process-wide manager, [`RegistryManager::global`].
    #[must_use]
    pub fn with_manager(mut self, manager: Arc<RegistryManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Configures the exporter to expose an HTTP listener that functions as a [scrape endpoint].
    ///
    /// The HTTP listener that is spawned will respond to GET and HEAD requests on the configured
    /// endpoint path.
    ///
    /// Defaults to listening at `0.0.0.0:9090`.
    ///
    /// [scrape endpoint]: https://prometheus.io/docs/instrumenting/exposition_formats/#text-based-format
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    #[must_use]
    pub fn with_http_listener(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.listen_address = addr.into();
        self
    }

    /// Configures the HTTP listener to listen on the given port, on all interfaces.
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.listen_address = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        self
    }

    /// Sets the path the scrape endpoint is served on.
    ///
    /// Defaults to `/metrics`.
    ///
    /// ## Errors
    ///
    /// If `endpoint` does not begin with `/`, an error variant will be returned.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Result<Self, BuildError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with('/') {
            return Err(BuildError::InvalidEndpoint(endpoint));
        }

        self.endpoint = endpoint;
        Ok(self)
    }

    /// Disables collecting metrics about the current process.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn disable_process_collector(mut self, disable: bool) -> Self {
        self.disable_process_collector = disable;
        self
    }

    /// Disables collecting metrics about the Tokio runtime.
    ///
    /// Only has an effect when the `async-runtime` feature is enabled.  Defaults to `false`.
    #[must_use]
    pub fn disable_runtime_collector(mut self, disable: bool) -> Self {
        self.disable_runtime_collector = disable;
        self
    }

    /// Disables passive flush.
    ///
    /// When disabled, every scrape renders the registries at the time of the request.  When
    /// enabled, the output is rendered periodically in the background and scrapes are served from
    /// the most recent copy.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn disable_passive_flush(mut self, disable: bool) -> Self {
        self.disable_passive_flush = disable;
        self
    }

    /// Sets how often the output is rendered when passive flush is enabled.
    ///
    /// Defaults to one second.
    ///
    /// ## Errors
    ///
    /// If `interval` is zero, an error variant will be returned.
    pub fn passive_flush_interval(mut self, interval: Duration) -> Result<Self, BuildError> {
        if interval.is_zero() {
            return Err(BuildError::ZeroFlushInterval);
        }

        self.passive_flush_interval = interval;
        Ok(self)
    }

    /// Builds the sink and exporter and starts them, returning the sink.
    ///
    /// When called from within a Tokio runtime, the exporter future is spawned directly
    /// into the runtime.  Otherwise, a new single-threaded Tokio runtime is created
    /// on a background thread, and the exporter is spawned there.
    ///
    /// ## Errors
    ///
    /// If there is an error while building the sink and exporter, or starting the exporter, an
    /// error variant will be returned describing the error.
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    pub fn install(self) -> Result<PrometheusSink, BuildError> {
        use tokio::runtime;

        let sink = if let Ok(handle) = runtime::Handle::try_current() {
            let (sink, exporter) = {
                let _g = handle.enter();
                self.build()?
            };

            handle.spawn(run_exporter(exporter));

            sink
        } else {
            let runtime = runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            let (sink, exporter) = {
                let _g = runtime.enter();
                self.build()?
            };

            thread::Builder::new()
                .name("mesh-metrics-exporter-prometheus-http-listener".to_owned())
                .spawn(move || runtime.block_on(run_exporter(exporter)))
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            sink
        };

        Ok(sink)
    }

    /// Builds the sink and exporter and returns them both.
    ///
    /// In most cases, users should prefer to use [`install`][PrometheusBuilder::install] to create
    /// and start the sink and exporter automatically for them.  If a caller needs to schedule the
    /// exporter to run in a particular way, this method provides the flexibility to do so.
    ///
    /// When passive flush is enabled, the returned exporter future also drives the task that
    /// periodically renders the output: the task starts when the future is first polled, renders on
    /// Tokio's blocking thread pool, and stops when the future is dropped.
    ///
    /// ## Panics
    ///
    /// This method must be called from within an existing Tokio runtime or it will panic.
    ///
    /// ## Errors
    ///
    /// If there is an error while building the sink and exporter, an error variant will be
    /// returned describing the error.
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    pub fn build(self) -> Result<(PrometheusSink, ExporterFuture), BuildError> {
        let listen_address = self.listen_address;
        let endpoint = self.endpoint.clone();
        let interval = self.passive_flush_interval;

        let sink = self.build_sink();
        let listener =
            super::http_listener::new_http_listener(sink.clone(), listen_address, endpoint)?;

        let exporter: ExporterFuture = if sink.is_passive() {
            let flush_sink = sink.clone();
            Box::pin(async move {
                let _flush = AbortOnDrop(tokio::spawn(run_passive_flush(flush_sink, interval)));
                listener.await
            })
        } else {
            listener
        };

        debug!(%listen_address, passive_flush = sink.is_passive(), "built prometheus exporter");
        Ok((sink, exporter))
    }

    /// Builds the sink and returns it.
    ///
    /// No exporter or background task is started: the sink renders fresh output on every call
    /// until [`PrometheusSink::refresh`] populates its cache.
    pub fn build_sink(self) -> PrometheusSink {
        let manager = self.manager.unwrap_or_else(RegistryManager::global);

        let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
        if !self.disable_process_collector {
            collectors.push(Box::new(ProcessCollector::new()));
        }
        #[cfg(feature = "async-runtime")]
        if !self.disable_runtime_collector {
            collectors.push(Box::new(crate::RuntimeCollector::new()));
        }
        #[cfg(not(feature = "async-runtime"))]
        let _ = self.disable_runtime_collector;

        PrometheusSink::new(manager, collectors, !self.disable_passive_flush)
    }
}

impl Default for PrometheusBuilder {
    fn default() -> Self {
        PrometheusBuilder::new()
    }
}

#[cfg(feature = "http-listener")]
struct AbortOnDrop(JoinHandle<()>);

#[cfg(feature = "http-listener")]
impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(feature = "http-listener")]
async fn run_passive_flush(sink: PrometheusSink, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let sink = sink.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || sink.refresh()).await {
            warn!("Error refreshing cached scrape output.  Error: {:?}", e);
        }
    }
}

#[cfg(feature = "http-listener")]
async fn run_exporter(exporter: ExporterFuture) {
    if let Err(e) = exporter.await {
        warn!("Prometheus exporter stopped.  Error: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use mesh_metrics::{LabelSet, RegistryManager};

    use super::PrometheusBuilder;
    use crate::BuildError;

    #[test]
    fn test_invalid_endpoint() {
        let result = PrometheusBuilder::new().with_endpoint("metrics");
        assert!(matches!(result, Err(BuildError::InvalidEndpoint(endpoint)) if endpoint == "metrics"));

        assert!(PrometheusBuilder::new().with_endpoint("/stats/prometheus").is_ok());
    }

    #[test]
    fn test_zero_flush_interval() {
        let result = PrometheusBuilder::new().passive_flush_interval(Duration::ZERO);
        assert!(matches!(result, Err(BuildError::ZeroFlushInterval)));

        assert!(PrometheusBuilder::new().passive_flush_interval(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_build_sink_with_collectors_disabled() {
        let manager = Arc::new(RegistryManager::new());
        let sink = PrometheusBuilder::new()
            .with_manager(Arc::clone(&manager))
            .disable_process_collector(true)
            .disable_runtime_collector(true)
            .disable_passive_flush(true)
            .build_sink();

        assert!(Arc::ptr_eq(sink.manager(), &manager));
        assert!(!sink.is_passive());
        assert_eq!(sink.render(), "");

        let registry = manager.new_or_existing("t1", LabelSet::new([("lbk1", "lbv1")])).unwrap();
        registry.gauge("k3").unwrap().update(3);
        assert_eq!(sink.render(), "lbk1_t1_k3{lbk1=\"lbv1\"} 3.0\n");
    }

    #[test]
    fn test_build_sink_with_process_collector() {
        let manager = Arc::new(RegistryManager::new());
        let sink = PrometheusBuilder::new()
            .with_manager(Arc::clone(&manager))
            .disable_runtime_collector(true)
            .build_sink();

        assert!(sink.is_passive());
        let output = sink.render();
        assert!(output.contains("process_start_time_seconds "));
        assert!(output.contains("process_uptime_seconds "));
    }

    #[cfg(feature = "http-listener")]
    #[test]
    fn test_passive_flush_stops_with_exporter() {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

        runtime.block_on(async {
            let manager = Arc::new(RegistryManager::new());
            let counter =
                manager.new_or_existing("t1", LabelSet::empty()).unwrap().counter("k1").unwrap();

            let (sink, exporter) = PrometheusBuilder::new()
                .with_manager(Arc::clone(&manager))
                .with_http_listener(([127, 0, 0, 1], 0))
                .disable_process_collector(true)
                .disable_runtime_collector(true)
                .passive_flush_interval(Duration::from_millis(10))
                .and_then(PrometheusBuilder::build)
                .unwrap();

            // Nothing refreshes the cache until the exporter runs.
            tokio::time::sleep(Duration::from_millis(50)).await;
            counter.inc(1);
            sink.refresh();
            counter.inc(1);
            assert_eq!(&sink.scrape()[..], b"t1_k1 1.0\n");

            let exporter = tokio::spawn(exporter);
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(&sink.scrape()[..], b"t1_k1 2.0\n");

            exporter.abort();
            assert!(exporter.await.unwrap_err().is_cancelled());
            tokio::time::sleep(Duration::from_millis(50)).await;

            counter.inc(1);
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(&sink.scrape()[..], b"t1_k1 2.0\n");
        });
    }

    #[test]
    fn test_default_manager_is_global() {
        let sink = PrometheusBuilder::new().disable_process_collector(true).build_sink();
        assert!(Arc::ptr_eq(sink.manager(), &RegistryManager::global()));
    }
}
