//! Exposes [`mesh_metrics`] registries in the Prometheus exposition format.
//!
//! ## Basics
//!
//! The [`PrometheusSink`] walks every registry held by a [`RegistryManager`] and renders all of
//! their metrics as plain-text samples.  It can be served over HTTP as a scrape endpoint, or used
//! directly to [`flush`](PrometheusSink::flush) the output into any writer.
//!
//! ## Naming
//!
//! Sample names are derived from the registry identity and the metric key: the registry's label
//! keys, in sorted order, are followed by its type name and then the metric key, all joined by
//! underscores.  A counter `k1` in the registry `t1{lbk1="lbv1"}` is exposed as:
//!
//! ```text
//! lbk1_t1_k1{lbk1="lbv1"} 0.0
//! ```
//!
//! Histograms are exposed as four samples, suffixed with `_min`, `_max`, `_avg`, and `_count`.
//!
//! ## Passive flush
//!
//! By default, the HTTP listener does not render on every scrape.  Instead, a background task
//! re-renders the output on a fixed interval and scrapes are served from that cached copy, which
//! keeps the cost of a scrape flat no matter how many registries exist.  Rendering happens on
//! Tokio's blocking pool, and the task lives exactly as long as the exporter future.  Passive flush can be
//! disabled with [`PrometheusBuilder::disable_passive_flush`], in which case every scrape renders
//! fresh output.
//!
//! ## Usage
//!
//! ```no_run
//! # use mesh_metrics::{LabelSet, RegistryManager};
//! # use mesh_metrics_exporter_prometheus::PrometheusBuilder;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Serve every registry of the global manager on `0.0.0.0:9090/metrics`.
//! let sink = PrometheusBuilder::new().with_port(9090).install()?;
//!
//! let registry = RegistryManager::global()
//!     .new_or_existing("downstream", LabelSet::new([("listener", "ingress")]))?;
//! registry.counter("requests")?.inc(1);
//!
//! // The sink can also be rendered directly.
//! let output = sink.render();
//! # Ok(())
//! # }
//! ```
//!
//! [`RegistryManager`]: mesh_metrics::RegistryManager
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod collectors;
#[cfg(feature = "async-runtime")]
pub use self::collectors::RuntimeCollector;
pub use self::collectors::{Collector, ProcessCollector};

mod common;
pub use self::common::BuildError;

mod exporter;
#[cfg(feature = "http-listener")]
pub use self::exporter::{ExporterError, ExporterFuture};
pub use self::exporter::builder::PrometheusBuilder;

mod exposition;
pub use self::exposition::{render, write_exposition};

pub mod formatting;

mod sink;
pub use self::sink::PrometheusSink;
