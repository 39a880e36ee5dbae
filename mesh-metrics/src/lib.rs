//! Concurrent, label-qualified metric registries.
//!
//! A [`RegistryManager`] maps a registry identity -- a type name plus a [`LabelSet`] -- to exactly
//! one [`Registry`].  Each registry hands out [`Counter`], [`Gauge`] and [`Histogram`] handles by
//! key, and those handles can be updated from any number of threads without coordination.
//!
//! ```rust
//! use mesh_metrics::{LabelSet, RegistryManager};
//!
//! # fn main() -> Result<(), mesh_metrics::MetricsError> {
//! let manager = RegistryManager::new();
//! let labels = LabelSet::new([("listener", "ingress")]);
//!
//! let registry = manager.new_or_existing("downstream", labels.clone())?;
//! registry.counter("requests")?.inc(1);
//!
//! // Asking again for the same identity returns the same registry.
//! let again = manager.new_or_existing("downstream", labels)?;
//! assert_eq!(again.counter("requests")?.value(), 1);
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]

mod data;
pub use self::data::{Counter, Gauge, Histogram, HistogramSnapshot, Metric};

mod error;
pub use self::error::MetricsError;

mod identity;
pub use self::identity::Identity;

mod kind;
pub use self::kind::MetricKind;

mod labels;
pub use self::labels::{Label, LabelSet};

mod manager;
pub use self::manager::RegistryManager;

mod registry;
pub use self::registry::Registry;
