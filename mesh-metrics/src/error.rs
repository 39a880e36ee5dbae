use thiserror::Error as ThisError;

use crate::MetricKind;

/// Errors that can occur while looking up registries or metrics.
///
/// Every variant is a usage error: the operation that produced it made no change to the registry
/// or manager it was called on.
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum MetricsError {
    /// A metric key was requested as a different kind than it was first registered as.
    #[error("metric `{key}` is registered as a {existing}, not a {requested}")]
    KindConflict {
        /// The conflicting metric key.
        key: String,
        /// The kind the key was first registered as.
        existing: MetricKind,
        /// The kind that was requested.
        requested: MetricKind,
    },

    /// A registry identity was given an empty type name.
    #[error("registry type name must not be empty")]
    EmptyTypeName,

    /// A registry identity was given a label with an empty key.
    #[error("registry `{type_name}` has a label with an empty key")]
    EmptyLabelKey {
        /// The type name of the rejected identity.
        type_name: String,
    },
}
