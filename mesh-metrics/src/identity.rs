use std::{fmt, sync::Arc};

use crate::{LabelSet, MetricsError};

/// The identity of a [`Registry`](crate::Registry).
///
/// An identity is a type name paired with a [`LabelSet`].  Two identities are equal when their type
/// names match exactly and their label sets hold the same pairs.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Identity {
    type_name: Arc<str>,
    labels: LabelSet,
}

impl Identity {
    /// Creates a new `Identity`.
    ///
    /// ## Errors
    ///
    /// Returns [`MetricsError::EmptyTypeName`] if `type_name` is empty, and
    /// [`MetricsError::EmptyLabelKey`] if any label has an empty key.
    pub fn new(type_name: &str, labels: LabelSet) -> Result<Self, MetricsError> {
        if type_name.is_empty() {
            return Err(MetricsError::EmptyTypeName);
        }

        if labels.keys().any(str::is_empty) {
            return Err(MetricsError::EmptyLabelKey { type_name: type_name.to_owned() });
        }

        Ok(Identity { type_name: Arc::from(type_name), labels })
    }

    /// Type name of this identity.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Labels of this identity.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name)?;
        if !self.labels.is_empty() {
            let pairs = self
                .labels
                .iter()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect::<Vec<_>>();
            write!(f, "{{{}}}", pairs.join(", "))?;
        }
        Ok(())
    }
}
