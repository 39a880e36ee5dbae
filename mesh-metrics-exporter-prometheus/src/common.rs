use thiserror::Error;

/// Errors that could occur while building or installing a Prometheus sink/exporter.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Creating the networking event loop did not succeed.
    #[error("failed to spawn Tokio runtime for endpoint: {0}")]
    FailedToCreateRuntime(String),

    /// Binding/listening to the given address did not succeed.
    #[error("failed to bind to given listen address: {0}")]
    FailedToCreateHTTPListener(String),

    /// The scrape endpoint path was not valid.
    #[error("invalid scrape endpoint '{0}': must begin with '/'")]
    InvalidEndpoint(String),

    /// The passive flush interval was zero.
    #[error("passive flush interval must be greater than zero")]
    ZeroFlushInterval,
}

#[cfg(test)]
mod tests {
    use super::BuildError;

    #[test]
    fn test_display() {
        assert_eq!(
            BuildError::InvalidEndpoint("metrics".to_owned()).to_string(),
            "invalid scrape endpoint 'metrics': must begin with '/'"
        );
        assert_eq!(
            BuildError::ZeroFlushInterval.to_string(),
            "passive flush interval must be greater than zero"
        );
    }
}
