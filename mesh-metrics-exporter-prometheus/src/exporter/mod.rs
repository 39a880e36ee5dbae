#[cfg(feature = "http-listener")]
use std::{future::Future, io, pin::Pin};

#[cfg(feature = "http-listener")]
use thiserror::Error;

/// Error types possible from an exporter
#[cfg(feature = "http-listener")]
#[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
#[derive(Debug, Error)]
pub enum ExporterError {
    /// The HTTP listener could not keep serving.
    #[error("HTTP listener failed: {0}")]
    HttpListener(#[from] io::Error),
}

/// Convenience type for Future implementing an exporter.
#[cfg(feature = "http-listener")]
#[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
pub type ExporterFuture = Pin<Box<dyn Future<Output = Result<(), ExporterError>> + Send + 'static>>;

#[cfg(feature = "http-listener")]
mod http_listener;

pub(crate) mod builder;
