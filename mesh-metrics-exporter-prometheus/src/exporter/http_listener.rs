use std::{net::SocketAddr, sync::Arc};

use http_body_util::Full;
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE},
    server::conn::http1::Builder as HyperHttpBuilder,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::{common::BuildError, ExporterError, ExporterFuture, PrometheusSink};

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

struct HttpListeningExporter {
    inner: Arc<Inner>,
}

struct Inner {
    sink: PrometheusSink,
    endpoint: String,
}

impl HttpListeningExporter {
    async fn serve(&self, listener: std::net::TcpListener) -> Result<(), ExporterError> {
        let listener = TcpListener::from_std(listener)?;

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("Error accepting connection. Ignoring request. Error: {:?}", e);
                    continue;
                }
            };

            self.process_stream(stream).await;
        }
    }

    async fn process_stream(&self, stream: TcpStream) {
        let inner = self.inner.clone();
        let service = service_fn(move |req: Request<Incoming>| {
            let inner = inner.clone();
            let method = req.method().clone();
            let path = req.uri().path().to_owned();
            async move { Self::handle_http_request(&inner, &method, &path).await }
        });

        tokio::task::spawn(async move {
            if let Err(err) =
                HyperHttpBuilder::new().serve_connection(TokioIo::new(stream), service).await
            {
                warn!("Error serving connection.  Error: {:?}", err);
            };
        });
    }

    async fn handle_http_request(
        inner: &Inner,
        method: &Method,
        path: &str,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        if path != inner.endpoint {
            debug!(path, "scrape request for unknown path");
            return Ok(Self::new_response(StatusCode::NOT_FOUND, Bytes::new()));
        }

        let response = match *method {
            // HEAD renders the same body so its length matches GET; hyper omits it on the wire.
            Method::GET | Method::HEAD => {
                let sink = inner.sink.clone();
                match tokio::task::spawn_blocking(move || sink.scrape()).await {
                    Ok(body) => Self::new_scrape_response(body),
                    Err(e) => {
                        warn!("Error rendering scrape output.  Error: {:?}", e);
                        Self::new_response(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new())
                    }
                }
            }
            _ => {
                let mut response = Self::new_response(StatusCode::METHOD_NOT_ALLOWED, Bytes::new());
                response.headers_mut().insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
                response
            }
        };

        Ok(response)
    }

    fn new_scrape_response(body: Bytes) -> Response<Full<Bytes>> {
        let length = HeaderValue::from(body.len());
        let mut response = Self::new_response(StatusCode::OK, body);
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE));
        headers.insert(CONTENT_LENGTH, length);
        response
    }

    fn new_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        response
    }
}

/// Creates an `ExporterFuture` implementing a http listener that serves the sink's output on
/// `endpoint`.
///
/// # Errors
/// Will return Err if it cannot bind to the listen address
pub(crate) fn new_http_listener(
    sink: PrometheusSink,
    listen_address: SocketAddr,
    endpoint: String,
) -> Result<ExporterFuture, BuildError> {
    let listener = std::net::TcpListener::bind(listen_address)
        .and_then(|listener| {
            listener.set_nonblocking(true)?;
            Ok(listener)
        })
        .map_err(|e| BuildError::FailedToCreateHTTPListener(e.to_string()))?;

    let exporter = HttpListeningExporter { inner: Arc::new(Inner { sink, endpoint }) };

    Ok(Box::pin(async move { exporter.serve(listener).await }))
}
