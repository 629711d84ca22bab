// ABOUTME: HTTP health check issued with hyper over a plain TCP connection.
// ABOUTME: Any 2xx response passes; everything else is a ProbeError.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use super::{HealthCheck, ProbeError};
use crate::inventory::Target;

const USER_AGENT: &str = concat!("tranche/", env!("CARGO_PKG_VERSION"));

/// `GET` the target's health endpoint over HTTP/1.1.
///
/// Only `http://` endpoints are supported; probes are expected to hit a pod or
/// instance address directly rather than go through a TLS-terminating proxy.
/// The per-attempt timeout is applied by [`super::HealthProber`].
#[derive(Debug, Clone, Default)]
pub struct HttpHealthCheck;

impl HttpHealthCheck {
    pub fn new() -> Self {
        Self
    }
}

/// Check that `endpoint` is something [`HttpHealthCheck`] can probe.
pub fn validate_endpoint(endpoint: &str) -> Result<(), ProbeError> {
    resolve(endpoint).map(|_| ())
}

/// Split an endpoint into the socket address to dial and the request URI.
fn resolve(endpoint: &str) -> Result<(String, Uri), ProbeError> {
    let invalid = |reason: &str| ProbeError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = endpoint.parse().map_err(|_| invalid("not a valid URI"))?;

    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        None => return Err(invalid("missing scheme")),
    }

    let host = uri.host().ok_or_else(|| invalid("missing host"))?;
    let port = uri.port_u16().unwrap_or(80);
    Ok((format!("{host}:{port}"), uri))
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, target: &Target) -> Result<(), ProbeError> {
        let (address, uri) = resolve(&target.health_endpoint)?;

        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| ProbeError::Connect(format!("{address}: {e}")))?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ProbeError::Connect(format!("{address}: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();

        let request = hyper::Request::builder()
            .method("GET")
            .uri(path)
            .header(hyper::header::HOST, address.as_str())
            .header(hyper::header::USER_AGENT, USER_AGENT)
            .header(hyper::header::CONNECTION, "close")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}
