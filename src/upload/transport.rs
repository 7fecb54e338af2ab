//! HTTP transports used by [`DataUploader`](super::DataUploader).
//!
//! The uploader only needs "send this request, give me a status code or a
//! transport error", expressed by [`HttpTransport`]. [`UreqTransport`] is
//! the production implementation; tests substitute deterministic doubles.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use ureq::{Agent, AgentBuilder};

use crate::config::ConfigError;

use super::request::UploadRequest;

/// Default timeout for establishing a connection to the collector.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure to obtain any HTTP response.
#[derive(Clone, Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Sends a request and reports the HTTP status code.
///
/// Implementations block the calling thread until a response or a
/// transport failure is observed. Non-2xx statuses are responses, not
/// errors.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &UploadRequest) -> Result<u16, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn send(&self, request: &UploadRequest) -> Result<u16, TransportError> {
        (**self).send(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    fn send(&self, request: &UploadRequest) -> Result<u16, TransportError> {
        (**self).send(request)
    }
}

/// [`HttpTransport`] backed by a pooled `ureq::Agent`.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Build an agent with the given timeouts.
    ///
    /// Redirects are not followed so that a 3xx reaches the classifier
    /// instead of being replayed as a GET.
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, ConfigError> {
        let tls = native_tls::TlsConnector::new()?;
        let agent = AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout(request_timeout)
            .redirects(0)
            .tls_connector(Arc::new(tls))
            .build();
        Ok(Self { agent })
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &UploadRequest) -> Result<u16, TransportError> {
        let mut req = self.agent.request(request.method.as_str(), &request.url);
        for (field, value) in &request.headers {
            req = req.set(field, value);
        }
        match req.send_bytes(&request.body) {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(ureq::Error::Transport(err)) => Err(TransportError(err.to_string())),
        }
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}
