//! Single-attempt uploads.

use log::{debug, error, warn};

use super::{
    request::RequestBuilder,
    status::UploadStatus,
    transport::HttpTransport,
};

/// Sends one batch per call and classifies the outcome.
///
/// The call blocks until the transport returns. It never retries and keeps
/// no state between calls.
pub struct DataUploader {
    feature: String,
    request_builder: RequestBuilder,
    transport: Box<dyn HttpTransport>,
}

impl DataUploader {
    pub fn new(
        feature: impl Into<String>,
        request_builder: RequestBuilder,
        transport: Box<dyn HttpTransport>,
    ) -> Self {
        Self {
            feature: feature.into(),
            request_builder,
            transport,
        }
    }

    /// Upload `payload` and classify the response.
    pub fn upload(&self, payload: &[u8]) -> UploadStatus {
        let request = self.request_builder.build_request(payload);
        let status = match self.transport.send(&request) {
            Ok(code) => UploadStatus::from_status_code(code),
            Err(err) => {
                debug!("{} upload failed: {err}", self.feature);
                UploadStatus::NetworkError
            }
        };
        match status {
            UploadStatus::ClientAuthError => error!(
                "{} upload rejected: the collector refused the credential",
                self.feature
            ),
            UploadStatus::Unknown(code) => warn!(
                "{} upload returned unexpected status {code}; the collector may speak a different protocol",
                self.feature
            ),
            _ => debug!("{} upload finished: {status}", self.feature),
        }
        status
    }

    /// The endpoint URL including query items.
    pub fn url(&self) -> &str {
        self.request_builder.url()
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }
}

impl std::fmt::Debug for DataUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataUploader")
            .field("feature", &self.feature)
            .field("request_builder", &self.request_builder)
            .finish_non_exhaustive()
    }
}
