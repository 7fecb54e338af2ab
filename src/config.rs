//! Validated configuration for one upload worker.
//!
//! [`UploadWorkerBuilder`](crate::UploadWorkerBuilder) constructs these
//! values before handing them to the worker. Construction is the only place
//! where the pipeline reports errors to the integrator.

use std::{fmt, io, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    preset::PerformancePreset,
    rate_limited_warner::DEFAULT_WARN_INTERVAL,
    upload::{ContentType, Credential, DEFAULT_CONNECT_TIMEOUT, HttpHeader, QueryItem},
};

/// Errors raised while configuring an upload worker.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid user supplied configuration.
    #[error("invalid upload configuration: {0}")]
    InvalidConfig(String),
    /// The TLS connector for the HTTP client could not be created.
    #[error("failed to initialise TLS: {0}")]
    Tls(#[from] native_tls::Error),
    /// The worker thread could not be spawned.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// System readiness gate consulted before every upload cycle.
pub type UploadCondition = Arc<dyn Fn() -> bool + Send + Sync>;

/// Everything needed to assemble the uploader and worker for one feature.
#[derive(Clone)]
pub struct UploadConfig {
    /// Feature name, used in diagnostics and the worker thread name.
    pub feature: String,
    /// Collector endpoint without query items.
    pub endpoint: String,
    pub credential: Credential,
    pub query_items: Vec<QueryItem>,
    pub content_type: ContentType,
    /// `(app name, app version)` rendered into the `User-Agent` header.
    pub user_agent: Option<(String, String)>,
    /// `(source, version)` rendered into the origin headers.
    pub origin: Option<(String, String)>,
    /// Attach a fresh request id header to every upload.
    pub request_id: bool,
    /// Additional headers, applied after the standard ones.
    pub headers: Vec<HttpHeader>,
    pub preset: PerformancePreset,
    pub connect_timeout: Duration,
    /// Interval between rate-limited warnings about abandoned batches.
    pub warn_interval: Duration,
    pub upload_condition: UploadCondition,
}

impl UploadConfig {
    /// Standard headers followed by any custom ones.
    pub fn request_headers(&self) -> Vec<HttpHeader> {
        let mut headers = vec![HttpHeader::content_type(self.content_type)];
        if let Some((app, version)) = &self.user_agent {
            headers.push(HttpHeader::user_agent(app, version));
        }
        headers.push(self.credential.header());
        if let Some((source, version)) = &self.origin {
            headers.push(HttpHeader::origin(source.clone()));
            headers.push(HttpHeader::origin_version(version.clone()));
        }
        if self.request_id {
            headers.push(HttpHeader::request_id());
        }
        headers.extend(self.headers.iter().cloned());
        headers
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feature.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "feature name must not be empty".into(),
            ));
        }
        validate_endpoint(&self.endpoint)?;
        self.credential.validate()?;
        self.preset.validate()?;
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "connect_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("feature", &self.feature)
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential)
            .field("query_items", &self.query_items)
            .field("content_type", &self.content_type)
            .field("preset", &self.preset)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// Default values for the optional parts of an [`UploadConfig`].
pub(crate) struct Defaults;

impl Defaults {
    pub(crate) const CONNECT_TIMEOUT: Duration = DEFAULT_CONNECT_TIMEOUT;
    pub(crate) const WARN_INTERVAL: Duration = DEFAULT_WARN_INTERVAL;

    pub(crate) fn upload_condition() -> UploadCondition {
        Arc::new(|| true)
    }
}

/// Accept absolute `http`/`https` URLs with a host and no whitespace.
pub(crate) fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "endpoint must not be empty".into(),
        ));
    }
    if endpoint.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidConfig(format!(
            "endpoint {endpoint:?} must not contain whitespace"
        )));
    }
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .ok_or_else(|| {
            ConfigError::InvalidConfig(format!("endpoint {endpoint:?} must use http or https"))
        })?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    if host.is_empty() || host.starts_with(':') {
        return Err(ConfigError::InvalidConfig(format!(
            "endpoint {endpoint:?} has no host"
        )));
    }
    Ok(())
}
