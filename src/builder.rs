//! Builder for [`UploadWorker`].
//!
//! The builder collects endpoint, credential and pacing settings, validates
//! them, and spawns the worker thread. It is the only part of the pipeline
//! that returns errors; once running, upload failures are logged and never
//! reach the caller.

use std::{sync::Arc, time::Duration};

use crate::{
    config::{ConfigError, Defaults, UploadCondition, UploadConfig},
    delay::{Delay, UploadDelay},
    preset::PerformancePreset,
    storage::BatchReader,
    upload::{
        ContentType, Credential, DataUploader, HttpHeader, HttpTransport, QueryItem,
        RequestBuilder, UreqTransport,
    },
    worker::{UploadWorker, WorkerParts},
};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value.is_zero() {
            Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for an [`UploadWorker`] serving one telemetry feature.
///
/// ```no_run
/// use std::sync::Arc;
/// use telemetry_uploader::{
///     Credential, MemoryBatchStore, PerformancePreset, QueryItem, UploadWorkerBuilder,
/// };
///
/// let store = Arc::new(MemoryBatchStore::new());
/// let worker = UploadWorkerBuilder::new("logs")
///     .with_endpoint("https://intake.example.com/api/v2/logs")
///     .with_credential(Credential::api_key("secret"))
///     .with_query_item(QueryItem::Source("rust".into()))
///     .with_preset(PerformancePreset::INSTANT_DATA_DELIVERY)
///     .build(store)?;
/// worker.flush();
/// # Ok::<(), telemetry_uploader::ConfigError>(())
/// ```
#[derive(Default)]
pub struct UploadWorkerBuilder {
    feature: String,
    endpoint: Option<String>,
    credential: Option<Credential>,
    query_items: Vec<QueryItem>,
    content_type: Option<ContentType>,
    user_agent: Option<(String, String)>,
    origin: Option<(String, String)>,
    request_id: bool,
    headers: Vec<HttpHeader>,
    preset: Option<PerformancePreset>,
    connect_timeout: Option<Duration>,
    warn_interval: Option<Duration>,
    upload_condition: Option<UploadCondition>,
    delay: Option<Box<dyn Delay>>,
}

impl UploadWorkerBuilder {
    /// Start a builder for `feature`, e.g. `"logs"` or `"traces"`.
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            ..Self::default()
        }
    }

    /// Set the collector endpoint, without query items.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    option_setter!(
        #[doc = "Set the credential sent with every request."]
        with_credential,
        credential,
        Credential
    );
    option_setter!(
        #[doc = "Set the body content type. Defaults to JSON."]
        with_content_type,
        content_type,
        ContentType
    );
    option_setter!(
        #[doc = "Set the pacing preset. Defaults to low runtime impact."]
        with_preset,
        preset,
        PerformancePreset
    );
    option_setter!(
        #[doc = "Set the TCP connect timeout."]
        with_connect_timeout,
        connect_timeout,
        Duration
    );
    option_setter!(
        #[doc = "Set the interval between warnings about abandoned batches."]
        with_warn_interval,
        warn_interval,
        Duration
    );

    /// Append a query item to the upload URL.
    pub fn with_query_item(mut self, item: QueryItem) -> Self {
        self.query_items.push(item);
        self
    }

    /// Send `User-Agent: <app_name>/<app_version> (<os>; <arch>)`.
    pub fn with_user_agent(
        mut self,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        self.user_agent = Some((app_name.into(), app_version.into()));
        self
    }

    /// Send the origin and origin version headers.
    pub fn with_origin(mut self, source: impl Into<String>, version: impl Into<String>) -> Self {
        self.origin = Some((source.into(), version.into()));
        self
    }

    /// Attach a fresh UUID v4 request id to every upload.
    pub fn with_request_id(mut self) -> Self {
        self.request_id = true;
        self
    }

    /// Add a custom header. Later headers replace earlier ones with the same
    /// field, including the standard ones.
    pub fn with_header(mut self, header: HttpHeader) -> Self {
        self.headers.push(header);
        self
    }

    /// Gate every cycle on `condition`; while it returns `false` storage is
    /// not read and the worker backs off.
    pub fn with_upload_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.upload_condition = Some(Arc::new(condition));
        self
    }

    /// Replace the preset-driven [`UploadDelay`] with a custom controller.
    pub fn with_delay(mut self, delay: Box<dyn Delay>) -> Self {
        self.delay = Some(delay);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_none() {
            return Err(ConfigError::InvalidConfig(
                "upload worker requires an endpoint".into(),
            ));
        }
        if self.credential.is_none() {
            return Err(ConfigError::InvalidConfig(
                "upload worker requires a credential".into(),
            ));
        }
        if let Some(timeout) = self.connect_timeout {
            ensure_positive!(timeout, "connect_timeout")?;
        }
        if let Some(interval) = self.warn_interval {
            ensure_positive!(interval, "warn_interval")?;
        }
        Ok(())
    }

    /// Validate the settings and assemble an [`UploadConfig`].
    pub fn build_config(&self) -> Result<UploadConfig, ConfigError> {
        self.validate()?;
        let config = UploadConfig {
            feature: self.feature.clone(),
            endpoint: self.endpoint.clone().unwrap_or_default(),
            credential: self
                .credential
                .clone()
                .ok_or_else(|| ConfigError::InvalidConfig("missing credential".into()))?,
            query_items: self.query_items.clone(),
            content_type: self.content_type.unwrap_or(ContentType::ApplicationJson),
            user_agent: self.user_agent.clone(),
            origin: self.origin.clone(),
            request_id: self.request_id,
            headers: self.headers.clone(),
            preset: self.preset.unwrap_or_default(),
            connect_timeout: self.connect_timeout.unwrap_or(Defaults::CONNECT_TIMEOUT),
            warn_interval: self.warn_interval.unwrap_or(Defaults::WARN_INTERVAL),
            upload_condition: self
                .upload_condition
                .clone()
                .unwrap_or_else(Defaults::upload_condition),
        };
        config.validate()?;
        Ok(config)
    }

    /// Spawn the worker with the default `ureq` transport.
    pub fn build(self, reader: Arc<dyn BatchReader>) -> Result<UploadWorker, ConfigError> {
        let config = self.build_config()?;
        let transport = UreqTransport::new(config.connect_timeout, config.preset.request_timeout)?;
        self.spawn(config, reader, Box::new(transport))
    }

    /// Spawn the worker with a caller-supplied transport.
    pub fn build_with_transport(
        self,
        reader: Arc<dyn BatchReader>,
        transport: Box<dyn HttpTransport>,
    ) -> Result<UploadWorker, ConfigError> {
        let config = self.build_config()?;
        self.spawn(config, reader, transport)
    }

    fn spawn(
        self,
        config: UploadConfig,
        reader: Arc<dyn BatchReader>,
        transport: Box<dyn HttpTransport>,
    ) -> Result<UploadWorker, ConfigError> {
        let request_builder = RequestBuilder::new(
            &config.endpoint,
            &config.query_items,
            config.request_headers(),
        );
        let uploader = DataUploader::new(config.feature.clone(), request_builder, transport);
        let delay = self
            .delay
            .unwrap_or_else(|| Box::new(UploadDelay::new(&config.preset)));
        UploadWorker::spawn(WorkerParts {
            reader,
            uploader,
            upload_condition: config.upload_condition,
            delay,
            warn_interval: config.warn_interval,
        })
    }
}

impl std::fmt::Debug for UploadWorkerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadWorkerBuilder")
            .field("feature", &self.feature)
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential)
            .field("query_items", &self.query_items)
            .field("preset", &self.preset)
            .field("custom_delay", &self.delay.is_some())
            .finish_non_exhaustive()
    }
}
