//! Batched, retry-driven upload of telemetry to an HTTP collector.
//!
//! Producers write serialized batches to a [`BatchReader`] implementation.
//! One [`UploadWorker`] per feature takes the oldest batch, POSTs it with
//! the configured headers and query items, and deletes it unless the
//! outcome is transient. The interval between attempts adapts to the
//! outcomes through a [`Delay`] controller. [`UploadWorker::flush`] drains
//! storage on demand, for example at shutdown.
//!
//! ```no_run
//! use std::sync::Arc;
//! use telemetry_uploader::{
//!     Credential, DirectoryBatchStore, QueryItem, TelemetryUploads, UploadWorkerBuilder,
//! };
//!
//! let store = Arc::new(DirectoryBatchStore::open("/var/tmp/telemetry/logs")?);
//! store.write(br#"[{"message":"hello"}]"#)?;
//!
//! let logs = UploadWorkerBuilder::new("logs")
//!     .with_endpoint("https://intake.example.com/api/v2/logs")
//!     .with_credential(Credential::api_key("secret"))
//!     .with_query_item(QueryItem::Source("rust".into()))
//!     .with_request_id()
//!     .build(store)?;
//!
//! let mut uploads = TelemetryUploads::new().with_worker(logs);
//! uploads.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod config;
mod delay;
mod preset;
mod rate_limited_warner;
mod storage;
mod upload;
mod uploads;
mod worker;

#[cfg(test)]
mod test_support;

pub use builder::UploadWorkerBuilder;
pub use config::{ConfigError, UploadCondition, UploadConfig};
pub use delay::{Delay, UploadDelay};
pub use preset::{DEFAULT_REQUEST_TIMEOUT, PerformancePreset};
pub use rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
pub use storage::{Batch, BatchId, BatchReader, DirectoryBatchStore, MemoryBatchStore};
pub use upload::{
    API_KEY_HEADER, AUTHORIZATION_HEADER, CONTENT_TYPE_HEADER, ContentType, Credential,
    DEFAULT_CONNECT_TIMEOUT, DataUploader, FORBIDDEN, HeaderValue, HeaderValueFn, HttpHeader,
    HttpMethod, HttpTransport, ORIGIN_HEADER, ORIGIN_VERSION_HEADER, QueryItem, REQUEST_ID_HEADER,
    REQUEST_TIMEOUT, RequestBuilder, TOO_MANY_REQUESTS, TransportError, USER_AGENT_HEADER,
    UploadRequest, UploadStatus, UreqTransport,
};
pub use uploads::TelemetryUploads;
pub use worker::UploadWorker;
