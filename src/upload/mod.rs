//! HTTP upload of serialized batches.
//!
//! [`DataUploader`] performs one blocking POST per batch through an
//! injectable [`HttpTransport`] and classifies the outcome as an
//! [`UploadStatus`].
//!
//! # Retry Semantics
//!
//! [`UploadStatus::needs_retry`] is the single retry table used everywhere
//! in the crate:
//!
//! - **2xx / 3xx**: delivered or unrecoverable, release the batch.
//! - **403**: invalid credential, release the batch and log an error.
//! - **408 / 429**: transient, keep the batch.
//! - **Other 4xx**: permanent, release the batch.
//! - **5xx**: transient, keep the batch.
//! - **Network errors**: transient, keep the batch.
//! - **Anything else**: unknown, release the batch and log a warning.

mod request;
mod status;
mod transport;
mod uploader;
mod url_encoding;

pub use request::{
    API_KEY_HEADER, AUTHORIZATION_HEADER, CONTENT_TYPE_HEADER, ContentType, Credential,
    HeaderValue, HeaderValueFn, HttpHeader, HttpMethod, ORIGIN_HEADER, ORIGIN_VERSION_HEADER,
    QueryItem, REQUEST_ID_HEADER, RequestBuilder, USER_AGENT_HEADER, UploadRequest,
};
pub use status::{FORBIDDEN, REQUEST_TIMEOUT, TOO_MANY_REQUESTS, UploadStatus};
pub use transport::{DEFAULT_CONNECT_TIMEOUT, HttpTransport, TransportError, UreqTransport};
pub use uploader::DataUploader;
