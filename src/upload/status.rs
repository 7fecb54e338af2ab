//! Classification of a single upload attempt.

use std::fmt;

/// `408 Request Timeout`: the server gave up waiting for the request.
pub const REQUEST_TIMEOUT: u16 = 408;
/// `429 Too Many Requests`: the client is being throttled.
pub const TOO_MANY_REQUESTS: u16 = 429;
/// `403 Forbidden`: the credential was rejected.
pub const FORBIDDEN: u16 = 403;

/// Outcome of one upload attempt.
///
/// HTTP variants keep the status code for diagnostics. [`needs_retry`]
/// decides whether the batch stays in storage for a later cycle.
///
/// [`needs_retry`]: UploadStatus::needs_retry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UploadStatus {
    /// 2xx: the collector took the batch.
    Accepted(u16),
    /// 3xx: redirects are not followed.
    Redirection(u16),
    /// 403: the credential is invalid.
    ClientAuthError,
    /// 4xx other than 403.
    ClientError(u16),
    /// 5xx.
    ServerError(u16),
    /// No response was received.
    NetworkError,
    /// A status outside every known class.
    Unknown(u16),
}

impl UploadStatus {
    /// Classify an HTTP response status code.
    ///
    /// # Classification rules
    ///
    /// * **200–299** → [`UploadStatus::Accepted`]
    /// * **300–399** → [`UploadStatus::Redirection`]
    /// * **403** → [`UploadStatus::ClientAuthError`]
    /// * **400–499** → [`UploadStatus::ClientError`]
    /// * **500–599** → [`UploadStatus::ServerError`]
    /// * **Other** → [`UploadStatus::Unknown`]
    pub fn from_status_code(code: u16) -> Self {
        match code {
            200..=299 => Self::Accepted(code),
            300..=399 => Self::Redirection(code),
            FORBIDDEN => Self::ClientAuthError,
            400..=499 => Self::ClientError(code),
            500..=599 => Self::ServerError(code),
            _ => Self::Unknown(code),
        }
    }

    /// Whether the batch should be kept and attempted again later.
    ///
    /// Transport failures, server errors, request timeouts and throttling
    /// are transient. Everything else either succeeded or will never
    /// succeed, so the batch is released. Unknown codes are released too.
    pub fn needs_retry(&self) -> bool {
        match self {
            Self::NetworkError | Self::ServerError(_) => true,
            Self::ClientError(code) => matches!(*code, REQUEST_TIMEOUT | TOO_MANY_REQUESTS),
            Self::Accepted(_) | Self::Redirection(_) | Self::ClientAuthError | Self::Unknown(_) => {
                false
            }
        }
    }

    /// A 4xx the collector will never accept, so the batch is dropped.
    ///
    /// Invalid credentials are excluded; they have their own report.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::ClientError(_)) && !self.needs_retry()
    }

    /// HTTP status code, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Accepted(code)
            | Self::Redirection(code)
            | Self::ClientError(code)
            | Self::ServerError(code)
            | Self::Unknown(code) => Some(*code),
            Self::ClientAuthError => Some(FORBIDDEN),
            Self::NetworkError => None,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted(code) => write!(f, "accepted ({code})"),
            Self::Redirection(code) => write!(f, "redirection ({code})"),
            Self::ClientAuthError => write!(f, "invalid credential ({FORBIDDEN})"),
            Self::ClientError(code) => write!(f, "client error ({code})"),
            Self::ServerError(code) => write!(f, "server error ({code})"),
            Self::NetworkError => write!(f, "network error"),
            Self::Unknown(code) => write!(f, "unexpected status ({code})"),
        }
    }
}
