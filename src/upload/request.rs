//! Assembly of outbound upload requests.
//!
//! [`RequestBuilder`] is created once per feature. Query items are encoded
//! into the URL at construction, constant headers are cached, and only
//! dynamic headers (such as the per-request id) are evaluated for each
//! upload.

use std::{collections::HashMap, fmt, sync::Arc};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};

use crate::config::ConfigError;

use super::url_encoding::append_query;

/// `Content-Type` header field.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
/// `User-Agent` header field.
pub const USER_AGENT_HEADER: &str = "User-Agent";
/// `Authorization` header field used by bearer and basic credentials.
pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Default header carrying an API key credential.
pub const API_KEY_HEADER: &str = "DD-API-KEY";
/// Header naming the component that produced the payload.
pub const ORIGIN_HEADER: &str = "DD-EVP-ORIGIN";
/// Header carrying the version of the producing component.
pub const ORIGIN_VERSION_HEADER: &str = "DD-EVP-ORIGIN-VERSION";
/// Header carrying a fresh id for every request.
pub const REQUEST_ID_HEADER: &str = "DD-REQUEST-ID";

/// HTTP methods used for uploads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Post,
}

impl HttpMethod {
    /// Convert to the string representation used by ureq.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
        }
    }
}

/// Query items appended to the endpoint URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryItem {
    /// `ddsource=<source>`.
    Source(String),
    /// `ddtags=<tag1>,<tag2>,...`.
    Tags(Vec<String>),
    /// Any other `name=value` pair.
    Custom { name: String, value: String },
}

impl QueryItem {
    fn pair(&self) -> (&str, String) {
        match self {
            Self::Source(source) => ("ddsource", source.clone()),
            Self::Tags(tags) => ("ddtags", tags.join(",")),
            Self::Custom { name, value } => (name.as_str(), value.clone()),
        }
    }
}

/// Payload content types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentType {
    #[default]
    ApplicationJson,
    TextPlainUtf8,
    ApplicationProtobuf,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationJson => "application/json",
            Self::TextPlainUtf8 => "text/plain;charset=UTF-8",
            Self::ApplicationProtobuf => "application/x-protobuf",
        }
    }
}

/// Credential attached to every upload.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Key sent verbatim in a dedicated header.
    ApiKey { header: String, key: String },
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },
    /// `Authorization: Basic base64(<username>:<password>)`.
    Basic { username: String, password: String },
}

impl Credential {
    /// API key carried in [`API_KEY_HEADER`].
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey {
            header: API_KEY_HEADER.to_string(),
            key: key.into(),
        }
    }

    /// Reject credentials that can never authenticate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let empty = match self {
            Self::ApiKey { header, key } => {
                if header.trim().is_empty() {
                    return Err(ConfigError::InvalidConfig(
                        "credential header name must not be empty".into(),
                    ));
                }
                key.trim().is_empty()
            }
            Self::Bearer { token } => token.trim().is_empty(),
            Self::Basic { username, .. } => username.trim().is_empty(),
        };
        if empty {
            return Err(ConfigError::InvalidConfig(
                "credential must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The header carrying this credential.
    pub fn header(&self) -> HttpHeader {
        match self {
            Self::ApiKey { header, key } => HttpHeader::constant(header.clone(), key.clone()),
            Self::Bearer { token } => {
                HttpHeader::constant(AUTHORIZATION_HEADER, format!("Bearer {token}"))
            }
            Self::Basic { username, password } => {
                let encoded = base64_encode(format!("{username}:{password}").as_bytes());
                HttpHeader::constant(AUTHORIZATION_HEADER, format!("Basic {encoded}"))
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey { header, .. } => f
                .debug_struct("ApiKey")
                .field("header", header)
                .finish_non_exhaustive(),
            Self::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Base64-encode a byte slice for Basic auth.
fn base64_encode(input: &[u8]) -> String {
    BASE64_STANDARD.encode(input)
}

/// Producer of a header value evaluated for every request.
pub type HeaderValueFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Value of a request header.
#[derive(Clone)]
pub enum HeaderValue {
    /// Computed once and cached.
    Constant(String),
    /// Recomputed for every request.
    Dynamic(HeaderValueFn),
}

impl fmt::Debug for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// A header field paired with its value.
#[derive(Clone, Debug)]
pub struct HttpHeader {
    pub field: String,
    pub value: HeaderValue,
}

impl HttpHeader {
    pub fn constant(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: HeaderValue::Constant(value.into()),
        }
    }

    pub fn dynamic<F>(field: impl Into<String>, value: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            value: HeaderValue::Dynamic(Arc::new(value)),
        }
    }

    /// Standard `Content-Type` header.
    pub fn content_type(content_type: ContentType) -> Self {
        Self::constant(CONTENT_TYPE_HEADER, content_type.as_str())
    }

    /// `User-Agent: <app>/<version> (<os>; <arch>)`.
    pub fn user_agent(app_name: &str, app_version: &str) -> Self {
        Self::constant(
            USER_AGENT_HEADER,
            format!(
                "{app_name}/{app_version} ({}; {})",
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
        )
    }

    /// Origin of the payload, for collector-side troubleshooting.
    pub fn origin(source: impl Into<String>) -> Self {
        Self::constant(ORIGIN_HEADER, source)
    }

    /// Version of the payload origin.
    pub fn origin_version(version: impl Into<String>) -> Self {
        Self::constant(ORIGIN_VERSION_HEADER, version)
    }

    /// A fresh UUID v4 for every request.
    pub fn request_id() -> Self {
        Self::dynamic(REQUEST_ID_HEADER, || uuid::Uuid::new_v4().to_string())
    }
}

/// Fully assembled upload request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl UploadRequest {
    /// Look up a header value by case-insensitive field name.
    pub fn header(&self, field: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, value)| value.as_str())
    }
}

/// Builds [`UploadRequest`] values for one endpoint.
#[derive(Clone)]
pub struct RequestBuilder {
    url: String,
    precomputed_headers: HashMap<String, String>,
    computed_headers: Vec<(String, HeaderValueFn)>,
}

impl RequestBuilder {
    /// Encode `query_items` into `url` and split `headers` into cached and
    /// per-request sets. A later header replaces an earlier one with the
    /// same field.
    pub fn new(url: &str, query_items: &[QueryItem], headers: Vec<HttpHeader>) -> Self {
        let pairs: Vec<(&str, String)> = query_items.iter().map(QueryItem::pair).collect();
        let url = append_query(url, pairs.iter().map(|(name, value)| (*name, value.as_str())));

        let mut precomputed_headers = HashMap::new();
        let mut computed_headers: Vec<(String, HeaderValueFn)> = Vec::new();
        for header in headers {
            computed_headers.retain(|(field, _)| !field.eq_ignore_ascii_case(&header.field));
            precomputed_headers.retain(|field: &String, _| !field.eq_ignore_ascii_case(&header.field));
            match header.value {
                HeaderValue::Constant(value) => {
                    precomputed_headers.insert(header.field, value);
                }
                HeaderValue::Dynamic(value) => computed_headers.push((header.field, value)),
            }
        }

        Self {
            url,
            precomputed_headers,
            computed_headers,
        }
    }

    /// The endpoint URL including encoded query items.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build a POST request carrying `payload` verbatim.
    pub fn build_request(&self, payload: &[u8]) -> UploadRequest {
        let mut headers = self.precomputed_headers.clone();
        for (field, value) in &self.computed_headers {
            headers.insert(field.clone(), value());
        }
        UploadRequest {
            url: self.url.clone(),
            method: HttpMethod::Post,
            headers,
            body: payload.to_vec(),
        }
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dynamic: Vec<&str> = self
            .computed_headers
            .iter()
            .map(|(field, _)| field.as_str())
            .collect();
        f.debug_struct("RequestBuilder")
            .field("url", &self.url)
            .field("constant_headers", &self.precomputed_headers.keys())
            .field("dynamic_headers", &dynamic)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn builder() -> RequestBuilder {
        RequestBuilder::new(
            "https://intake.example.com/api/v2/logs",
            &[
                QueryItem::Source("rust".into()),
                QueryItem::Tags(vec!["env:prod".into(), "service:api".into()]),
            ],
            vec![
                HttpHeader::content_type(ContentType::ApplicationJson),
                Credential::api_key("secret").header(),
                HttpHeader::origin("rust"),
                HttpHeader::request_id(),
            ],
        )
    }

    #[rstest]
    fn encodes_query_items_once(builder: RequestBuilder) {
        assert_eq!(
            builder.url(),
            "https://intake.example.com/api/v2/logs?ddsource=rust&ddtags=env:prod,service:api"
        );
        let request = builder.build_request(b"x");
        assert_eq!(request.url, builder.url());
    }

    #[rstest]
    fn body_is_payload_verbatim(builder: RequestBuilder) {
        let request = builder.build_request(b"[{\"k\":\"v\"}]");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, b"[{\"k\":\"v\"}]");
    }

    #[rstest]
    fn merges_constant_and_dynamic_headers(builder: RequestBuilder) {
        let request = builder.build_request(b"");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header(API_KEY_HEADER), Some("secret"));
        assert_eq!(request.header(ORIGIN_HEADER), Some("rust"));
        let id = request.header(REQUEST_ID_HEADER).expect("request id");
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[rstest]
    fn request_id_changes_per_request(builder: RequestBuilder) {
        let first = builder.build_request(b"");
        let second = builder.build_request(b"");
        assert_ne!(
            first.header(REQUEST_ID_HEADER),
            second.header(REQUEST_ID_HEADER)
        );
        assert_eq!(first.header(API_KEY_HEADER), second.header(API_KEY_HEADER));
    }

    #[test]
    fn only_dynamic_headers_are_recomputed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let builder = RequestBuilder::new(
            "http://localhost/upload",
            &[],
            vec![
                HttpHeader::constant("X-Static", "fixed"),
                HttpHeader::dynamic("X-Counter", move || {
                    (counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
                }),
            ],
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let first = builder.build_request(b"");
        let second = builder.build_request(b"");
        assert_eq!(first.header("X-Counter"), Some("1"));
        assert_eq!(second.header("X-Counter"), Some("2"));
        assert_eq!(second.header("X-Static"), Some("fixed"));
    }

    #[test]
    fn later_header_replaces_earlier_one() {
        let builder = RequestBuilder::new(
            "http://localhost/upload",
            &[],
            vec![
                HttpHeader::dynamic("X-Value", || "dynamic".into()),
                HttpHeader::constant("x-value", "constant"),
            ],
        );
        let request = builder.build_request(b"");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("X-Value"), Some("constant"));
    }

    #[rstest]
    #[case(Credential::Bearer { token: "tok".into() }, "Bearer tok")]
    #[case(
        Credential::Basic { username: "user".into(), password: "pass".into() },
        "Basic dXNlcjpwYXNz"
    )]
    fn authorization_credentials(#[case] credential: Credential, #[case] expected: &str) {
        let header = credential.header();
        assert_eq!(header.field, AUTHORIZATION_HEADER);
        match header.value {
            HeaderValue::Constant(value) => assert_eq!(value, expected),
            HeaderValue::Dynamic(_) => panic!("credential header should be constant"),
        }
    }

    #[rstest]
    #[case(Credential::api_key(""))]
    #[case(Credential::api_key("   "))]
    #[case(Credential::ApiKey { header: "".into(), key: "k".into() })]
    #[case(Credential::Bearer { token: "".into() })]
    #[case(Credential::Basic { username: "".into(), password: "p".into() })]
    fn empty_credentials_are_rejected(#[case] credential: Credential) {
        assert!(credential.validate().is_err());
    }

    #[test]
    fn credential_debug_hides_secret() {
        let rendered = format!("{:?}", Credential::api_key("top-secret"));
        assert!(!rendered.contains("top-secret"));
    }

    #[test]
    fn user_agent_names_app_and_platform() {
        let header = HttpHeader::user_agent("demo", "1.2.3");
        let HeaderValue::Constant(value) = header.value else {
            panic!("user agent should be constant");
        };
        assert!(value.starts_with("demo/1.2.3 ("));
        assert!(value.contains(std::env::consts::OS));
    }
}
