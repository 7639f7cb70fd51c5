use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::NetworkError;

/// Result type for HTTP operations
pub type HttpResult<T> = Result<T, HttpError>;

/// HTTP client errors
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum HttpError {
    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("HTTP error: {status}")]
    HttpStatus { status: u16 },

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Network error: {message}")]
    Network { message: String },
}

impl From<HttpError> for NetworkError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::HttpStatus { status } => NetworkError::HttpError { status },
            HttpError::Timeout { seconds } => NetworkError::Timeout { seconds },
            HttpError::RequestFailed { message } | HttpError::Network { message } => {
                NetworkError::Connection { message }
            }
        }
    }
}

impl From<HttpError> for crate::MapDataError {
    fn from(error: HttpError) -> Self {
        crate::MapDataError::Network(error.into())
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client usable from native and browser builds
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Make a GET request
    async fn get(&self, url: &str) -> HttpResult<HttpResponse>;

    /// Make a POST request with form data
    async fn post_form(&self, url: &str, form_data: &[(&str, &str)]) -> HttpResult<HttpResponse>;

    /// Make a POST request with JSON body
    async fn post_json(&self, url: &str, json: &str) -> HttpResult<HttpResponse>;

    /// Check that `url` answers at all
    async fn test_connectivity(&self, url: &str) -> HttpResult<()>;
}

/// Configuration for HTTP clients
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub default_headers: HashMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: format!("osm-map-broker/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}
