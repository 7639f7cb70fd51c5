use thiserror::Error;

/// Errors that can occur while brokering map data
#[derive(Error, Debug)]
pub enum MapDataError {
    /// Network-related errors while downloading tile data
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Errors reported by the map engine through its error channel
    #[error("Engine error: {0}")]
    Engine(String),

    /// Malformed engine payloads or data files
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation referenced a storage key that was never registered
    #[error("Storage '{key}' is not registered")]
    UnregisteredStorage { key: String },

    /// Geographic coordinate or quadkey errors
    #[error("Geographic error: {0}")]
    Geographic(String),

    /// The request's cancellation token was triggered
    #[error("Request cancelled")]
    Cancelled,

    /// Filesystem errors while caching or reading data files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// HTTP request failed
    #[error("HTTP request failed: {status}")]
    HttpError { status: u16 },

    /// Request timeout
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Connection error
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Invalid URL
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
}

pub type Result<T> = std::result::Result<T, MapDataError>;
