use thiserror::Error;

/// A single request could not complete at the transport level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Connect(e.to_string())
        }
    }
}

/// Why a scrape produced no metadata.
///
/// Only the transient kinds are ever retried; all of them are non-fatal to a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("Not found upstream")]
    NotFound,

    #[error("Rate limited")]
    RateLimited,

    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("Nothing usable extracted: {0}")]
    ParseFailure(String),

    #[error("Extracted text failed validation")]
    ValidationFailure,

    #[error("Metadata store rejected the update: {0}")]
    UpstreamMutationFailure(String),

    #[error("Provider API credentials are not configured")]
    MissingCredentials,

    #[error("Request could not be built: {0}")]
    InvalidRequest(String),
}

impl ScrapeError {
    /// Transient failures must never be turned into negative metadata.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScrapeError::RateLimited
                | ScrapeError::ServerError(_)
                | ScrapeError::NetworkError(_)
                | ScrapeError::HttpStatus(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Metadata store request failed: {0}")]
    Transport(#[from] ScrapeError),

    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    #[error("Invalid response from metadata store: {0}")]
    Decode(String),

    #[error("Metadata store rejected mutation: {0}")]
    Mutation(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD (e.g., 2024-01-15)")]
    InvalidDate(String),

    #[error("Date filter conflict: start {start} is after end {end}")]
    DateRange { start: String, end: String },

    #[error("Strategy '{requested}' not found or doesn't support {mode} scraping. Available: {available:?}")]
    UnknownStrategy {
        requested: String,
        mode: String,
        available: Vec<String>,
    },
}

/// A bulk run could not start or continue.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No strategies support {mode} scraping for {kind}s")]
    NoStrategies { kind: String, mode: String },
}
