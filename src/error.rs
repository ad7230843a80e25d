use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad credential descriptor: {0}")]
    BadCredentialDescriptor(String),

    #[error("Credential construction failed: {0}")]
    CredentialConstructionFailed(String),

    #[error("Corrupt pool file {path}: {reason}")]
    CorruptPool { path: PathBuf, reason: String },

    #[error("Credential pool is empty")]
    EmptyPool,

    #[error("Reset timestamp {reset} is not in the future")]
    BadReset { reset: i64 },

    #[error("No current credential for scope `{scope}`; call get_token first")]
    NoCurrent { scope: String },

    #[error("No credentials available: install a token or populate the pool")]
    NoCredentials,

    #[error("Bad API path `{0}`: expected at least namespace/method")]
    BadApiPath(String),

    #[error("Unknown API route: {0}")]
    UnknownApiRoute(String),

    #[error("Unexpected API response: {0}")]
    UnexpectedApiResponse(String),

    #[error("Retries exhausted after {attempts} attempts: {context}")]
    RetryExhausted { attempts: u32, context: String },

    #[error("Failed to fetch HTML page {url}: {reason}")]
    HtmlFetchFailed { url: String, reason: String },

    #[error("Incomplete HTML extraction: found {found} of 5 counters")]
    HtmlExtractionIncomplete { found: usize },

    #[error("No score dimension produced a highlight")]
    HighlightUnavailable,

    #[error("Repository inspection failed at the GitHub API: {0}")]
    RepoInspectorApi(#[source] Box<Error>),

    #[error("Repository inspection failed on the HTML side: {0}")]
    RepoInspectorCrawler(#[source] Box<Error>),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an API-side failure for the inspector's public surface.
    pub fn into_api(self) -> Error {
        Error::RepoInspectorApi(Box::new(self))
    }

    /// Wrap an HTML-side failure for the inspector's public surface.
    pub fn into_crawler(self) -> Error {
        Error::RepoInspectorCrawler(Box::new(self))
    }

    /// Whether the message signals a GitHub quota exhaustion that the
    /// dispatcher recovers from by rotating credentials.
    pub fn is_rate_limit_message(&self) -> bool {
        self.to_string().to_lowercase().contains("rate limit exceeded")
    }
}
