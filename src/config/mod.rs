use crate::error::{Error, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Location of the shared credential pool file.
    pub pool_path: PathBuf,

    /// User agent sent on API and HTML requests.
    pub user_agent: String,

    /// Base URL of the GitHub REST API.
    pub api_base: String,

    /// HTTP timeout in seconds for API and HTML requests.
    pub http_timeout_secs: u64,

    /// Maximum HTML page size to download (in bytes).
    pub max_page_size: usize,

    /// Optional single token; when set the dispatcher bypasses the pool.
    pub custom_token: Option<String>,
}

impl Settings {
    /// Load settings from environment variables.
    pub fn from_env() -> Result<Self> {
        let pool_path = std::env::var("REPOGAUGE_POOL_PATH")
            .unwrap_or_else(|_| "./data/tokens.json".to_string())
            .into();

        let user_agent = std::env::var("REPOGAUGE_USER_AGENT")
            .unwrap_or_else(|_| format!("repogauge/{}", env!("CARGO_PKG_VERSION")));

        let api_base = std::env::var("REPOGAUGE_API_BASE")
            .unwrap_or_else(|_| "https://api.github.com".to_string());

        let http_timeout_secs = std::env::var("REPOGAUGE_HTTP_TIMEOUT")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| Error::Config("Invalid REPOGAUGE_HTTP_TIMEOUT value".to_string()))?;

        let max_page_size = std::env::var("REPOGAUGE_MAX_PAGE_SIZE")
            .unwrap_or_else(|_| "5242880".to_string())
            .parse()
            .map_err(|_| Error::Config("Invalid REPOGAUGE_MAX_PAGE_SIZE value".to_string()))?;

        let custom_token = std::env::var("GITHUB_TOKEN").ok();

        Ok(Settings {
            pool_path,
            user_agent,
            api_base,
            http_timeout_secs,
            max_page_size,
            custom_token,
        })
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            return Err(Error::Config("HTTP timeout must be non-zero".to_string()));
        }

        if self.max_page_size == 0 {
            return Err(Error::Config("Max page size must be non-zero".to_string()));
        }

        if self.api_base.is_empty() {
            return Err(Error::Config("API base URL must not be empty".to_string()));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pool_path: "./data/tokens.json".into(),
            user_agent: format!("repogauge/{}", env!("CARGO_PKG_VERSION")),
            api_base: "https://api.github.com".to_string(),
            http_timeout_secs: 30,
            max_page_size: 5_242_880,
            custom_token: None,
        }
    }
}
