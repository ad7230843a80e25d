use crate::error::{Error, Result};
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTML page fetcher with retry logic and a response size cap.
///
/// Scraping is a quota-saving accessory: failures are surfaced precisely as
/// `HtmlFetchFailed` with the offending URL rather than silently recovered.
pub struct PageFetcher {
    client: Client,
    max_retries: u32,
    initial_backoff: Duration,
    max_page_size: usize,
}

impl PageFetcher {
    pub fn new(user_agent: String, timeout_secs: u64, max_page_size: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_page_size,
        })
    }

    /// Fetch a page with retry and exponential backoff on transient errors.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match self.fetch_once(url).await {
                Ok(content) => return Ok(content),
                Err(e) if retries < self.max_retries && is_retryable(&e) => {
                    retries += 1;
                    warn!(
                        "Fetch failed (attempt {}/{}): {}. Retrying in {:?}",
                        retries, self.max_retries, e, backoff
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    return Err(Error::HtmlFetchFailed {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        debug!("Fetching HTML page: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Internal(format!("HTTP {}", response.status())));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_page_size as u64 {
                return Err(Error::Validation(format!(
                    "Page size {} exceeds maximum {}",
                    content_length, self.max_page_size
                )));
            }
        }

        self.read_with_limit(response).await
    }

    async fn read_with_limit(&self, response: Response) -> Result<String> {
        let bytes = response.bytes().await?;

        if bytes.len() > self.max_page_size {
            return Err(Error::Validation(format!(
                "Page size {} exceeds maximum {}",
                bytes.len(),
                self.max_page_size
            )));
        }

        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Internal(format!("Invalid UTF-8 in response: {e}")))
    }
}

fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = PageFetcher::new("TestBot/1.0".to_string(), 30, 5_242_880);
        assert!(fetcher.is_ok());
    }
}
