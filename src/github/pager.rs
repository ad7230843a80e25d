use crate::error::{Error, Result};
use crate::github::transport::{ApiReply, ApiTransport, Outcome};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Pagination collaborator. Stateful: `fetch_next`/`fetch_last` follow the
/// links of the most recent response seen by the underlying transport.
#[async_trait]
pub trait Pager: Send + Sync {
    /// Fetch one page by absolute URL.
    async fn fetch(&self, url: &str) -> Result<Outcome>;

    /// Fetch a page and follow `next` links to the end, concatenating
    /// array payloads.
    async fn fetch_all(&self, url: &str) -> Result<Vec<Value>>;

    /// Fetch the page the last response linked as `next`.
    async fn fetch_next(&self) -> Result<Outcome>;

    /// Fetch the page the last response linked as `last`.
    async fn fetch_last(&self) -> Result<Outcome>;

    /// Whether the last response linked a `next` page.
    async fn has_next(&self) -> bool;
}

/// Pager over the transport's RFC 8288 `Link` headers.
pub struct LinkPager {
    transport: Arc<dyn ApiTransport>,
}

impl LinkPager {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self { transport }
    }

    async fn follow(&self, rel: &str) -> Result<Outcome> {
        let url = self
            .transport
            .link(rel)
            .await
            .ok_or_else(|| Error::NotFound(format!("no `{rel}` page link available")))?;
        self.transport.fetch_url(&url).await
    }
}

#[async_trait]
impl Pager for LinkPager {
    async fn fetch(&self, url: &str) -> Result<Outcome> {
        self.transport.fetch_url(url).await
    }

    async fn fetch_all(&self, url: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut outcome = self.fetch(url).await?;

        loop {
            match outcome {
                Outcome::RateLimited { reset } => {
                    return Err(Error::Internal(format!(
                        "GitHub API rate limit exceeded during pagination (reset at {reset})"
                    )));
                }
                Outcome::Reply(ApiReply::Json(Value::Array(page))) => {
                    debug!("Fetched page with {} items", page.len());
                    items.extend(page);
                }
                Outcome::Reply(ApiReply::Json(other)) => {
                    items.push(other);
                }
                Outcome::Reply(reply) => {
                    return Err(Error::UnexpectedApiResponse(format!(
                        "pagination returned {reply:?}"
                    )));
                }
            }

            if !self.has_next().await {
                return Ok(items);
            }
            outcome = self.fetch_next().await?;
        }
    }

    async fn fetch_next(&self) -> Result<Outcome> {
        self.follow("next").await
    }

    async fn fetch_last(&self) -> Result<Outcome> {
        self.follow("last").await
    }

    async fn has_next(&self) -> bool {
        self.transport.link("next").await.is_some()
    }
}
