use crate::config::Settings;
use crate::error::{Error, Result};
use crate::github::route::ApiRoute;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// How a request authenticates against the API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Explicit de-authentication.
    #[default]
    None,
    /// Bearer-style access token.
    Token(String),
    /// OAuth application client id + secret.
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

/// Payload of a completed API call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply {
    /// Decoded JSON body.
    Json(Value),
    /// 202: accepted but still being computed server-side.
    Accepted,
    /// A 2xx body that is not decodable data.
    Opaque(String),
}

/// Result of invoking the API: either a reply, or the recoverable
/// rate-limited signal carrying the quota reset epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reply(ApiReply),
    RateLimited { reset: i64 },
}

/// The HTTP collaborator contract the dispatcher drives.
///
/// Implementations must support the three authentication modes, surface the
/// last response status, expose pagination links, and signal rate-limit
/// exhaustion as a typed outcome rather than an opaque error.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Install the authentication used by subsequent requests.
    async fn authenticate(&self, mode: AuthMode);

    /// Invoke a resolved route with positional arguments.
    async fn invoke(&self, route: &ApiRoute, args: &[String]) -> Result<Outcome>;

    /// Fetch an absolute API URL (pagination follows server-given links).
    async fn fetch_url(&self, url: &str) -> Result<Outcome>;

    /// Status code of the most recent response, if any.
    async fn last_status(&self) -> Option<u16>;

    /// Pagination link (`next`, `last`, ...) from the most recent response.
    async fn link(&self, rel: &str) -> Option<String>;
}

/// Production transport over the GitHub REST API.
pub struct GitHubTransport {
    client: Client,
    base_url: String,
    auth: RwLock<AuthMode>,
    last_status: RwLock<Option<u16>>,
    links: RwLock<HashMap<String, String>>,
}

impl GitHubTransport {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&settings.user_agent)
                .map_err(|e| Error::Internal(format!("Invalid user agent: {e}")))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github.v3+json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(settings.http_timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.api_base.trim_end_matches('/').to_string(),
            auth: RwLock::new(AuthMode::None),
            last_status: RwLock::new(None),
            links: RwLock::new(HashMap::new()),
        })
    }

    /// Map a dotted route onto a REST endpoint path.
    fn endpoint(route: &ApiRoute, args: &[String]) -> Result<String> {
        let path = route.path();
        match path.as_str() {
            "repo/show" => {
                expect_args(&path, args, 2)?;
                Ok(format!("/repos/{}/{}", args[0], args[1]))
            }
            "repo/participation" => {
                expect_args(&path, args, 2)?;
                Ok(format!("/repos/{}/{}/stats/participation", args[0], args[1]))
            }
            "repo/branches" => {
                expect_args(&path, args, 2)?;
                Ok(format!("/repos/{}/{}/branches", args[0], args[1]))
            }
            "repo/tags" => {
                expect_args(&path, args, 2)?;
                Ok(format!("/repos/{}/{}/tags", args[0], args[1]))
            }
            "repo/releases" => {
                expect_args(&path, args, 2)?;
                Ok(format!("/repos/{}/{}/releases", args[0], args[1]))
            }
            "repo/contributors" => {
                expect_args(&path, args, 2)?;
                Ok(format!("/repos/{}/{}/contributors", args[0], args[1]))
            }
            "search/repositories" => {
                expect_args(&path, args, 1)?;
                let query: String =
                    url::form_urlencoded::byte_serialize(args[0].as_bytes()).collect();
                Ok(format!("/search/repositories?q={query}"))
            }
            "rate_limit/show" => {
                expect_args(&path, args, 0)?;
                Ok("/rate_limit".to_string())
            }
            other => Err(Error::UnknownApiRoute(other.to_string())),
        }
    }

    async fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &*self.auth.read().await {
            AuthMode::None => request,
            AuthMode::Token(token) => request.bearer_auth(token),
            AuthMode::ClientCredentials {
                client_id,
                client_secret,
            } => request.basic_auth(client_id, Some(client_secret)),
        }
    }

    async fn execute(&self, url: &str) -> Result<Outcome> {
        debug!("GitHub API request: GET {}", url);

        let request = self.apply_auth(self.client.get(url)).await;
        let response = request.send().await?;

        let status = response.status();
        *self.last_status.write().await = Some(status.as_u16());
        *self.links.write().await = parse_link_header(
            response
                .headers()
                .get(header::LINK)
                .and_then(|v| v.to_str().ok()),
        );

        if status == StatusCode::ACCEPTED {
            return Ok(Outcome::Reply(ApiReply::Accepted));
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let remaining = header_value(&response, "x-ratelimit-remaining");
            let reset = header_value(&response, "x-ratelimit-reset")
                .and_then(|v| v.parse::<i64>().ok());

            if remaining.as_deref() == Some("0") {
                if let Some(reset) = reset {
                    return Ok(Outcome::RateLimited { reset });
                }
            }
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            error!("GitHub API error: {} - {}", status, body);

            return Err(match status {
                StatusCode::NOT_FOUND => Error::NotFound("GitHub resource not found".to_string()),
                StatusCode::UNAUTHORIZED => {
                    Error::Internal("GitHub authentication failed".to_string())
                }
                _ => Error::Internal(format!("GitHub API error {status}: {body}")),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_default();

        let body = response.text().await?;
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(Outcome::Reply(ApiReply::Json(value))),
            Err(_) => Ok(Outcome::Reply(ApiReply::Opaque(format!(
                "undecodable {content_type} body"
            )))),
        }
    }
}

#[async_trait]
impl ApiTransport for GitHubTransport {
    async fn authenticate(&self, mode: AuthMode) {
        *self.auth.write().await = mode;
    }

    async fn invoke(&self, route: &ApiRoute, args: &[String]) -> Result<Outcome> {
        let endpoint = Self::endpoint(route, args)?;
        let url = format!("{}{}", self.base_url, endpoint);
        self.execute(&url).await
    }

    async fn fetch_url(&self, url: &str) -> Result<Outcome> {
        self.execute(url).await
    }

    async fn last_status(&self) -> Option<u16> {
        *self.last_status.read().await
    }

    async fn link(&self, rel: &str) -> Option<String> {
        self.links.read().await.get(rel).cloned()
    }
}

fn expect_args(path: &str, args: &[String], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::UnknownApiRoute(format!(
            "{path} takes {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Parse an RFC 8288 `Link` header into a rel -> URL map.
fn parse_link_header(raw: Option<&str>) -> HashMap<String, String> {
    let mut links = HashMap::new();

    let Some(raw) = raw else {
        return links;
    };

    for part in raw.split(',') {
        let mut url = None;
        let mut rel = None;

        for piece in part.split(';') {
            let piece = piece.trim();
            if piece.starts_with('<') && piece.ends_with('>') {
                url = Some(piece[1..piece.len() - 1].to_string());
            } else if let Some(value) = piece.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"').to_string());
            }
        }

        if let (Some(url), Some(rel)) = (url, rel) {
            links.insert(rel, url);
        }
    }

    links
}
