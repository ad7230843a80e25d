use crate::error::{Error, Result};
use crate::github::credential::{Access, Credential, CredentialKind, Scope};
use crate::github::pager::Pager;
use crate::github::pool::TokenPool;
use crate::github::route::ApiRoute;
use crate::github::transport::{ApiReply, ApiTransport, AuthMode, Outcome};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Credential rotations (and rate-limit waits) allowed per call.
pub const MAX_ROTATIONS: u32 = 5;

/// 202 retries allowed per invocation.
pub const MAX_ACCEPTED_RETRIES: u32 = 5;

const ACCEPTED_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Assumed quota window when a rate-limit error carries no reset.
const FALLBACK_RESET_SECS: i64 = 600;

/// Routes API calls through the best credential for the requested scope.
///
/// Picks a credential from the pool (or uses a caller-installed one),
/// authenticates the transport before every invocation, sleeps or rotates
/// when a scope's quota is exhausted, retries 202 responses, and wraps
/// pagination in the same protocol. Rotation and 202 retries are bounded;
/// exceeding either bound is `RetryExhausted`.
pub struct Dispatcher {
    transport: Arc<dyn ApiTransport>,
    pager: Arc<dyn Pager>,
    pool: Option<Mutex<TokenPool>>,
    custom: Option<Credential>,
    last_scope: RwLock<Option<Scope>>,
}

enum Invocation<'a> {
    Route {
        route: &'a ApiRoute,
        args: &'a [String],
    },
    PagerNext,
    PagerLast,
}

impl Dispatcher {
    /// Dispatcher with neither pool nor custom token; any API call fails
    /// with `NoCredentials` until one of them is installed.
    pub fn new(transport: Arc<dyn ApiTransport>, pager: Arc<dyn Pager>) -> Self {
        Self {
            transport,
            pager,
            pool: None,
            custom: None,
            last_scope: RwLock::new(None),
        }
    }

    /// Dispatcher drawing credentials from a shared pool.
    pub fn with_pool(
        transport: Arc<dyn ApiTransport>,
        pager: Arc<dyn Pager>,
        pool: TokenPool,
    ) -> Self {
        Self {
            transport,
            pager,
            pool: Some(Mutex::new(pool)),
            custom: None,
            last_scope: RwLock::new(None),
        }
    }

    /// Dispatcher pinned to a single credential; the pool is bypassed.
    pub fn with_token(
        transport: Arc<dyn ApiTransport>,
        pager: Arc<dyn Pager>,
        credential: Credential,
    ) -> Self {
        Self {
            transport,
            pager,
            pool: None,
            custom: Some(credential),
            last_scope: RwLock::new(None),
        }
    }

    /// Install a single credential, bypassing any pool from here on.
    /// Installing the anonymous credential is an explicit de-authentication.
    pub fn set_custom_token(&mut self, credential: Credential) {
        self.custom = Some(credential);
    }

    /// Invoke a dotted API path with positional arguments.
    pub async fn call(&self, path: &str, args: &[String]) -> Result<Value> {
        let route = ApiRoute::parse(path)?;
        let scope = route.scope();
        *self.last_scope.write().await = Some(scope);
        self.execute(scope, Invocation::Route { route: &route, args })
            .await
    }

    /// Whether the last response linked a further page.
    pub async fn has_next(&self) -> bool {
        self.pager.has_next().await
    }

    /// Fetch the next page of the previous call, under the same protocol.
    pub async fn next(&self) -> Result<Value> {
        let scope = self.continuation_scope().await;
        self.execute(scope, Invocation::PagerNext).await
    }

    /// Fetch the last page of the previous call, under the same protocol.
    pub async fn last(&self) -> Result<Value> {
        let scope = self.continuation_scope().await;
        self.execute(scope, Invocation::PagerLast).await
    }

    /// Pagination continues in the scope of the preceding call.
    async fn continuation_scope(&self) -> Scope {
        self.last_scope.read().await.unwrap_or(Scope::Core)
    }

    async fn execute(&self, scope: Scope, invocation: Invocation<'_>) -> Result<Value> {
        if let Some(custom) = &self.custom {
            self.transport.authenticate(auth_mode(custom)).await;
            return match self.invoke_bounded(&invocation).await? {
                Outcome::Reply(reply) => interpret(reply),
                Outcome::RateLimited { reset } => Err(Error::Internal(format!(
                    "GitHub API rate limit exceeded (reset at {reset})"
                ))),
            };
        }

        let pool = self.pool.as_ref().ok_or(Error::NoCredentials)?;
        let mut attempts = 0u32;

        loop {
            let credential = {
                let mut pool = pool.lock().await;
                match pool.current_token(scope) {
                    Some(current) => current.clone(),
                    None => pool.get_token(scope)?,
                }
            };

            match credential.can_access(scope) {
                Access::WaitSeconds(wait) => {
                    attempts += 1;
                    if attempts > MAX_ROTATIONS {
                        return Err(Error::RetryExhausted {
                            attempts,
                            context: "waiting out rate-limit resets".to_string(),
                        });
                    }
                    warn!(
                        "Scope {} exhausted on credential {}; sleeping {}s until reset",
                        scope,
                        credential.short_identity(),
                        wait
                    );
                    sleep(Duration::from_secs(wait)).await;
                }
                Access::Allowed => {
                    self.transport.authenticate(auth_mode(&credential)).await;

                    match self.invoke_bounded(&invocation).await {
                        Ok(Outcome::Reply(reply)) => return interpret(reply),
                        Ok(Outcome::RateLimited { reset }) => {
                            attempts += 1;
                            if attempts > MAX_ROTATIONS {
                                return Err(Error::RetryExhausted {
                                    attempts,
                                    context: "credential rotation".to_string(),
                                });
                            }
                            pool.lock().await.next_token(scope, reset)?;
                        }
                        Err(e) if e.is_rate_limit_message() => {
                            attempts += 1;
                            if attempts > MAX_ROTATIONS {
                                return Err(Error::RetryExhausted {
                                    attempts,
                                    context: "credential rotation".to_string(),
                                });
                            }
                            let reset = Utc::now().timestamp() + FALLBACK_RESET_SECS;
                            warn!(
                                "Rate limit signaled without a reset; assuming {}s window",
                                FALLBACK_RESET_SECS
                            );
                            pool.lock().await.next_token(scope, reset)?;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    /// Run one invocation, retrying 202 responses with a one-second pause,
    /// at most `MAX_ACCEPTED_RETRIES` times.
    async fn invoke_bounded(&self, invocation: &Invocation<'_>) -> Result<Outcome> {
        let mut retries = 0u32;

        loop {
            let outcome = self.dispatch(invocation).await?;

            match outcome {
                Outcome::Reply(ApiReply::Accepted) => {
                    if retries >= MAX_ACCEPTED_RETRIES {
                        return Err(Error::RetryExhausted {
                            attempts: retries + 1,
                            context: "202 Accepted, result never materialized".to_string(),
                        });
                    }
                    retries += 1;
                    debug!(
                        "API returned 202, retrying in 1s ({}/{})",
                        retries, MAX_ACCEPTED_RETRIES
                    );
                    sleep(ACCEPTED_RETRY_DELAY).await;
                }
                other => return Ok(other),
            }
        }
    }

    async fn dispatch(&self, invocation: &Invocation<'_>) -> Result<Outcome> {
        match invocation {
            Invocation::Route { route, args } => self.transport.invoke(route, args).await,
            Invocation::PagerNext => self.pager.fetch_next().await,
            Invocation::PagerLast => self.pager.fetch_last().await,
        }
    }
}

/// Map a credential variant onto the transport's authentication mode.
fn auth_mode(credential: &Credential) -> AuthMode {
    match credential.kind() {
        CredentialKind::Null => AuthMode::None,
        CredentialKind::Pat { token } => AuthMode::Token(token.clone()),
        CredentialKind::ClientSecret {
            client_id,
            client_secret,
        } => AuthMode::ClientCredentials {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        },
    }
}

fn interpret(reply: ApiReply) -> Result<Value> {
    match reply {
        ApiReply::Json(value) => Ok(value),
        ApiReply::Opaque(what) => Err(Error::UnexpectedApiResponse(what)),
        ApiReply::Accepted => Err(Error::UnexpectedApiResponse(
            "202 Accepted escaped the retry loop".to_string(),
        )),
    }
}
