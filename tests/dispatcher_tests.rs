use async_trait::async_trait;
use chrono::Utc;
use repogauge::github::credential::{Credential, Scope};
use repogauge::github::route::ApiRoute;
use repogauge::github::{
    ApiReply, ApiTransport, AuthMode, Dispatcher, LinkPager, Outcome, Pager, TokenPool,
};
use repogauge::Error;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

/// One scripted transport response.
#[derive(Clone)]
enum Step {
    Json(Value),
    Accepted,
    Opaque,
    RateLimited(i64),
    ErrMsg(String),
}

/// Transport stub: plays a script, then repeats the fallback step.
/// Records every authentication switch and counts invocations.
struct MockTransport {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicU32,
    auths: Mutex<Vec<AuthMode>>,
}

impl MockTransport {
    fn scripted(steps: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: AtomicU32::new(0),
            auths: Mutex::new(Vec::new()),
        })
    }

    fn always(step: Step) -> Arc<Self> {
        Self::scripted(Vec::new(), step)
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn step(&self) -> repogauge::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Json(value) => Ok(Outcome::Reply(ApiReply::Json(value))),
            Step::Accepted => Ok(Outcome::Reply(ApiReply::Accepted)),
            Step::Opaque => Ok(Outcome::Reply(ApiReply::Opaque(
                "undecodable text/html body".to_string(),
            ))),
            Step::RateLimited(reset) => Ok(Outcome::RateLimited { reset }),
            Step::ErrMsg(msg) => Err(Error::Internal(msg)),
        }
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn authenticate(&self, mode: AuthMode) {
        self.auths.lock().await.push(mode);
    }

    async fn invoke(&self, _route: &ApiRoute, _args: &[String]) -> repogauge::Result<Outcome> {
        self.step().await
    }

    async fn fetch_url(&self, _url: &str) -> repogauge::Result<Outcome> {
        self.step().await
    }

    async fn last_status(&self) -> Option<u16> {
        None
    }

    async fn link(&self, _rel: &str) -> Option<String> {
        None
    }
}

fn pooled_dispatcher(
    transport: Arc<MockTransport>,
    dir: &TempDir,
    creds: &[Credential],
) -> Dispatcher {
    let pool = TokenPool::new(dir.path().join("tokens.json"));
    pool.set_tokens(creds, false).unwrap();

    let dyn_transport: Arc<dyn ApiTransport> = transport;
    let pager: Arc<dyn Pager> = Arc::new(LinkPager::new(dyn_transport.clone()));
    Dispatcher::with_pool(dyn_transport, pager, pool)
}

fn token_dispatcher(transport: Arc<MockTransport>, credential: Credential) -> Dispatcher {
    let dyn_transport: Arc<dyn ApiTransport> = transport;
    let pager: Arc<dyn Pager> = Arc::new(LinkPager::new(dyn_transport.clone()));
    Dispatcher::with_token(dyn_transport, pager, credential)
}

fn args(owner: &str, name: &str) -> Vec<String> {
    vec![owner.to_string(), name.to_string()]
}

#[tokio::test(start_paused = true)]
async fn accepted_retry_bound_is_six_attempts() {
    let transport = MockTransport::always(Step::Accepted);
    let dispatcher = token_dispatcher(transport.clone(), Credential::anonymous());

    let started = tokio::time::Instant::now();
    let err = dispatcher
        .call("repo/participation", &args("acme", "widget"))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::RetryExhausted { attempts: 6, .. }));
    assert_eq!(transport.calls(), 6);

    // Five one-second pauses between the six attempts.
    assert!(elapsed >= std::time::Duration::from_secs(5));
    assert!(elapsed < std::time::Duration::from_secs(7));
}

#[tokio::test]
async fn accepted_then_result_succeeds() {
    let transport = MockTransport::scripted(
        vec![Step::Accepted, Step::Json(json!({"all": [1, 2, 3]}))],
        Step::Json(json!({})),
    );
    let dispatcher = token_dispatcher(transport.clone(), Credential::anonymous());

    tokio::time::pause();
    let value = dispatcher
        .call("repo/participation", &args("acme", "widget"))
        .await
        .unwrap();

    assert_eq!(value["all"], json!([1, 2, 3]));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn rotates_on_rate_limited_outcome() {
    let now = Utc::now().timestamp();
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::scripted(
        vec![Step::RateLimited(now + 300)],
        Step::Json(json!({"ok": true})),
    );
    let dispatcher = pooled_dispatcher(
        transport.clone(),
        &dir,
        &[
            Credential::personal("A").unwrap(),
            Credential::personal("B").unwrap(),
        ],
    );

    let value = dispatcher.call("repo/show", &args("acme", "widget")).await.unwrap();
    assert_eq!(value["ok"], json!(true));

    // First attempt went out as A, the retry as B.
    let auths = transport.auths.lock().await.clone();
    assert_eq!(
        auths,
        vec![
            AuthMode::Token("A".to_string()),
            AuthMode::Token("B".to_string())
        ]
    );

    // The exhausted credential's reset was persisted to the shared file.
    let pool = TokenPool::new(dir.path().join("tokens.json"));
    let stamped = pool
        .get_tokens()
        .unwrap()
        .into_iter()
        .find(|c| c.identity() == Credential::personal("A").unwrap().identity())
        .unwrap();
    assert_eq!(stamped.reset_for(Scope::Core), Some(now + 300));
}

#[tokio::test]
async fn rotates_on_rate_limit_error_message() {
    let before = Utc::now().timestamp();
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::scripted(
        vec![Step::ErrMsg(
            "GitHub API error 403: API rate limit exceeded for 203.0.113.7".to_string(),
        )],
        Step::Json(json!({"ok": true})),
    );
    let dispatcher = pooled_dispatcher(
        transport.clone(),
        &dir,
        &[
            Credential::personal("A").unwrap(),
            Credential::personal("B").unwrap(),
        ],
    );

    dispatcher.call("repo/show", &args("acme", "widget")).await.unwrap();
    assert_eq!(transport.calls(), 2);

    // Without a reset in the signal, a 600-second window is assumed.
    let pool = TokenPool::new(dir.path().join("tokens.json"));
    let stamped = pool
        .get_tokens()
        .unwrap()
        .into_iter()
        .find(|c| c.identity() == Credential::personal("A").unwrap().identity())
        .unwrap();
    let reset = stamped.reset_for(Scope::Core).unwrap();
    assert!(reset >= before + 600 && reset <= before + 610);
}

#[tokio::test]
async fn unrelated_errors_do_not_rotate() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::always(Step::ErrMsg("boom".to_string()));
    let dispatcher = pooled_dispatcher(
        transport.clone(),
        &dir,
        &[Credential::personal("A").unwrap()],
    );

    let err = dispatcher
        .call("repo/show", &args("acme", "widget"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rotation_bound_is_exhausted() {
    let now = Utc::now().timestamp();
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::always(Step::RateLimited(now + 300));
    let dispatcher = pooled_dispatcher(
        transport.clone(),
        &dir,
        &[
            Credential::personal("A").unwrap(),
            Credential::personal("B").unwrap(),
        ],
    );

    let err = dispatcher
        .call("repo/show", &args("acme", "widget"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { .. }));
}

#[tokio::test]
async fn custom_token_bypasses_pool() {
    let transport = MockTransport::always(Step::Json(json!({"ok": true})));
    let dispatcher = token_dispatcher(transport.clone(), Credential::personal("X").unwrap());

    dispatcher.call("repo/show", &args("acme", "widget")).await.unwrap();

    let auths = transport.auths.lock().await.clone();
    assert_eq!(auths, vec![AuthMode::Token("X".to_string())]);
}

#[tokio::test]
async fn explicit_anonymous_deauthenticates() {
    let transport = MockTransport::always(Step::Json(json!({"ok": true})));
    let dispatcher = token_dispatcher(transport.clone(), Credential::anonymous());

    dispatcher.call("repo/show", &args("acme", "widget")).await.unwrap();

    let auths = transport.auths.lock().await.clone();
    assert_eq!(auths, vec![AuthMode::None]);
}

#[tokio::test]
async fn custom_token_rate_limit_is_terminal() {
    let now = Utc::now().timestamp();
    let transport = MockTransport::always(Step::RateLimited(now + 60));
    let dispatcher = token_dispatcher(transport.clone(), Credential::personal("X").unwrap());

    let err = dispatcher
        .call("repo/show", &args("acme", "widget"))
        .await
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("rate limit exceeded"));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn missing_credentials_is_an_error() {
    let transport = MockTransport::always(Step::Json(json!({})));
    let dyn_transport: Arc<dyn ApiTransport> = transport.clone();
    let pager: Arc<dyn Pager> = Arc::new(LinkPager::new(dyn_transport.clone()));
    let dispatcher = Dispatcher::new(dyn_transport, pager);

    let err = dispatcher
        .call("repo/show", &args("acme", "widget"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoCredentials));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn empty_pool_surfaces() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::always(Step::Json(json!({})));
    let dispatcher = pooled_dispatcher(transport.clone(), &dir, &[]);

    let err = dispatcher
        .call("repo/show", &args("acme", "widget"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyPool));
}

#[tokio::test]
async fn short_path_is_rejected_before_any_request() {
    let transport = MockTransport::always(Step::Json(json!({})));
    let dispatcher = token_dispatcher(transport.clone(), Credential::anonymous());

    let err = dispatcher.call("repo", &[]).await.unwrap_err();
    assert!(matches!(err, Error::BadApiPath(_)));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn opaque_reply_is_unexpected() {
    let transport = MockTransport::always(Step::Opaque);
    let dispatcher = token_dispatcher(transport.clone(), Credential::anonymous());

    let err = dispatcher
        .call("repo/show", &args("acme", "widget"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedApiResponse(_)));
}
