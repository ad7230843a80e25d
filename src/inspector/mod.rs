use crate::config::Settings;
use crate::error::{Error, Result};
use crate::github::models::Participation;
use crate::github::{
    ApiTransport, Credential, Dispatcher, GitHubTransport, LinkPager, Pager, TokenPool,
};
use crate::scoring::{self, select_highlight, ScoreInputs};
use crate::scraper::{RepoPageStats, StatsExtractor};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

const SECONDS_PER_WEEK: f64 = 604_800.0;

/// Default recency when a repository has no usable push timestamp.
const FALLBACK_WEEKS_SINCE_PUSH: f64 = 52.0;

/// Drives the dispatcher, the HTML extractor, and the scoring engine for a
/// single repository, merging everything into one result document.
pub struct Inspector {
    dispatcher: Dispatcher,
    extractor: StatsExtractor,
}

impl Inspector {
    /// Build a production inspector from settings: pooled credentials unless
    /// a custom token is configured.
    pub fn new(settings: &Settings) -> Result<Self> {
        let transport: Arc<dyn ApiTransport> = Arc::new(GitHubTransport::new(settings)?);
        let pager: Arc<dyn Pager> = Arc::new(LinkPager::new(transport.clone()));

        let dispatcher = match &settings.custom_token {
            Some(token) => {
                Dispatcher::with_token(transport, pager, Credential::personal(token.clone())?)
            }
            None => Dispatcher::with_pool(transport, pager, TokenPool::new(&settings.pool_path)),
        };

        let extractor = StatsExtractor::new(
            settings.user_agent.clone(),
            settings.http_timeout_secs,
            settings.max_page_size,
        )?;

        Ok(Self {
            dispatcher,
            extractor,
        })
    }

    /// Compose an inspector from pre-built collaborators.
    pub fn from_parts(dispatcher: Dispatcher, extractor: StatsExtractor) -> Self {
        Self {
            dispatcher,
            extractor,
        }
    }

    /// Inspect `owner/name`: API metadata plus scraped counters plus scores.
    pub async fn inspect(&self, owner: &str, name: &str) -> Result<Value> {
        info!("Inspecting repository {}/{}", owner, name);
        let args = vec![owner.to_string(), name.to_string()];

        let repo = self
            .dispatcher
            .call("repo/show", &args)
            .await
            .map_err(Error::into_api)?;

        let participation: Participation = serde_json::from_value(
            self.dispatcher
                .call("repo/participation", &args)
                .await
                .map_err(Error::into_api)?,
        )
        .unwrap_or_default();

        let html_url = repo
            .get("html_url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::UnexpectedApiResponse("repository payload missing html_url".to_string())
                    .into_api()
            })?
            .to_string();

        let stats = self
            .extractor
            .fetch_stats(&html_url)
            .await
            .map_err(Error::into_crawler)?;

        let inputs = build_inputs(&repo, &participation.all, &stats, Utc::now());
        let scores = scoring::score(&inputs);
        let highlight = select_highlight(&scores, &inputs).map_err(Error::into_crawler)?;
        debug!(
            "Scored {}/{}: p={} h={} a={} m={}",
            owner, name, scores.p, scores.h, scores.a, scores.m
        );

        let mut result = strip_urls(&repo);
        let map = result.as_object_mut().ok_or_else(|| {
            Error::UnexpectedApiResponse("repository payload is not an object".to_string())
                .into_api()
        })?;

        map.insert("license_id".to_string(), Value::from(license_id(&repo)));
        map.insert("commits_count".to_string(), Value::from(stats.commits));
        map.insert("branches_count".to_string(), Value::from(stats.branches));
        map.insert("tags_count".to_string(), Value::from(stats.tags));
        map.insert("releases_count".to_string(), Value::from(stats.releases));
        map.insert(
            "contributors_count".to_string(),
            Value::from(stats.contributors),
        );
        map.insert(
            "languages".to_string(),
            serde_json::to_value(&stats.languages)?,
        );
        map.insert("scores".to_string(), serde_json::to_value(scores)?);
        map.insert("scores_avg".to_string(), Value::from(scores.average()));
        map.insert("highlight".to_string(), serde_json::to_value(&highlight)?);

        Ok(result)
    }
}

/// Drop every `*_url` key except `avatar_url`, renaming `html_url` to `url`.
/// Applies recursively, so owner and license blocks are cleaned too.
pub fn strip_urls(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if key == "html_url" {
                    out.insert("url".to_string(), strip_urls(val));
                } else if key.ends_with("_url") && key != "avatar_url" {
                    continue;
                } else {
                    out.insert(key.clone(), strip_urls(val));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_urls).collect()),
        other => other.clone(),
    }
}

/// SPDX id of the license, empty for missing, `NONE`, or `NOASSERTION`.
pub fn license_id(repo: &Value) -> String {
    let spdx = repo
        .get("license")
        .and_then(|license| license.get("spdx_id"))
        .and_then(Value::as_str)
        .unwrap_or("");

    match spdx.to_lowercase().as_str() {
        "" | "none" | "noassertion" => String::new(),
        _ => spdx.to_string(),
    }
}

/// Merge API metadata and scraped counters into scoring inputs.
///
/// Recency prefers `pushed_at`, falls back to `updated_at`, and assumes a
/// year-stale repository when neither parses.
pub fn build_inputs(
    repo: &Value,
    participation_all: &[i64],
    stats: &RepoPageStats,
    now: DateTime<Utc>,
) -> ScoreInputs {
    let age_weeks = weeks_since(repo, "created_at", now).unwrap_or(0.0);
    let weeks_since_push = weeks_since(repo, "pushed_at", now)
        .or_else(|| weeks_since(repo, "updated_at", now))
        .unwrap_or(FALLBACK_WEEKS_SINCE_PUSH);

    ScoreInputs {
        stargazers: repo["stargazers_count"].as_i64().unwrap_or(0),
        subscribers: repo["subscribers_count"].as_i64().unwrap_or(0),
        forks: repo["forks_count"].as_i64().unwrap_or(0),
        size_mb: repo["size"].as_f64().unwrap_or(0.0) / 1000.0,
        age_weeks,
        weeks_since_push,
        participation_all: participation_all.to_vec(),
        commits: stats.commits as i64,
        releases: stats.releases as i64,
        contributors: stats.contributors as i64,
    }
}

/// Non-negative weeks between `now` and an RFC 3339 field of the payload.
fn weeks_since(repo: &Value, field: &str, now: DateTime<Utc>) -> Option<f64> {
    let raw = repo.get(field)?.as_str()?;
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
    let seconds = (now - parsed.with_timezone(&Utc)).num_seconds() as f64;
    Some((seconds / SECONDS_PER_WEEK).max(0.0))
}
