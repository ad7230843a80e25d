use crate::error::{Error, Result};
use crate::github::credential::{Access, Credential, Scope};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable, ordered credential pool backed by a single JSON file.
///
/// The file maps identity to credential and is the authoritative state;
/// every operation re-reads it so multiple processes can share one pool.
/// Reads take a shared lock, writes take an exclusive lock and fully
/// replace the contents, so concurrent readers see either the pre- or
/// post-state of a writer, never a partial file.
///
/// The `current[scope]` selection made by `get_token` lives on this
/// instance only; it is not shared across processes.
pub struct TokenPool {
    path: PathBuf,
    current: HashMap<Scope, Credential>,
}

impl TokenPool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Install credentials. With `purge` the file is rewritten to exactly
    /// `creds`; otherwise they are merged, keeping the recorded reset state
    /// of credentials already in the pool.
    ///
    /// Entries are typed `Credential`s, so per-entry validation happens at
    /// construction and deserialization time.
    pub fn set_tokens(&self, creds: &[Credential], purge: bool) -> Result<()> {
        if purge {
            let incoming = dedupe(creds);
            self.with_exclusive(move |_| Ok((incoming, ())))
        } else {
            self.merge(creds, false)
        }
    }

    /// Current snapshot in deterministic order: insertion order with any
    /// anonymous credential pushed to the end.
    pub fn get_tokens(&self) -> Result<Vec<Credential>> {
        self.read_snapshot()
    }

    /// Pick the best credential for a scope: the first one allowed right
    /// now, otherwise the one with the smallest positive wait. Remembers
    /// the choice as `current[scope]`.
    pub fn get_token(&mut self, scope: Scope) -> Result<Credential> {
        self.get_token_at(scope, Utc::now().timestamp())
    }

    /// `get_token` against an explicit clock.
    pub fn get_token_at(&mut self, scope: Scope, now: i64) -> Result<Credential> {
        let creds = self.read_snapshot()?;
        if creds.is_empty() {
            return Err(Error::EmptyPool);
        }

        let chosen = creds
            .iter()
            .find(|c| matches!(c.can_access_at(scope, now), Access::Allowed))
            .or_else(|| {
                creds.iter().min_by_key(|c| match c.can_access_at(scope, now) {
                    Access::Allowed => 0,
                    Access::WaitSeconds(n) => n,
                })
            })
            // non-empty pool always yields a minimum
            .cloned()
            .ok_or(Error::EmptyPool)?;

        debug!(
            "Selected credential {} for scope {}",
            chosen.short_identity(),
            scope
        );
        self.current.insert(scope, chosen.clone());
        Ok(chosen)
    }

    /// Stamp the current credential for `scope` with `reset`, persist it,
    /// and select again. Requires a prior `get_token` for the scope and a
    /// reset in the future.
    pub fn next_token(&mut self, scope: Scope, reset: i64) -> Result<Credential> {
        self.next_token_at(scope, reset, Utc::now().timestamp())
    }

    /// `next_token` against an explicit clock.
    pub fn next_token_at(&mut self, scope: Scope, reset: i64, now: i64) -> Result<Credential> {
        if reset <= now {
            return Err(Error::BadReset { reset });
        }

        let mut current = self
            .current
            .get(&scope)
            .cloned()
            .ok_or_else(|| Error::NoCurrent {
                scope: scope.to_string(),
            })?;

        warn!(
            "Credential {} exhausted for scope {} (reset at {}), rotating",
            current.short_identity(),
            scope,
            reset
        );

        current.set_reset(scope, reset);
        self.merge(std::slice::from_ref(&current), true)?;
        self.current.insert(scope, current);

        self.get_token_at(scope, now)
    }

    /// The credential last selected for `scope`, if any.
    pub fn current_token(&self, scope: Scope) -> Option<&Credential> {
        self.current.get(&scope)
    }

    /// Remove a credential by identity. Returns whether it was present.
    pub fn remove_token(&self, identity: &str) -> Result<bool> {
        let identity = identity.to_string();
        self.with_exclusive(move |mut existing| {
            let before = existing.len();
            existing.retain(|c| c.identity() != identity);
            let removed = existing.len() != before;
            Ok((existing, removed))
        })
    }

    /// Empty the pool file.
    pub fn clear(&self) -> Result<()> {
        self.with_exclusive(|_| Ok((Vec::new(), ())))
    }

    /// Merge `incoming` into the file under one exclusive lock. Absent
    /// identities are inserted; present ones are replaced only when
    /// `overwrite` is set.
    fn merge(&self, incoming: &[Credential], overwrite: bool) -> Result<()> {
        let incoming = incoming.to_vec();
        self.with_exclusive(move |mut existing| {
            for cred in incoming {
                let identity = cred.identity();
                match existing.iter().position(|c| c.identity() == identity) {
                    Some(idx) if overwrite => existing[idx] = cred,
                    Some(_) => {}
                    None => existing.push(cred),
                }
            }
            Ok((existing, ()))
        })
    }

    /// Read the pool under a shared lock, with anonymous pushback applied.
    fn read_snapshot(&self) -> Result<Vec<Credential>> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        file.lock_shared()?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content);
        file.unlock()?;
        read?;

        Ok(pushback(parse(&content, &self.path)?))
    }

    /// Run a read-modify-write cycle under one exclusive lock. The lock is
    /// released on every exit path, including parse and callback failures.
    fn with_exclusive<R>(
        &self,
        f: impl FnOnce(Vec<Credential>) -> Result<(Vec<Credential>, R)>,
    ) -> Result<R> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        file.lock()?;
        let outcome = Self::locked_update(&mut file, &self.path, f);
        file.unlock()?;
        outcome
    }

    fn locked_update<R>(
        file: &mut File,
        path: &Path,
        f: impl FnOnce(Vec<Credential>) -> Result<(Vec<Credential>, R)>,
    ) -> Result<R> {
        let mut content = String::new();
        file.read_to_string(&mut content)?;

        let existing = parse(&content, path)?;
        let (updated, value) = f(existing)?;
        let updated = pushback(updated);

        let payload = serialize(&updated)?;
        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;

        Ok(value)
    }
}

/// Decode the pool file. An empty file is an empty pool; anything that is
/// not a mapping of identity to credential is corrupt.
fn parse(content: &str, path: &Path) -> Result<Vec<Credential>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let corrupt = |reason: String| Error::CorruptPool {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))?;
    let map = value
        .as_object()
        .ok_or_else(|| corrupt("top-level value is not a mapping".to_string()))?;

    let mut creds = Vec::with_capacity(map.len());
    for (identity, entry) in map {
        let cred: Credential = serde_json::from_value(entry.clone())
            .map_err(|e| corrupt(format!("entry `{identity}` is not a credential: {e}")))?;
        creds.push(cred);
    }

    Ok(creds)
}

fn serialize(creds: &[Credential]) -> Result<String> {
    let mut map = serde_json::Map::with_capacity(creds.len());
    for cred in creds {
        map.insert(cred.identity(), serde_json::to_value(cred)?);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(map))?)
}

/// Stable reorder placing any anonymous credential after all others.
fn pushback(creds: Vec<Credential>) -> Vec<Credential> {
    let (anonymous, mut ordered): (Vec<_>, Vec<_>) =
        creds.into_iter().partition(|c| c.is_anonymous());
    ordered.extend(anonymous);
    ordered
}

/// Collapse duplicate identities, last write wins, first position kept.
fn dedupe(creds: &[Credential]) -> Vec<Credential> {
    let mut out: Vec<Credential> = Vec::with_capacity(creds.len());
    for cred in creds {
        match out.iter().position(|c| c.identity() == cred.identity()) {
            Some(idx) => out[idx] = cred.clone(),
            None => out.push(cred.clone()),
        }
    }
    out
}
