use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// GitHub rate-limit bucket.
///
/// Each credential holds an independent quota per scope. `None` is used for
/// calls that consume no quota at all, such as rate-limit inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Core,
    Search,
    None,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Core => "core",
            Scope::Search => "search",
            Scope::None => "none",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of asking a credential whether a scope is usable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No reset recorded for the scope, or the recorded reset has passed.
    Allowed,
    /// Quota exhausted; usable again after this many seconds.
    WaitSeconds(u64),
}

/// The identity-bearing part of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialKind {
    /// No-auth sentinel, used as a last-resort fallback.
    Null,
    /// Personal access token.
    Pat { token: String },
    /// OAuth application client id + secret.
    ClientSecret {
        client_id: String,
        client_secret: String,
    },
}

/// A GitHub credential plus its per-scope reset deadlines.
///
/// The kind is immutable once constructed; only the reset map changes over
/// the credential's lifetime. Identities are derived from the secret material
/// via md5 so they are stable across runs without leaking the secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(flatten)]
    kind: CredentialKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    resets: BTreeMap<Scope, i64>,
}

impl Credential {
    /// The anonymous credential.
    pub fn anonymous() -> Self {
        Self {
            kind: CredentialKind::Null,
            resets: BTreeMap::new(),
        }
    }

    /// A personal-access-token credential.
    pub fn personal(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::CredentialConstructionFailed(
                "personal access token must not be empty".to_string(),
            ));
        }
        Ok(Self {
            kind: CredentialKind::Pat { token },
            resets: BTreeMap::new(),
        })
    }

    /// An OAuth client-id + client-secret credential.
    pub fn client_secret(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(Error::CredentialConstructionFailed(
                "client id and client secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            kind: CredentialKind::ClientSecret {
                client_id,
                client_secret,
            },
            resets: BTreeMap::new(),
        })
    }

    pub fn kind(&self) -> &CredentialKind {
        &self.kind
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.kind, CredentialKind::Null)
    }

    /// Stable, collision-resistant identity. Secrets only appear hashed.
    pub fn identity(&self) -> String {
        match &self.kind {
            CredentialKind::Null => "null".to_string(),
            CredentialKind::Pat { token } => {
                format!("pat#{:x}", md5::compute(token.as_bytes()))
            }
            CredentialKind::ClientSecret {
                client_id,
                client_secret,
            } => {
                let joined = format!("{client_id}{client_secret}");
                format!("cst#{:x}", md5::compute(joined.as_bytes()))
            }
        }
    }

    /// First 8 characters of the full identity, for logs and listings.
    pub fn short_identity(&self) -> String {
        self.identity().chars().take(8).collect()
    }

    /// Whether the scope is usable at epoch-second `now`.
    pub fn can_access_at(&self, scope: Scope, now: i64) -> Access {
        match self.resets.get(&scope) {
            Some(&reset) if reset > now => Access::WaitSeconds((reset - now) as u64),
            _ => Access::Allowed,
        }
    }

    /// Whether the scope is usable right now.
    pub fn can_access(&self, scope: Scope) -> Access {
        self.can_access_at(scope, Utc::now().timestamp())
    }

    /// Record the epoch-second at which the scope's quota returns to full.
    /// Overwrites any previous reset unconditionally.
    pub fn set_reset(&mut self, scope: Scope, epoch: i64) {
        self.resets.insert(scope, epoch);
    }

    pub fn reset_for(&self, scope: Scope) -> Option<i64> {
        self.resets.get(&scope).copied()
    }
}
