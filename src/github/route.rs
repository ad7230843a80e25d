use crate::error::{Error, Result};
use crate::github::credential::Scope;

/// A dotted API path resolved into namespace, intermediate navigations,
/// and the final method, e.g. `repo/show` or `search/repositories`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoute {
    pub namespace: String,
    pub navigations: Vec<String>,
    pub method: String,
}

impl ApiRoute {
    /// Split a path on `/`: first segment is the namespace, the last is
    /// the method, anything between is a sub-navigation. Paths with fewer
    /// than two segments are rejected.
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if segments.len() < 2 {
            return Err(Error::BadApiPath(path.to_string()));
        }

        Ok(Self {
            namespace: segments[0].to_string(),
            navigations: segments[1..segments.len() - 1]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            method: segments[segments.len() - 1].to_string(),
        })
    }

    /// Which rate-limit bucket a call through this route consumes.
    pub fn scope(&self) -> Scope {
        match self.namespace.as_str() {
            "search" => Scope::Search,
            "rate_limit" => Scope::None,
            _ => Scope::Core,
        }
    }

    /// The full dotted path, for diagnostics.
    pub fn path(&self) -> String {
        let mut parts = vec![self.namespace.clone()];
        parts.extend(self.navigations.iter().cloned());
        parts.push(self.method.clone());
        parts.join("/")
    }
}

/// Parsed repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

/// Parse a repository reference: bare `owner/repo`, a `github.com/...`
/// path, or a full GitHub URL, optionally ending in `.git`.
pub fn parse_repo_ref(raw: &str) -> Result<RepoRef> {
    let trimmed = raw.trim();

    let reject = || {
        Error::Validation(format!(
            "Cannot read `{raw}` as a repository reference (want owner/repo or a GitHub URL)"
        ))
    };

    // Absolute URLs go through the url crate; the repo lives in the path
    // regardless of scheme or host. Bare forms are already a path.
    let path = if trimmed.contains("://") {
        let parsed = url::Url::parse(trimmed).map_err(|_| reject())?;
        parsed.path().to_string()
    } else {
        trimmed
            .strip_prefix("github.com")
            .unwrap_or(trimmed)
            .to_string()
    };

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let owner = segments.next().ok_or_else(reject)?;
    let name = segments
        .next()
        .map(|n| n.trim_end_matches(".git"))
        .filter(|n| !n.is_empty())
        .ok_or_else(reject)?;

    Ok(RepoRef {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_segments() {
        let route = ApiRoute::parse("repo/show").unwrap();
        assert_eq!(route.namespace, "repo");
        assert!(route.navigations.is_empty());
        assert_eq!(route.method, "show");
    }

    #[test]
    fn test_parse_with_navigation() {
        let route = ApiRoute::parse("repo/stats/participation").unwrap();
        assert_eq!(route.namespace, "repo");
        assert_eq!(route.navigations, vec!["stats"]);
        assert_eq!(route.method, "participation");
        assert_eq!(route.path(), "repo/stats/participation");
    }

    #[test]
    fn test_single_segment_rejected() {
        assert!(matches!(
            ApiRoute::parse("repo"),
            Err(Error::BadApiPath(_))
        ));
        assert!(matches!(ApiRoute::parse(""), Err(Error::BadApiPath(_))));
    }

    #[test]
    fn test_scope_classification() {
        assert_eq!(ApiRoute::parse("repo/show").unwrap().scope(), Scope::Core);
        assert_eq!(
            ApiRoute::parse("search/repositories").unwrap().scope(),
            Scope::Search
        );
        assert_eq!(
            ApiRoute::parse("rate_limit/show").unwrap().scope(),
            Scope::None
        );
        assert_eq!(ApiRoute::parse("user/show").unwrap().scope(), Scope::Core);
    }

    #[test]
    fn test_repo_ref_accepted_forms() {
        let forms = [
            "rust-lang/rust",
            "  rust-lang/rust  ",
            "github.com/rust-lang/rust",
            "https://github.com/rust-lang/rust",
            "https://github.com/rust-lang/rust/",
            "https://github.com/rust-lang/rust.git",
            "http://github.com/rust-lang/rust",
        ];

        for raw in forms {
            let parsed = parse_repo_ref(raw).unwrap();
            assert_eq!(parsed.owner, "rust-lang", "owner mismatch for `{raw}`");
            assert_eq!(parsed.name, "rust", "name mismatch for `{raw}`");
        }
    }

    #[test]
    fn test_repo_ref_rejected_forms() {
        for raw in ["", "rust-lang", "/rust", "rust-lang/", "o/.git", "https://"] {
            assert!(
                matches!(parse_repo_ref(raw), Err(Error::Validation(_))),
                "accepted `{raw}`"
            );
        }
    }
}
