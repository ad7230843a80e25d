use serde::{Deserialize, Serialize};

/// GitHub API rate limit information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
}

/// Weekly commit-count series from the participation endpoint.
/// Up to 52 values, oldest first, ending with the most recent full week.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Participation {
    #[serde(default)]
    pub all: Vec<i64>,
    #[serde(default)]
    pub owner: Vec<i64>,
}

/// License block inside a repository payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub key: Option<String>,
    pub name: Option<String>,
    pub spdx_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participation_defaults_to_empty() {
        let p: Participation = serde_json::from_str("{}").unwrap();
        assert!(p.all.is_empty());
        assert!(p.owner.is_empty());
    }

    #[test]
    fn test_participation_parses_series() {
        let p: Participation =
            serde_json::from_str(r#"{"all": [1, 2, 3], "owner": [0, 1, 0]}"#).unwrap();
        assert_eq!(p.all, vec![1, 2, 3]);
    }
}
