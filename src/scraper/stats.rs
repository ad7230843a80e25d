use crate::error::{Error, Result};
use crate::scraper::fetcher::PageFetcher;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

/// One entry of the repository's language breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageShare {
    pub name: String,
    pub percent: f64,
}

/// Counters and language breakdown scraped from the repository's HTML.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepoPageStats {
    pub commits: u64,
    pub branches: u64,
    pub tags: u64,
    pub releases: u64,
    pub contributors: u64,
    pub languages: Vec<LanguageShare>,
}

/// Scrapes the repository page and its branch-and-tag-count companion.
pub struct StatsExtractor {
    fetcher: PageFetcher,
}

impl StatsExtractor {
    pub fn new(user_agent: String, timeout_secs: u64, max_page_size: usize) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(user_agent, timeout_secs, max_page_size)?,
        })
    }

    /// Fetch both pages for `html_url` and extract all counters.
    pub async fn fetch_stats(&self, html_url: &str) -> Result<RepoPageStats> {
        let base = html_url.trim_end_matches('/');
        let repo_html = self.fetcher.fetch(base).await?;
        let counts_html = self
            .fetcher
            .fetch(&format!("{base}/branch-and-tag-count"))
            .await?;

        extract_stats(&repo_html, &counts_html)
    }
}

fn commits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([\d,]+)\s+commits?").expect("valid regex"))
}

fn releases_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)releases\s+([\d,]+)").expect("valid regex"))
}

fn contributors_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)contributors\s+([\d,]+)").expect("valid regex"))
}

fn branches_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([\d,]+)\s+branch(?:es)?").expect("valid regex"))
}

fn tags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([\d,]+)\s+tags?").expect("valid regex"))
}

fn language_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\p{L}+#\-\s]+)\s+([\d.]+)%").expect("valid regex"))
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<li[^>]*>(.*?)</li>").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

/// Extract counters from the repo page and the branch-and-tag-count page.
///
/// Commits, branches, and tags must be present; releases and contributors
/// default to zero. Fewer than five populated counters means GitHub's markup
/// changed and the extraction is rejected rather than partially trusted.
pub fn extract_stats(repo_html: &str, counts_html: &str) -> Result<RepoPageStats> {
    let main = main_container(repo_html);

    let commits = capture_count(commits_re(), main);
    let releases = capture_count(releases_re(), main);
    let contributors = capture_count(contributors_re(), main);
    let branches = capture_count(branches_re(), counts_html);
    let tags = capture_count(tags_re(), counts_html);

    // Releases and contributors legitimately default; the other three are
    // load-bearing for the completeness check.
    let found = [
        commits.is_some(),
        branches.is_some(),
        tags.is_some(),
        true, // releases, defaulted
        true, // contributors, defaulted
    ]
    .iter()
    .filter(|&&present| present)
    .count();

    if found < 5 {
        return Err(Error::HtmlExtractionIncomplete { found });
    }

    let stats = RepoPageStats {
        commits: commits.unwrap_or(0),
        branches: branches.unwrap_or(0),
        tags: tags.unwrap_or(0),
        releases: releases.unwrap_or(0),
        contributors: contributors.unwrap_or(0),
        languages: extract_languages(repo_html),
    };

    debug!(
        "Extracted counters: {} commits, {} branches, {} tags, {} releases, {} contributors, {} languages",
        stats.commits,
        stats.branches,
        stats.tags,
        stats.releases,
        stats.contributors,
        stats.languages.len()
    );

    Ok(stats)
}

/// The `<main>` region of the page, or the whole document without one.
fn main_container(html: &str) -> &str {
    let Some(start) = html.find("<main") else {
        return html;
    };
    match html[start..].find("</main>") {
        Some(end) => &html[start..start + end],
        None => &html[start..],
    }
}

/// First capture of `re` in `text`, digits only, parsed as a count.
fn capture_count(re: &Regex, text: &str) -> Option<u64> {
    let capture = re.captures(text)?.get(1)?.as_str();
    let digits: String = capture.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Language entries from the section headed "Languages": one per list item
/// whose text matches `name percent%`.
fn extract_languages(html: &str) -> Vec<LanguageShare> {
    let Some(section) = languages_section(html) else {
        return Vec::new();
    };

    let mut languages = Vec::new();
    for item in list_item_re().captures_iter(section) {
        let text = tag_re().replace_all(&item[1], " ");
        if let Some(caps) = language_re().captures(&text) {
            let name = caps[1].trim().to_string();
            if name.is_empty() {
                continue;
            }
            if let Ok(percent) = caps[2].parse::<f64>() {
                languages.push(LanguageShare { name, percent });
            }
        }
    }
    languages
}

fn languages_section(html: &str) -> Option<&str> {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    let heading = HEADING
        .get_or_init(|| Regex::new(r"(?i)>\s*Languages\s*<").expect("valid regex"));

    let start = heading.find(html)?.end();
    let rest = &html[start..];
    let end = rest.find("</section>").or_else(|| rest.find("</div>"));
    Some(match end {
        Some(end) => &rest[..end],
        None => rest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO_PAGE: &str = r#"
    <html><body>
    <main>
      <a href="/o/r/commits">1,284 commits</a>
      <a href="/o/r/releases">Releases 12</a>
      <a href="/o/r/contributors">Contributors 34</a>
      <h2>Languages</h2>
      <ul>
        <li><span>Rust</span> <span>92.4%</span></li>
        <li><span>C#</span> <span>5.1%</span></li>
        <li><span>Shell</span> <span>2.5%</span></li>
      </ul>
    </main>
    </body></html>"#;

    const COUNTS_PAGE: &str = r#"<div><span>14 branches</span><span>27 tags</span></div>"#;

    #[test]
    fn test_extract_counters() {
        let stats = extract_stats(REPO_PAGE, COUNTS_PAGE).unwrap();
        assert_eq!(stats.commits, 1284);
        assert_eq!(stats.branches, 14);
        assert_eq!(stats.tags, 27);
        assert_eq!(stats.releases, 12);
        assert_eq!(stats.contributors, 34);
    }

    #[test]
    fn test_languages_parsed_in_order() {
        let stats = extract_stats(REPO_PAGE, COUNTS_PAGE).unwrap();
        let names: Vec<&str> = stats.languages.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Rust", "C#", "Shell"]);
        assert_eq!(stats.languages[0].percent, 92.4);
    }

    #[test]
    fn test_defaults_for_releases_and_contributors() {
        let page = r#"<main><a>42 commits</a></main>"#;
        let stats = extract_stats(page, COUNTS_PAGE).unwrap();
        assert_eq!(stats.releases, 0);
        assert_eq!(stats.contributors, 0);
    }

    #[test]
    fn test_missing_commits_is_incomplete() {
        let page = r#"<main><a>Releases 3</a></main>"#;
        let err = extract_stats(page, COUNTS_PAGE).unwrap_err();
        assert!(matches!(err, Error::HtmlExtractionIncomplete { found: 4 }));
    }

    #[test]
    fn test_missing_branch_counts_is_incomplete() {
        let err = extract_stats(REPO_PAGE, "<div>nothing here</div>").unwrap_err();
        assert!(matches!(err, Error::HtmlExtractionIncomplete { found: 3 }));
    }

    #[test]
    fn test_singular_forms() {
        let page = r#"<main><a>1 commit</a></main>"#;
        let counts = r#"<span>1 branch</span><span>1 tag</span>"#;
        let stats = extract_stats(page, counts).unwrap();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.branches, 1);
        assert_eq!(stats.tags, 1);
    }

    #[test]
    fn test_comma_separated_counts() {
        let page = r#"<main><a>12,345,678 commits</a></main>"#;
        let stats = extract_stats(page, COUNTS_PAGE).unwrap();
        assert_eq!(stats.commits, 12_345_678);
    }
}
