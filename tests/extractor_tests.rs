use repogauge::scraper::extract_stats;
use repogauge::Error;

#[test]
fn extracts_all_counters_from_fixture_pages() {
    let repo_page = include_str!("fixtures/repo_page.html");
    let counts_page = include_str!("fixtures/branch_and_tag_count.html");

    let stats = extract_stats(repo_page, counts_page).unwrap();

    assert_eq!(stats.commits, 12_847);
    assert_eq!(stats.branches, 23);
    assert_eq!(stats.tags, 58);
    assert_eq!(stats.releases, 58);
    assert_eq!(stats.contributors, 214);
}

#[test]
fn extracts_language_breakdown_in_page_order() {
    let repo_page = include_str!("fixtures/repo_page.html");
    let counts_page = include_str!("fixtures/branch_and_tag_count.html");

    let stats = extract_stats(repo_page, counts_page).unwrap();

    let breakdown: Vec<(&str, f64)> = stats
        .languages
        .iter()
        .map(|l| (l.name.as_str(), l.percent))
        .collect();

    assert_eq!(
        breakdown,
        vec![
            ("Rust", 87.3),
            ("C++", 8.9),
            ("Objective-C", 2.4),
            ("Shell", 1.4),
        ]
    );
}

#[test]
fn counters_outside_the_main_container_are_ignored() {
    // The footer advertises "99 reasons ..." but only <main> is scanned.
    let page = r#"
    <html><body>
      <main><a>7 commits</a></main>
      <footer>99 commits of pure marketing</footer>
    </body></html>"#;
    let counts = "<span>1 branch</span><span>2 tags</span>";

    let stats = extract_stats(page, counts).unwrap();
    assert_eq!(stats.commits, 7);
}

#[test]
fn changed_markup_fails_loudly() {
    // GitHub reshuffles the page: counters gone. The extractor must reject
    // the page rather than hand back zeros.
    let stripped = "<html><main><p>Welcome to the new repository view!</p></main></html>";
    let counts = "<div>nothing countable</div>";

    let err = extract_stats(stripped, counts).unwrap_err();
    assert!(matches!(err, Error::HtmlExtractionIncomplete { found: 2 }));
}
