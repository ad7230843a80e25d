// HTML scraping: repository page counters that would otherwise cost
// several paginated API calls per repo.

pub mod fetcher;
pub mod stats;

pub use fetcher::PageFetcher;
pub use stats::{extract_stats, LanguageShare, RepoPageStats, StatsExtractor};
