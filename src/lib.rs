pub mod config;
pub mod error;

// Credential pool and scope-aware dispatch
pub mod github;

// HTML counter scraping
pub mod scraper;

// PHAM scoring
pub mod scoring;

// Single-repository facade
pub mod inspector;

// CLI
pub mod cli;

// Re-exports
pub use config::Settings;
pub use error::{Error, Result};
