pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "repogauge")]
#[command(about = "Rate-limit-aware GitHub repository inspector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect a repository and print the merged result
    Inspect {
        /// Repository reference (owner/repo or full GitHub URL)
        repo: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Manage the credential pool
    #[command(subcommand)]
    Tokens(TokenCommands),

    /// Show the current rate-limit state for the selected credential
    RateLimit,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Add credentials from descriptors: a bare tag (`null`) or a JSON
    /// array (`'["pat", "ghp_..."]'`)
    Add {
        /// Credential descriptors
        descriptors: Vec<String>,

        /// Replace the pool contents instead of merging
        #[arg(long)]
        purge: bool,
    },

    /// List pooled credentials and their per-scope wait state
    List,

    /// Remove a credential by identity
    Remove {
        /// Full or short identity
        identity: String,
    },

    /// Empty the pool
    Clear,
}
