use clap::Parser;
use repogauge::{
    cli::{commands, Cli, Commands, TokenCommands},
    config::Settings,
    Result,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    // Silently ignore if file doesn't exist
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,repogauge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::from_env()?;
    settings.validate()?;

    match cli.command {
        Commands::Inspect { repo, pretty } => {
            commands::inspect(&settings, &repo, pretty).await?;
        }
        Commands::Tokens(tokens) => match tokens {
            TokenCommands::Add { descriptors, purge } => {
                commands::tokens_add(&settings, &descriptors, purge)?;
            }
            TokenCommands::List => {
                commands::tokens_list(&settings)?;
            }
            TokenCommands::Remove { identity } => {
                commands::tokens_remove(&settings, &identity)?;
            }
            TokenCommands::Clear => {
                commands::tokens_clear(&settings)?;
            }
        },
        Commands::RateLimit => {
            commands::rate_limit(&settings).await?;
        }
    }

    Ok(())
}
