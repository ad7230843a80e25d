use crate::config::Settings;
use crate::error::Result;
use crate::github::credential::{Access, Scope};
use crate::github::{factory, parse_repo_ref, Descriptor, TokenPool};
use crate::inspector::Inspector;
use tracing::info;

/// Inspect a repository and print the merged result as JSON.
pub async fn inspect(settings: &Settings, repo: &str, pretty: bool) -> Result<()> {
    let repo_ref = parse_repo_ref(repo)?;
    let inspector = Inspector::new(settings)?;

    let result = inspector.inspect(&repo_ref.owner, &repo_ref.name).await?;

    let rendered = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{rendered}");

    Ok(())
}

/// Parse descriptors and merge (or purge into) the pool.
pub fn tokens_add(settings: &Settings, descriptors: &[String], purge: bool) -> Result<()> {
    let descriptors: Vec<Descriptor> = descriptors.iter().map(|raw| Descriptor::parse(raw)).collect();
    let credentials = factory::create_batch(&descriptors)?;

    let pool = TokenPool::new(&settings.pool_path);
    pool.set_tokens(&credentials, purge)?;

    info!("Added {} credential(s) to {}", credentials.len(), settings.pool_path.display());
    for credential in &credentials {
        println!("{}", credential.short_identity());
    }

    Ok(())
}

/// List pooled credentials with their per-scope wait state.
pub fn tokens_list(settings: &Settings) -> Result<()> {
    let pool = TokenPool::new(&settings.pool_path);
    let tokens = pool.get_tokens()?;

    if tokens.is_empty() {
        println!("Pool is empty: {}", settings.pool_path.display());
        return Ok(());
    }

    for credential in tokens {
        let state: Vec<String> = [Scope::Core, Scope::Search]
            .iter()
            .map(|&scope| match credential.can_access(scope) {
                Access::Allowed => format!("{scope}: ok"),
                Access::WaitSeconds(wait) => format!("{scope}: wait {wait}s"),
            })
            .collect();
        println!("{}  {}", credential.short_identity(), state.join("  "));
    }

    Ok(())
}

/// Remove a credential by full or short identity.
pub fn tokens_remove(settings: &Settings, identity: &str) -> Result<()> {
    let pool = TokenPool::new(&settings.pool_path);

    // Accept a short identity by expanding it against the pool.
    let full = pool
        .get_tokens()?
        .into_iter()
        .map(|c| c.identity())
        .find(|id| id == identity || id.starts_with(identity));

    match full {
        Some(id) if pool.remove_token(&id)? => {
            println!("Removed {id}");
        }
        _ => {
            println!("No credential matching `{identity}`");
        }
    }

    Ok(())
}

/// Empty the pool.
pub fn tokens_clear(settings: &Settings) -> Result<()> {
    let pool = TokenPool::new(&settings.pool_path);
    pool.clear()?;
    println!("Pool cleared: {}", settings.pool_path.display());
    Ok(())
}

/// Query the rate-limit endpoint through the dispatcher. Consumes no quota.
pub async fn rate_limit(settings: &Settings) -> Result<()> {
    use crate::github::{ApiTransport, Credential, Dispatcher, GitHubTransport, LinkPager, Pager};
    use std::sync::Arc;

    let transport: Arc<dyn ApiTransport> = Arc::new(GitHubTransport::new(settings)?);
    let pager: Arc<dyn Pager> = Arc::new(LinkPager::new(transport.clone()));

    let dispatcher = match &settings.custom_token {
        Some(token) => {
            Dispatcher::with_token(transport, pager, Credential::personal(token.clone())?)
        }
        None => Dispatcher::with_pool(transport, pager, TokenPool::new(&settings.pool_path)),
    };

    let result = dispatcher.call("rate_limit/show", &[]).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
