use anyhow::Context;
use clap::Parser;
use np_core::{Error, NewAd, NewPost, NewsStorage, PageContext, PageNumber, PlacementRules, PostQuery, Result};
use np_storage::BackendConfig;
use np_web::{views, AppState, WebConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Storage backend: memory, sqlite or postgrest
    #[arg(long, env = "NP_STORAGE", default_value = "memory")]
    storage: String,
    #[arg(long, env = "NP_BACKEND_URL")]
    backend_url: Option<String>,
    #[arg(long, env = "NP_BACKEND_KEY", hide_env_values = true)]
    backend_key: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "NP_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
        #[arg(long, env = "NP_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,
        /// Only promote a lead story once a page has this many posts
        #[arg(long, default_value_t = 0)]
        min_articles_for_featured: usize,
        /// JSON file loaded into the store before serving
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Print the placement of a listing page as JSON
    Place {
        /// Section slug (e.g. sports). Home page when omitted.
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        page: Option<String>,
        #[arg(long, default_value_t = 0)]
        min_articles_for_featured: usize,
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Load posts and ads from a JSON file into the store
    Seed { file: PathBuf },
}

#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    posts: Vec<NewPost>,
    #[serde(default)]
    ads: Vec<NewAd>,
}

async fn check_storage(storage: &Arc<dyn NewsStorage>) -> Result<()> {
    let posts = storage.list_posts(&PostQuery::default().limit(1)).await?;
    info!(
        "🏦 Storage backend answered (using {}, {} post sampled)",
        storage.name(),
        posts.len()
    );
    Ok(())
}

async fn check_storage_with_retry(
    storage: &Arc<dyn NewsStorage>,
    max_retries: u32,
    timeout: Duration,
) -> Result<()> {
    let mut retries = 0;
    let mut last_error = None;

    while retries < max_retries {
        match tokio::time::timeout(timeout, check_storage(storage)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => last_error = Some(e),
            Err(elapsed) => {
                last_error = Some(Error::Storage(format!("Storage health check timed out: {}", elapsed)))
            }
        }
        retries += 1;
        if retries < max_retries {
            info!("Storage health check failed, retrying {}/{}...", retries, max_retries);
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Storage("Storage health check failed after all retries".to_string())))
}

async fn load_seed(storage: &Arc<dyn NewsStorage>, path: &Path) -> Result<(usize, usize)> {
    let raw = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_json::from_str(&raw)?;

    let mut posts = 0;
    for post in seed.posts {
        let title = post.title.clone();
        match storage.create_post(post).await {
            Ok(_) => posts += 1,
            Err(e) => warn!("⚠️ Skipping post {:?}: {}", title, e),
        }
    }
    let mut ads = 0;
    for ad in seed.ads {
        let title = ad.title.clone();
        match storage.create_ad(ad).await {
            Ok(_) => ads += 1,
            Err(e) => warn!("⚠️ Skipping ad {:?}: {}", title, e),
        }
    }
    info!("🌱 Seeded {} posts and {} ads from {}", posts, ads, path.display());
    Ok((posts, ads))
}

fn web_config(admin_password: Option<&str>, min_articles_for_featured: usize) -> WebConfig {
    WebConfig {
        rules: PlacementRules {
            min_articles_for_featured,
        },
        ..Default::default()
    }
    .with_admin_password(admin_password)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let config = BackendConfig::new(cli.backend_url.as_deref()).with_api_key(cli.backend_key.as_deref());
    let storage = np_storage::create_storage(&cli.storage, config)
        .await
        .with_context(|| format!("failed to open {} storage", cli.storage))?;

    info!("💾 Checking storage connection...");
    check_storage_with_retry(&storage, 3, Duration::from_secs(10))
        .await
        .context("storage health check failed")?;
    info!("✨ Storage initialized successfully (using {})", cli.storage);

    match cli.command {
        Commands::Serve {
            bind,
            admin_password,
            min_articles_for_featured,
            seed,
        } => {
            if let Some(path) = seed {
                load_seed(&storage, &path)
                    .await
                    .with_context(|| format!("failed to seed from {}", path.display()))?;
            }
            let config = web_config(admin_password.as_deref(), min_articles_for_featured);
            if config.admin_password.is_none() {
                warn!("🔒 No admin password configured, admin routes will reject every request");
            }
            np_web::serve(AppState::new(storage, config), bind)
                .await
                .with_context(|| format!("server on {} stopped", bind))?;
        }
        Commands::Place {
            section,
            page,
            min_articles_for_featured,
            seed,
        } => {
            if let Some(path) = seed {
                load_seed(&storage, &path)
                    .await
                    .with_context(|| format!("failed to seed from {}", path.display()))?;
            }
            let context = match section.as_deref() {
                Some(slug) => PageContext::section(slug),
                None => PageContext::home(),
            };
            let page = PageNumber::parse(page.as_deref());
            info!("📰 Placing {} page {}", context.slug, page);
            let state = AppState::new(storage, web_config(None, min_articles_for_featured));
            let view = views::render_page(&state, context, page).await;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Seed { file } => {
            load_seed(&storage, &file)
                .await
                .with_context(|| format!("failed to seed from {}", file.display()))?;
        }
    }

    Ok(())
}
