//! Operator CLI for the URL shortener store.
//!
//! Runs storage operations against whichever backend the configuration
//! selects, without an HTTP surface in front of it.
//!
//! # Usage
//!
//! ```bash
//! # Shorten a URL as user "alice"
//! shortener --user alice shorten https://example.com
//!
//! # Shorten many URLs from a JSON file
//! shortener --user alice batch urls.json
//!
//! # Resolve a short key
//! shortener resolve 9001509
//!
//! # List and delete your URLs
//! shortener --user alice list
//! shortener --user alice delete 9001509 -y
//!
//! # Check backend connectivity
//! shortener ping
//! ```
//!
//! # Environment Variables
//!
//! See [`url_shortener_store::config`]. `SHORTENER_USER` can replace `--user`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;

use url_shortener_store::application::services::{BatchItem, ShortenerService};
use url_shortener_store::config::Config;
use url_shortener_store::domain::context::RequestContext;
use url_shortener_store::domain::storage::Storage;
use url_shortener_store::error::AppError;
use url_shortener_store::logging::init_tracing;
use url_shortener_store::runtime::Runtime;

/// CLI tool for the URL shortener store.
#[derive(Parser)]
#[command(name = "shortener")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Act as this user for user-scoped commands
    #[arg(short, long, global = true, env = "SHORTENER_USER")]
    user: Option<String>,

    /// PostgreSQL DSN (overrides DATABASE_DSN)
    #[arg(long, global = true)]
    database_dsn: Option<String>,

    /// Journal file path (overrides FILE_STORAGE_PATH)
    #[arg(long, global = true)]
    file_storage_path: Option<PathBuf>,

    /// Prefix of returned short URLs (overrides BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shorten a URL
    Shorten {
        /// URL to shorten
        url: String,
    },

    /// Shorten every URL of a JSON file
    ///
    /// The file holds an array of `{"correlation_id", "original_url"}` objects.
    Batch {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Print the URL a short key points to
    Resolve {
        /// Short key
        key: String,
    },

    /// List the URLs created by the current user
    List {
        /// Include deleted URLs
        #[arg(short, long)]
        all: bool,
    },

    /// Delete URLs created by the current user
    Delete {
        /// Short keys to delete
        #[arg(required = true)]
        keys: Vec<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Check backend connectivity
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    apply_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.log_level, &config.log_format)?;
    config.print_summary();

    let runtime = Runtime::start(&config)
        .await
        .context("Failed to start storage")?;
    let service = runtime.service();
    let ctx = match cli.user.as_deref() {
        Some(user) => RequestContext::for_user(user),
        None => RequestContext::anonymous(),
    };

    let result = match cli.command {
        Commands::Shorten { url } => shorten(&service, &ctx, &url).await,
        Commands::Batch { file } => batch(&service, &ctx, &file).await,
        Commands::Resolve { key } => resolve(&service, &key).await,
        Commands::List { all } => list(&service, &ctx, all).await,
        Commands::Delete { keys, yes } => delete(&service, &ctx, keys, yes).await,
        Commands::Ping => ping(&service).await,
    };

    let stats = runtime.shutdown().await.context("Failed to close storage")?;
    if stats.failed > 0 {
        println!(
            "{}",
            format!("⚠️  {} deletion request(s) failed", stats.failed).yellow()
        );
    }

    result
}

/// Applies command-line overrides on top of environment configuration.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(dsn) = &cli.database_dsn {
        config.database_dsn = Some(dsn.clone()).filter(|d| !d.is_empty());
    }
    if let Some(path) = &cli.file_storage_path {
        config.file_storage_path = Some(path.clone()).filter(|p| !p.as_os_str().is_empty());
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
}

async fn shorten(
    service: &ShortenerService<dyn Storage>,
    ctx: &RequestContext,
    url: &str,
) -> Result<()> {
    let shortened = service.shorten(ctx, url).await.map_err(describe)?;

    if shortened.is_created() {
        println!("{}", "✅ Short URL created".green().bold());
    } else {
        println!("{}", "ℹ️  URL was already shortened".yellow());
    }
    println!("  {}", shortened.short_url().bright_cyan());

    Ok(())
}

async fn batch(
    service: &ShortenerService<dyn Storage>,
    ctx: &RequestContext,
    file: &Path,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let items: Vec<BatchItem> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of batch items", file.display()))?;

    let results = service.shorten_batch(ctx, items).await.map_err(describe)?;

    println!(
        "  {:<20} {}",
        "Correlation ID".bright_white().bold(),
        "Short URL".bright_white().bold()
    );
    println!("  {}", "─".repeat(60).bright_black());
    for result in &results {
        println!(
            "  {:<20} {}",
            result.correlation_id.cyan(),
            result.short_url.bright_cyan()
        );
    }
    println!();
    println!(
        "  Total: {}",
        results.len().to_string().bright_white().bold()
    );

    Ok(())
}

async fn resolve(service: &ShortenerService<dyn Storage>, key: &str) -> Result<()> {
    let url = service.resolve(key).await.map_err(describe)?;
    println!("{url}");
    Ok(())
}

async fn list(
    service: &ShortenerService<dyn Storage>,
    ctx: &RequestContext,
    include_deleted: bool,
) -> Result<()> {
    let urls = service
        .user_urls(ctx, include_deleted)
        .await
        .map_err(describe)?;

    if urls.is_empty() {
        println!("{}", "  No URLs found".yellow());
        return Ok(());
    }

    println!(
        "  {:<40} {:<10} {}",
        "Short URL".bright_white().bold(),
        "Status".bright_white().bold(),
        "Original URL".bright_white().bold()
    );
    println!("  {}", "─".repeat(90).bright_black());

    for url in &urls {
        let status = if url.deleted {
            "DELETED".red()
        } else {
            "ACTIVE".green()
        };

        println!(
            "  {:<40} {:<10} {}",
            url.short_url.bright_cyan(),
            status,
            url.original_url
        );
    }

    println!();
    println!("  Total: {}", urls.len().to_string().bright_white().bold());

    Ok(())
}

async fn delete(
    service: &ShortenerService<dyn Storage>,
    ctx: &RequestContext,
    keys: Vec<String>,
    skip_confirm: bool,
) -> Result<()> {
    println!("  Keys: {}", keys.join(", ").cyan());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Delete these URLs?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    service.delete_urls(ctx, keys).await.map_err(describe)?;
    println!("{}", "✅ Deletion accepted".green().bold());

    Ok(())
}

async fn ping(service: &ShortenerService<dyn Storage>) -> Result<()> {
    let kind = service.storage().kind();
    service.ping().await.map_err(describe)?;
    println!("{} {}", "✅ Storage reachable:".green().bold(), kind);
    Ok(())
}

/// Attaches the stable error code to a service error.
fn describe(e: AppError) -> anyhow::Error {
    anyhow::anyhow!("[{}] {}", e.code(), e)
}
