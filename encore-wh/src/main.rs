//! encore-wh - CMS webhook service for release track durations
//!
//! Receives release change notifications from the CMS, measures audio for
//! tracks that lack a duration, and patches the durations back.
//!
//! Subcommands:
//! - `serve` (default): run the HTTP service
//! - `backfill [--dry-run]`: process every release still missing durations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use encore_common::config::ServiceConfig;
use encore_common::time::SystemClock;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

use encore_wh::services::FilterRules;
use encore_wh::{build_extractor, build_processor, build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "encore-wh", version, about = "Release duration webhook service")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides config and ENCORE_BIND_ADDR
    #[arg(long)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the webhook HTTP service
    Serve,
    /// Fill in durations for all releases still missing them
    Backfill {
        /// Only report what would be processed
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise the config's logging.level is applied once loaded
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    info!(
        "Starting encore-wh v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = ServiceConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }

    if !rust_log_set {
        match EnvFilter::try_new(&config.logging.level) {
            Ok(level_filter) => filter_handle.reload(level_filter)?,
            Err(e) => warn!(
                "Invalid logging.level '{}', keeping 'info': {}",
                config.logging.level, e
            ),
        }
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Backfill { dry_run } => backfill(config, dry_run).await,
    }
}

async fn serve(config: ServiceConfig) -> Result<()> {
    if config.webhook.secret.is_empty() {
        warn!("Webhook signature verification DISABLED (no secret configured)");
    } else {
        info!("Webhook signature verification enabled");
    }
    if config.cms.token.is_empty() {
        warn!("No CMS token configured; patches will be sent unauthenticated");
    }

    let processor = build_processor(&config, Arc::new(SystemClock))
        .context("Failed to build webhook processor")?;
    info!(
        document_type = %config.webhook.document_type,
        retry_window_secs = config.ledger.retry_window_secs,
        max_retries = config.ledger.max_retries,
        expiry_secs = config.ledger.expiry_secs,
        "Webhook processor ready"
    );

    let state = AppState::new(Arc::new(processor), &config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!("encore-wh listening on http://{}", config.server.bind_addr);
    info!("Health check: http://{}/health", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("encore-wh stopped");
    Ok(())
}

async fn backfill(config: ServiceConfig, dry_run: bool) -> Result<()> {
    let extractor = build_extractor(&config).context("Failed to build extractor")?;
    let rules = FilterRules::from(&config.webhook);

    let summary = encore_wh::backfill::run_backfill(&extractor, &rules, dry_run)
        .await
        .context("Backfill query failed")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.patch_failures > 0 {
        anyhow::bail!("{} document patch(es) failed", summary.patch_failures);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
