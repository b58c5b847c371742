//! Catalog Sync - Main entry point

use anyhow::{Context, Result};
use catalog_common::logging::{init_logging, LogConfig, LogLevel};
use clap::Parser;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{io::AsyncReadExt, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use catalog_sync::{
    cache::RedisCache,
    config::Config,
    db,
    storage::Storage,
    sync::{BatchOrchestrator, BlobLocation, InvocationReport, PgProductStore, S3Event},
};

#[derive(Parser, Debug)]
#[command(name = "catalog-sync")]
#[command(author, version, about = "Sync uploaded product CSV files into PostgreSQL and Redis")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Process an S3 event notification
    Handle {
        /// Notification JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: PathBuf,
    },

    /// Process a single object
    Sync {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long)]
        key: String,
    },

    /// Check PostgreSQL and Redis connectivity
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("catalog-sync")
        .filter_directives("sqlx=warn,aws_config=warn,aws_smithy_runtime=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let config = Config::load()?;

    match cli.command {
        Command::Handle { event } => {
            let payload = read_event(&event).await?;
            let locations = S3Event::from_json(&payload)?.locations()?;
            info!(units = locations.len(), "Received event notification");

            let report = run(&config, &locations).await?;
            finish(&report)
        },
        Command::Sync { bucket, key } => {
            let report = run(&config, &[BlobLocation::new(bucket, key)]).await?;
            finish(&report)
        },
        Command::Check => check(&config).await,
    }
}

async fn run(config: &Config, locations: &[BlobLocation]) -> Result<InvocationReport> {
    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let cache = RedisCache::connect(&config.cache)
        .await
        .context("Failed to connect to Redis")?;
    let storage = Storage::new(config.storage.clone()).await;

    let orchestrator = BatchOrchestrator::new(
        Arc::new(storage),
        Arc::new(PgProductStore::new(pool)),
        Arc::new(cache),
        config.sync.clone(),
    );

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let report = orchestrator.process_invocation(locations, &cancel).await;
    signals.abort();

    Ok(report)
}

fn finish(report: &InvocationReport) -> Result<()> {
    if !report.is_success() {
        match report.first_error() {
            Some((location, err)) => anyhow::bail!("Failed to sync {}: {}", location, err),
            None => anyhow::bail!(
                "Sync cancelled with {} unit(s) not attempted",
                report.not_attempted.len()
            ),
        }
    }

    info!(
        invocation_id = %report.invocation_id,
        units = report.units.len(),
        entity_failures = report.entity_failures(),
        "Sync complete"
    );
    Ok(())
}

async fn check(config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.database).await?;
    db::health_check(&pool).await?;
    info!("PostgreSQL is reachable");

    let cache = RedisCache::connect(&config.cache).await?;
    cache.ping().await?;
    info!("Redis is reachable");

    Ok(())
}

async fn read_event(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut payload = Vec::new();
        tokio::io::stdin().read_to_end(&mut payload).await?;
        return Ok(payload);
    }

    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read event file {}", path.display()))
}

/// Cancel `token` on Ctrl+C or SIGTERM
///
/// Products already being written complete; the rest are not attempted.
async fn cancel_on_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling sync");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling sync");
        },
    }

    token.cancel();
}
