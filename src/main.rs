use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use twinsweep::{
    config::SweepConfig,
    db,
    models::{FilterError, RecordId, ScanFilter, parse_filter_pair},
    observability,
    sweep::{SweepError, SweepReport, Sweeper},
};

/// CLI arguments for the sweeper
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Purge duplicate and unreferenced WordPress attachments",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults to ./twinsweep.toml if it exists)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Report what would be deleted without deleting anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Extra scan filter as key=value, repeatable (e.g. post__in=1,2,3)
    #[arg(short, long = "filter", global = true, value_parser = parse_filter_arg)]
    filters: Vec<(String, String)>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Delete records named like an original with a numbered suffix
    NameTwins {
        /// Only look for twins of these records
        ids: Vec<RecordId>,
    },
    /// Delete every target record outside the keep-set
    KeepSet {
        /// Restrict the deletion scan to these records
        ids: Vec<RecordId>,
    },
    /// Delete records sharing a guid with a record referenced under `key`
    GuidTwins {
        /// Attribute key holding the referenced id list (e.g. `gallery`)
        #[arg(short, long)]
        key: String,
        /// Only scan these holder records
        ids: Vec<RecordId>,
    },
}

fn parse_filter_arg(arg: &str) -> Result<(String, String), FilterError> {
    parse_filter_pair(arg)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match SweepConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if args.dry_run {
        config.sweep.dry_run = true;
    }

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    match run(args.command, args.filters, config, cancel).await {
        Ok(report) => print!("{report}"),
        Err(SweepError::Cancelled) => {
            tracing::warn!("Sweep interrupted before completion");
            std::process::exit(130);
        }
        Err(e) => {
            tracing::error!(error = %e, "Sweep failed");
            std::process::exit(1);
        }
    }
}

async fn run(
    command: Command,
    filters: Vec<(String, String)>,
    config: SweepConfig,
    cancel: CancellationToken,
) -> Result<SweepReport, SweepError> {
    let pool = db::DbPool::from_config(&config.database).await?;
    pool.health_check().await?;

    let sweeper = Sweeper::new(pool.records(), config.sweep.clone()).with_cancellation(cancel);
    let target = config.sweep.target_filter();

    let result = match command {
        Command::NameTwins { ids } => {
            let filter = target.include(ids).apply_pairs(filters)?;
            sweeper.name_twins(filter).await
        }
        Command::KeepSet { ids } => {
            let filter = target.include(ids).apply_pairs(filters)?;
            sweeper.keep_set(&config.keep, filter).await
        }
        Command::GuidTwins { key, ids } => {
            let filter = ScanFilter::new().include(ids).apply_pairs(filters)?;
            sweeper.guid_twins(&key, filter).await
        }
    };

    pool.close().await;

    if let Ok(report) = &result {
        tracing::info!(
            operation = %report.operation,
            dry_run = report.dry_run,
            scanned = report.scanned,
            candidates = report.candidates.len(),
            "Sweep finished"
        );
    }
    result
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::warn!("Shutdown signal received, stopping before the next batch");
    cancel.cancel();
}
