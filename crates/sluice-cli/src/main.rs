#![doc = include_str!("../README.md")]

mod config;
mod telemetry;
mod workload;

use clap::Parser;
use config::{CliArgs, RunConfig};
use telemetry::init_telemetry;
use tokio::signal;
use workload::RunSummary;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let res = workload::run(&config, shutdown_signal()).await;
    if let Ok(summary) = &res {
        print_summary(summary, config.json)?;
    }

    providers.shutdown();
    res.map(|_| ())
}

fn log_startup_info(_config: &RunConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting worker pool with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting {} workers for {} jobs",
            _config.pool.num_workers,
            _config.jobs
        );
    }
}

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    let report = &summary.report;

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("submitted:   {}", report.submitted);
    println!(
        "delivered:   {} ({} succeeded, {} failed, {} panicked)",
        report.delivered(),
        report.succeeded,
        report.failed,
        report.panicked
    );
    println!("interrupted: {}", report.interrupted.len());
    println!("abandoned:   {}", report.abandoned.len());
    if report.undelivered > 0 {
        println!("undelivered: {}", report.undelivered);
    }
    if summary.unsubmitted > 0 {
        println!("unsubmitted: {}", summary.unsubmitted);
    }
    println!("cancelled:   {}", report.cancelled);

    if !report.is_balanced() {
        anyhow::bail!("pool report does not account for every submitted job");
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }
}
