use clap::Parser;
use hotrank::{Config, RankingCycle, Scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// hotrank - publishes a live-viewer ranking of popular videos
#[derive(Parser, Debug)]
#[command(name = "hotrank")]
#[command(version, about, long_about = None)]
struct Args {
    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Snapshot path, overrides OUTPUT_PATH
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(output) = args.output {
        config.output_path = output;
    }

    tracing::info!(
        "Starting hotrank interval={}s output={} items={} concurrency={}",
        config.update_interval_secs,
        config.output_path.display(),
        config.max_items,
        config.max_concurrency
    );

    let cycle = Arc::new(RankingCycle::from_config(&config)?);

    if let Some(existing) = cycle.writer().read_existing().await {
        tracing::info!(
            "Serving existing snapshot from {} ({} items)",
            existing.updated_at,
            existing.items.len()
        );
    }

    if args.once {
        cycle.run_once().await?;
        return Ok(());
    }

    let stop = CancellationToken::new();
    let abort = CancellationToken::new();
    tokio::spawn(watch_signals(stop.clone(), abort.clone()));

    Scheduler::new(cycle, config.update_interval(), stop)
        .with_abort(abort)
        .run()
        .await;

    Ok(())
}

/// First signal: finish the current cycle, then stop. Second signal: drop it.
async fn watch_signals(stop: CancellationToken, abort: CancellationToken) {
    shutdown_signal().await;
    tracing::info!("Stop signal received, finishing current cycle");
    stop.cancel();

    shutdown_signal().await;
    tracing::warn!("Second stop signal received, abandoning current cycle");
    abort.cancel();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
