//! strata CLI and REST API entry point.
//!
//! Parses CLI arguments, wires storage and providers, then dispatches to a
//! command handler or starts the extraction workers and the REST API server.

mod cli;
mod http;
mod state;
#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_complete::generate;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use strata_core::job::worker::ExtractionWorkerPool;
use strata_core::service::MemoryService;
use strata_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        default_filter: TracingOptions::filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
        json: false,
        otel: cli.otel,
    };
    if let Err(e) = init_tracing(&options) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "strata", &mut std::io::stdout());
        return Ok(());
    }

    let (state, receiver) = AppState::init().await?;

    let result = match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            let cancel = CancellationToken::new();
            let workers = ExtractionWorkerPool::new(
                state.memory_service.orchestrator(),
                receiver,
                state.config.worker.clone(),
                cancel.clone(),
            )
            .spawn();
            let sweeper = spawn_rate_gate_sweeper(
                Arc::clone(&state.memory_service),
                state.config.rate_gate.min_interval_secs,
                cancel.clone(),
            );

            println!(
                "  {} strata API listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!(
                "  {}",
                console::style(format!("Data directory: {}", state.data_dir.display())).dim()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await;

            cancel.cancel();
            if let Err(e) = workers.await {
                tracing::error!(error = %e, "extraction worker pool panicked");
            }
            if let Some(sweeper) = sweeper {
                let _ = sweeper.await;
            }

            println!("\n  Server stopped.");
            served.map_err(anyhow::Error::from)
        }

        Commands::Extract {
            owner,
            chat,
            message,
            text,
            context,
        } => cli::memory::extract(&state, owner, chat, message, text, context, cli.json).await,

        Commands::Recall { owner, query } => {
            cli::memory::recall(&state, owner, query, cli.json).await
        }

        Commands::Layers { owner } => cli::memory::layers(&state, owner, cli.json).await,

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}

/// Periodically drop rate-gate entries whose interval has passed.
///
/// Returns `None` when gating is disabled and there is nothing to sweep.
fn spawn_rate_gate_sweeper(
    service: Arc<MemoryService>,
    min_interval_secs: i64,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !service.rate_gate().is_enabled() {
        return None;
    }
    let period = Duration::from_secs(min_interval_secs.max(60).unsigned_abs());

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = service.rate_gate().sweep_expired(chrono::Utc::now());
                    if removed > 0 {
                        tracing::debug!(removed, "swept expired rate-gate entries");
                    }
                }
            }
        }
    }))
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
}
