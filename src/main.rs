//! Radish - An In-Memory Key-Value Server with Key Expiration
//!
//! This is the main entry point for the Radish server.
//! It sets up logging, the store and TTL scheduler, and the TCP listener,
//! and shuts everything down on Ctrl+C or SIGTERM.

use anyhow::Context;
use clap::Parser;
use radish::commands::CommandHandler;
use radish::connection::ConnectionStats;
use radish::storage::{Store, TtlScheduler};
use radish::Config;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
Radish v{} - In-Memory Key-Value Server
───────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        radish::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log filter: {}", config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let cancel = CancellationToken::new();

    // Create the store (shared across all connections)
    let store = Arc::new(Store::new());

    // Expired keys are removed from the store by the scheduler's callback
    let ttl = Arc::new(TtlScheduler::start(&cancel, config.expiry_config(), {
        let store = Arc::clone(&store);
        move |key: String| {
            let existed = store.delete(&key);
            debug!(key = %key, existed, "Expired key deleted");
        }
    }));

    let handler = CommandHandler::new(Arc::clone(&store), Arc::clone(&ttl));
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    print_banner(&config);

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping server...");
            cancel.cancel();
        }
    });

    radish::server::serve(listener, handler, Arc::clone(&stats), cancel.clone()).await;

    ttl.shutdown().await;

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        protocol_errors = stats.protocol_errors.load(Ordering::Relaxed),
        keys = store.len(),
        "Server shutdown complete"
    );
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                debug!(error = %e, "SIGTERM handler unavailable");
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
