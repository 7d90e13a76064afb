use std::process;
use std::sync::Arc;

use queued::{QueueRegistry, QueueServer, ServerConfig};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = ServerConfig::from_args(std::env::args_os()).unwrap_or_else(|e| {
        eprintln!("{e}");
        if e.exit_code() != queued::config::exit_code::USAGE {
            eprintln!("Try -h or --help for help");
        }
        process::exit(e.exit_code());
    });

    let registry = Arc::new(QueueRegistry::new(config.allow_duplicates));
    let server = Arc::new(QueueServer::new(config, registry.clone()));

    {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                if let Err(e) = server.stop() {
                    tracing::warn!("stop failed: {}", e);
                }
            }
        });
    }

    if let Err(e) = server.start().await {
        tracing::error!("{}", e);
        process::exit(2);
    }

    match serde_json::to_string(&registry.stats_summary()) {
        Ok(summary) => tracing::info!(stats = %summary, "queued stopped"),
        Err(e) => tracing::warn!("failed to serialize stats: {}", e),
    }
}
