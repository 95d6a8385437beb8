// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `autosizer serve` command.

use autosizer_config::model::AutosizerConfig;
use autosizer_core::AutosizerError;
use autosizer_gateway::{start_server, GatewayState, ServerConfig};
use tracing::{info, warn};

/// Runs the `autosizer serve` command until SIGINT or SIGTERM.
pub async fn run_serve(config: AutosizerConfig) -> Result<(), AutosizerError> {
    init_tracing(&config.server.log_level);

    info!(
        target_url = %config.upstream.base_url,
        short_max_words = config.classifier.short_max_words,
        normal_max_words = config.classifier.normal_max_words,
        tail_tokens = config.trim.tail_tokens,
        downgrade = config.downgrade.enabled,
        "starting autosizer serve"
    );

    let state = GatewayState::from_config(&config)?;
    start_server(&ServerConfig::from(&config.server), state, shutdown_signal()).await?;

    info!("autosizer stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
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
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT (Ctrl+C), shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// `RUST_LOG` wins; otherwise our crates log at `log_level`.
fn default_filter(log_level: &str) -> String {
    format!("autosizer={log_level},tower_http=info,warn")
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
