//! Command implementations.

mod client;
mod info;
mod serve;
mod track;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, TrackerConfig};
use tracing::warn;

use crate::error::CliError;

pub use client::run_client;
pub use info::run_info;
pub use serve::run_serve;
pub use track::run_track;
pub use validate::run_validate;

/// Load `path` or fall back to defaults when no file is given
fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(CliError::config_not_found(path).into());
        }
    }
    ConfigLoader::load_or_default(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Default configuration is invalid".to_string(),
    })
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
