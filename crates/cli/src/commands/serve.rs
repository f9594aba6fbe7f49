//! `serve` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use stream_server::PupilServer;
use tracing::info;

use super::{load_config, shutdown_signal};
use crate::cli::ServeArgs;

/// Execute the `serve` command
pub async fn run_serve(args: &ServeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref bind) = args.bind {
        info!(bind = %bind, "Overriding bind address from CLI");
        config.server.bind = bind.clone();
    }
    if let Some(ref dir) = args.output_dir {
        config.output.dir = dir.clone();
    }
    if args.no_outputs {
        config.server.write_outputs = false;
    }
    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        bind = %config.server.bind,
        output_dir = %config.output.dir.display(),
        write_outputs = config.server.write_outputs,
        landmarks = ?config.landmarks.source,
        "Starting server..."
    );

    let server = PupilServer::bind(config)
        .await
        .context("Failed to start server")?;
    let report = server.run(shutdown_signal()).await;

    println!("\n=== Server Statistics ===");
    println!("  Sessions: {}", report.sessions);
    println!("  Failed sessions: {}", report.failed);

    info!("Pupil Tracker server finished");
    Ok(())
}
