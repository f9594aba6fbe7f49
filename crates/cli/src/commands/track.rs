//! `track` command implementation.

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Instant;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, TrackerConfig};
use contracts::{Frame, TrackingMode};
use tracing::{info, warn};
use tracker::{BatchTracker, PupilTracker, SessionSummary};

use super::{load_config, shutdown_signal};
use crate::cli::TrackArgs;
use crate::input;
use crate::stats::RunStats;

/// Timestamp used as output base name when none is configured
const BASE_NAME_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

/// Execute the `track` command
pub async fn run_track(args: &TrackArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        input = %args.input.display(),
        output_dir = %config.output.dir.display(),
        base_name = %config.output.base_name,
        batch = args.batch,
        mode = ?config.mode,
        "Configuration loaded"
    );

    let dir = args.input.clone();
    let frames = tokio::task::spawn_blocking(move || input::load_frames(&dir))
        .await
        .context("Frame loader task failed")??;

    let landmarks = detectors::landmark_detector_from_config(&config.landmarks)
        .context("Failed to create landmark detector")?;
    let (left, right) = detectors::pupil_detector_pair();
    let output_dir = config.output.dir.clone();

    let started = Instant::now();
    let mut stats = RunStats {
        frames: frames.len() as u64,
        ..Default::default()
    };
    let mut shutdown = pin!(shutdown_signal());

    let summary = if args.batch {
        let batch = BatchTracker::new(config, landmarks, left, right);
        tokio::select! {
            outcome = batch.run(frames) => {
                let outcome = outcome.context("Batch tracking failed")?;
                info!(canvas_side = outcome.canvas_side, records = outcome.records.len(), "Batch finished");
                outcome.summary
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, batch run abandoned");
                return Ok(());
            }
        }
    } else {
        let first = frames.first().context("No frames to track")?;
        let mut tracker =
            PupilTracker::new(config, landmarks, left, right, first.width(), first.height());
        tracker.init().await.context("Failed to initialize tracker")?;

        let (processed, interrupted, failure) = track_online(&mut tracker, &frames, &mut shutdown).await;
        stats.frames = processed;
        stats.interrupted = interrupted;
        let summary = tracker.stop().await;
        if let Some(e) = failure {
            return Err(e).context("Tracking failed");
        }
        summary
    };
    stats.duration = started.elapsed();

    report(&summary, &stats, &output_dir);
    Ok(())
}

/// Feed frames until done, a shutdown signal or an error
async fn track_online<S>(
    tracker: &mut PupilTracker,
    frames: &[Frame],
    shutdown: &mut std::pin::Pin<&mut S>,
) -> (u64, bool, Option<contracts::ContractError>)
where
    S: std::future::Future<Output = ()>,
{
    let mut processed = 0;
    for frame in frames {
        tokio::select! {
            biased;
            _ = shutdown.as_mut() => {
                warn!(frame_index = frame.index, "Received shutdown signal, stopping tracker...");
                return (processed, true, None);
            }
            result = tracker.process(frame) => {
                if let Err(e) = result {
                    return (processed, false, Some(e));
                }
                processed += 1;
            }
        }
    }
    (processed, false, None)
}

fn apply_overrides(config: &mut TrackerConfig, args: &TrackArgs) {
    let root = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.dir.clone());
    config.output.dir = root.join(input_name(&args.input));

    if let Some(ref base_name) = args.base_name {
        config.output.base_name = base_name.clone();
    } else if config.output.base_name.is_empty() {
        config.output.base_name = chrono::Local::now().format(BASE_NAME_FORMAT).to_string();
    }
    if let Some(fps) = args.fps {
        config.output.fps = fps;
    }
    if args.no_csv {
        config.output.csv = false;
    }
    if args.no_stream {
        config.output.stream = false;
    }
    if args.single_eye {
        config.mode = TrackingMode::SingleEye;
    }
}

/// Last path component of the input directory
fn input_name(input: &Path) -> PathBuf {
    input
        .canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(input)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("input"))
}

fn report(summary: &SessionSummary, stats: &RunStats, output_dir: &Path) {
    println!("\n{summary}");
    stats.print_summary();
    println!("  Outputs: {}", output_dir.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> TrackArgs {
        let mut argv = vec!["track", "--input", "/data/session_a"];
        argv.extend_from_slice(extra);
        TrackArgs::parse_from(argv)
    }

    #[test]
    fn test_output_dir_per_input() {
        let mut config = TrackerConfig::default();
        apply_overrides(&mut config, &args(&["--output-dir", "/out", "--base-name", "run1"]));
        assert_eq!(config.output.dir, PathBuf::from("/out/session_a"));
        assert_eq!(config.output.base_name, "run1");
    }

    #[test]
    fn test_default_base_name_is_timestamp() {
        let mut config = TrackerConfig::default();
        apply_overrides(&mut config, &args(&["--no-csv", "--fps", "60", "--single-eye"]));

        let name = &config.output.base_name;
        assert!(chrono::NaiveDateTime::parse_from_str(name, BASE_NAME_FORMAT).is_ok(), "{name}");
        assert!(!config.output.csv && config.output.stream);
        assert_eq!(config.output.fps, 60.0);
        assert_eq!(config.mode, TrackingMode::SingleEye);
    }
}
