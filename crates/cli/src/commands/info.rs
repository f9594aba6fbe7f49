//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, TrackerConfig};
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    match args.config {
        Some(ref path) => info!(config = %path.display(), "Loading configuration info"),
        None => info!("No configuration file given, showing defaults"),
    }

    let config = load_config(args.config.as_deref())?;

    if args.json {
        let json = ConfigLoader::to_json(&config).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn print_config_info(config: &TrackerConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Pupil Tracker Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("👁  Tracking");
    println!("   └─ Mode: {:?}", config.mode);

    let sync = &config.synchronizer;
    println!("\n⏱  Synchronizer");
    println!(
        "   ├─ Poll: {} x {} ms (budget {} ms)",
        sync.max_poll_attempts,
        sync.poll_interval_ms,
        sync.wait_budget().as_millis()
    );
    println!("   ├─ Crop padding: {} px", sync.crop_padding_px);
    println!(
        "   └─ Default iris: max({} px, {} x width)",
        sync.min_default_diameter_px, sync.default_diameter_width_fraction
    );

    println!("\n🔆 Enhancer");
    println!("   └─ Sample size: {} px", config.enhancer.sample_size);

    let landmarks = &config.landmarks;
    println!("\n📍 Landmarks");
    println!("   ├─ Source: {:?}", landmarks.source);
    match landmarks.replay_path {
        Some(ref path) => println!("   ├─ Replay file: {}", path.display()),
        None => println!("   ├─ Replay file: (none)"),
    }
    println!("   ├─ Latency: {} ms", landmarks.latency_ms);
    println!("   └─ Drop every: {}", landmarks.drop_every);

    let output = &config.output;
    println!("\n📤 Outputs");
    println!("   ├─ Directory: {}", output.dir.display());
    if output.base_name.is_empty() {
        println!("   ├─ Base name: (timestamp)");
    } else {
        println!("   ├─ Base name: {}", output.base_name);
    }
    println!("   ├─ CSV: {}", on_off(output.csv));
    println!(
        "   ├─ Stream: {} ({:?}, {} fps)",
        on_off(output.stream),
        output.stream_layout,
        output.fps
    );
    println!("   ├─ Log: {}", on_off(output.log));
    println!("   └─ Queue capacity: {}", output.queue_capacity);

    println!("\n🌐 Server");
    println!("   ├─ Bind: {}", config.server.bind);
    println!("   ├─ Max frame: {} bytes", config.server.max_frame_bytes);
    println!("   └─ Write outputs: {}", on_off(config.server.write_outputs));

    println!();
}
