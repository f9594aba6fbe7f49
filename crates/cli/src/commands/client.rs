//! `client` command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use contracts::Frame;
use stream_server::{Handshake, PupilClient};
use tracing::{debug, info};

use crate::cli::ClientArgs;
use crate::input;
use crate::stats::LatencyStats;

/// Frames on the wire are BGR
const BYTES_PER_PIXEL: u32 = 3;

/// Execute the `client` command
pub async fn run_client(args: &ClientArgs) -> Result<()> {
    let frames: Vec<Frame> = match (&args.input, args.synthetic) {
        (Some(dir), _) => {
            let dir = dir.clone();
            tokio::task::spawn_blocking(move || input::load_frames(&dir))
                .await
                .context("Frame loader task failed")??
        }
        (None, Some(count)) => (0..count)
            .map(|i| input::synthetic_frame(args.width, args.height, i))
            .collect(),
        (None, None) => anyhow::bail!("Either --input or --synthetic is required"),
    };
    let first = frames.first().context("No frames to send")?;

    let handshake = Handshake::new(first.width(), first.height(), BYTES_PER_PIXEL, args.fps);
    let mut client = PupilClient::connect(args.addr.as_str(), handshake)
        .await
        .with_context(|| format!("Failed to connect to {}", args.addr))?;
    info!(addr = %args.addr, frames = frames.len(), ?handshake, "Connected");

    let mut latency = LatencyStats::default();
    for frame in &frames {
        let bytes = input::to_bgr(frame);
        let sent = Instant::now();
        let reply = client
            .send_frame(&bytes)
            .await
            .with_context(|| format!("Frame {} was not answered", frame.index))?;
        let elapsed = sent.elapsed();
        latency.record(elapsed);

        debug!(
            frame_index = frame.index,
            left_diameter = reply.left_diameter,
            left_relative = reply.left_relative,
            left_confidence = reply.left_confidence,
            right_diameter = reply.right_diameter,
            right_relative = reply.right_relative,
            right_confidence = reply.right_confidence,
            latency_ms = elapsed.as_secs_f64() * 1000.0,
            "Reply"
        );
    }

    client.finish().await.context("Failed to close session")?;
    latency.print_summary();
    Ok(())
}
