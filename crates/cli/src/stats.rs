//! Run statistics.

use std::time::Duration;

use observability::{RunningStats, StatsSummary};

/// Statistics from a `track` run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Frames handed to the tracker
    pub frames: u64,

    /// Wall time of the run
    pub duration: Duration,

    /// Run stopped by a shutdown signal
    pub interrupted: bool,
}

impl RunStats {
    /// Frames per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Frames: {}", self.frames);
        println!("  FPS: {:.2}", self.fps());
        if self.interrupted {
            println!("  Interrupted by shutdown signal");
        }
    }
}

/// Round-trip latency of `client` frames
#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    latency_ms: RunningStats,
    total: Duration,
}

impl LatencyStats {
    pub fn record(&mut self, latency: Duration) {
        self.latency_ms.push(latency.as_secs_f64() * 1000.0);
        self.total += latency;
    }

    pub fn frames(&self) -> u64 {
        self.latency_ms.count()
    }

    /// Average frames per second over the time spent waiting for replies
    pub fn average_fps(&self) -> f64 {
        if self.total.is_zero() {
            0.0
        } else {
            self.frames() as f64 / self.total.as_secs_f64()
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Client Statistics ===");
        println!("  Frames: {}", self.frames());
        println!("  Latency (ms): {}", StatsSummary::from(&self.latency_ms));
        println!("  Average FPS: {:.2}", self.average_fps());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps() {
        let stats = RunStats {
            frames: 50,
            duration: Duration::from_secs(2),
            interrupted: false,
        };
        assert!((stats.fps() - 25.0).abs() < 1e-9);
        assert_eq!(RunStats::default().fps(), 0.0);
    }

    #[test]
    fn test_latency_average() {
        let mut stats = LatencyStats::default();
        for ms in [10, 30] {
            stats.record(Duration::from_millis(ms));
        }
        assert_eq!(stats.frames(), 2);
        assert!((stats.average_fps() - 50.0).abs() < 1e-6);
    }
}
