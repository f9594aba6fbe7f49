//! Replay landmark detector - 回放预先录制的关键点
//!
//! 录制文件是一个 JSON 数组 `[{"timestamp": 0, "points": [[x, y], ...]}, ...]`，
//! 每次提交帧时按时间戳查找并输出对应的关键点包。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use contracts::{ContractError, Frame, LandmarkDetector, LandmarkPacket, LandmarkPoller};
use tracing::{info, instrument, trace};

use crate::error::{DetectorError, Result};
use crate::worker::DetectorWorker;

/// Replay Detector - 按提交的时间戳回放关键点
pub struct ReplayLandmarkDetector {
    source: PathBuf,
    packets: Arc<HashMap<u64, LandmarkPacket>>,
    latency: Duration,
    worker: Option<DetectorWorker>,
}

impl ReplayLandmarkDetector {
    /// 从录制文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| DetectorError::ReplayRead {
            path: path.to_path_buf(),
            source,
        })?;
        let packets: Vec<LandmarkPacket> =
            serde_json::from_str(&text).map_err(|source| DetectorError::ReplayParse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut by_timestamp = HashMap::with_capacity(packets.len());
        for packet in packets {
            let timestamp = packet.timestamp;
            if by_timestamp.insert(timestamp, packet).is_some() {
                return Err(DetectorError::DuplicateTimestamp {
                    path: path.to_path_buf(),
                    timestamp,
                });
            }
        }

        info!(
            path = %path.display(),
            packets = by_timestamp.len(),
            "Loaded landmark replay"
        );

        Ok(Self {
            source: path.to_path_buf(),
            packets: Arc::new(by_timestamp),
            latency: Duration::ZERO,
            worker: None,
        })
    }

    /// 从内存中的关键点包构建（测试用）
    pub fn from_packets(packets: Vec<LandmarkPacket>) -> Self {
        Self {
            source: PathBuf::from("<memory>"),
            packets: Arc::new(packets.into_iter().map(|p| (p.timestamp, p)).collect()),
            latency: Duration::ZERO,
            worker: None,
        }
    }

    /// 每帧的模拟处理延迟
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 录制的关键点包数量
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

impl LandmarkDetector for ReplayLandmarkDetector {
    fn name(&self) -> &str {
        "replay"
    }

    #[instrument(name = "replay_detector_start", skip(self), fields(source = %self.source.display()))]
    fn start(&mut self) -> std::result::Result<Box<dyn LandmarkPoller>, ContractError> {
        if self.worker.is_some() {
            return Err(ContractError::invalid_state("replay detector", "started", "start"));
        }

        let packets = Arc::clone(&self.packets);
        let latency = self.latency;
        let (worker, poller) = DetectorWorker::spawn("replay", move |_frame, timestamp| {
            if !latency.is_zero() {
                thread::sleep(latency);
            }
            let packet = packets.get(&timestamp).cloned();
            if packet.is_none() {
                trace!(timestamp, "No recorded landmarks");
            }
            packet
        })?;
        self.worker = Some(worker);
        Ok(Box::new(poller))
    }

    fn submit(&mut self, frame: &Frame, timestamp: u64) -> std::result::Result<(), ContractError> {
        match &self.worker {
            Some(worker) => worker.submit(frame, timestamp),
            None => Err(ContractError::invalid_state("replay detector", "idle", "submit")),
        }
    }

    fn close_input(&mut self) -> std::result::Result<(), ContractError> {
        if let Some(worker) = self.worker.as_mut() {
            worker.close();
        }
        Ok(())
    }

    fn wait_until_done(&mut self) -> std::result::Result<(), ContractError> {
        match self.worker.as_mut() {
            Some(worker) => worker.join(),
            None => Ok(()),
        }
    }
}
