//! RecordDispatcher - fan-out of aligned records to the configured sinks

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use contracts::{OutputConfig, OutputRecord};

use crate::error::AlignerError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{CsvSink, LogSink, StreamSink};

/// Per-sink outcome of a dispatcher shutdown
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl DispatchReport {
    /// Every sink wrote, flushed and closed without error
    pub fn is_clean(&self) -> bool {
        self.sinks.iter().all(|(_, snapshot)| snapshot.is_clean())
    }

    /// Records written by the named sink
    pub fn written(&self, sink: &str) -> Option<u64> {
        self.sinks
            .iter()
            .find(|(name, _)| name == sink)
            .map(|(_, snapshot)| snapshot.write_count)
    }
}

/// Fans records out to every sink handle
pub struct RecordDispatcher {
    handles: Vec<SinkHandle>,
}

impl RecordDispatcher {
    /// Create a dispatcher with custom sink handles
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self { handles }
    }

    /// Open the sinks enabled in `config` inside `dir`
    ///
    /// # Errors
    /// `SinkCreation` if any output file cannot be created.
    #[instrument(
        name = "dispatcher_from_output_config",
        skip(config, dir),
        fields(dir = %dir.display(), csv = config.csv, stream = config.stream)
    )]
    pub async fn from_output_config(
        config: &OutputConfig,
        dir: &Path,
        base_name: &str,
    ) -> Result<Self, AlignerError> {
        let mut handles = Vec::new();

        if config.csv {
            let sink = CsvSink::create(dir, base_name)
                .map_err(|e| AlignerError::sink_creation("csv", e.to_string()))?;
            handles.push(SinkHandle::spawn(sink, config.queue_capacity));
        }
        if config.stream {
            let sink = StreamSink::create(dir, base_name, config.stream_layout, config.fps)
                .map_err(|e| AlignerError::sink_creation("stream", e.to_string()))?;
            handles.push(SinkHandle::spawn(sink, config.queue_capacity));
        }
        if config.log {
            handles.push(SinkHandle::spawn(LogSink::new("log"), config.queue_capacity));
        }

        debug!(sinks = handles.len(), "Record sinks opened");
        Ok(Self { handles })
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Send one record to every sink; false if any sink is gone
    pub async fn dispatch(&self, record: &OutputRecord) -> bool {
        let mut delivered = true;
        for handle in &self.handles {
            delivered &= handle.send(*record).await;
        }
        delivered
    }

    /// Send all records in order
    #[instrument(name = "dispatcher_write_all", skip(self, records), fields(records = records.len()))]
    pub async fn write_all(&self, records: &[OutputRecord]) -> bool {
        let mut delivered = true;
        for record in records {
            delivered &= self.dispatch(record).await;
        }
        delivered
    }

    /// Close every sink and collect its counters
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) -> DispatchReport {
        let mut report = DispatchReport::default();
        for handle in self.handles {
            let name = handle.name().to_string();
            let snapshot = handle.shutdown().await;
            if !snapshot.is_clean() {
                warn!(sink = %name, %snapshot, "Sink finished with failures");
            }
            report.sinks.push((name, snapshot));
        }
        info!(sinks = report.sinks.len(), clean = report.is_clean(), "Record sinks closed");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::MockSink;
    use crate::sinks::parse_csv;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fanout_to_every_sink() {
        let counts: Vec<Arc<AtomicU64>> = (0..2).map(|_| Arc::new(AtomicU64::new(0))).collect();
        let handles = counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                SinkHandle::spawn(
                    MockSink {
                        name: format!("sink{i}"),
                        write_count: Arc::clone(count),
                        should_fail: false,
                        delay_ms: 0,
                    },
                    4,
                )
            })
            .collect();

        let dispatcher = RecordDispatcher::with_handles(handles);
        let records: Vec<OutputRecord> = (0..5).map(|i| OutputRecord::new(i, None, None)).collect();
        assert!(dispatcher.write_all(&records).await);

        let report = dispatcher.shutdown().await;
        assert!(report.is_clean());
        assert_eq!(report.written("sink1"), Some(5));
        for count in counts {
            assert_eq!(count.load(Ordering::Relaxed), 5);
        }
    }

    #[tokio::test]
    async fn test_from_output_config_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig::default();

        let dispatcher = RecordDispatcher::from_output_config(&config, dir.path(), "cfg")
            .await
            .unwrap();
        assert_eq!(dispatcher.sink_names(), vec!["csv", "stream"]);

        let records: Vec<OutputRecord> = (0..3).map(|i| OutputRecord::new(i, None, None)).collect();
        dispatcher.write_all(&records).await;
        assert!(dispatcher.shutdown().await.is_clean());

        let csv = std::fs::read_to_string(dir.path().join("cfg_PUPIL_DATA.csv")).unwrap();
        assert_eq!(parse_csv(&csv).unwrap(), records);
        assert!(dir.path().join("cfg_PUPIL_DATA.stream").exists());
        let data = std::fs::read(dir.path().join("cfg_PUPIL_DATA.stream~")).unwrap();
        assert_eq!(data.len(), 3 * 6 * 4);
    }

    #[tokio::test]
    async fn test_disabled_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            csv: false,
            stream: false,
            ..Default::default()
        };
        let dispatcher = RecordDispatcher::from_output_config(&config, dir.path(), "none")
            .await
            .unwrap();
        assert!(dispatcher.is_empty());
        assert!(dispatcher.shutdown().await.is_clean());
    }

    #[tokio::test]
    async fn test_missing_dir_is_creation_error() {
        let config = OutputConfig::default();
        let err = RecordDispatcher::from_output_config(&config, Path::new("/nonexistent/out"), "x")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AlignerError::SinkCreation { .. }));
    }
}
