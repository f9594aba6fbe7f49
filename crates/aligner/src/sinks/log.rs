//! LogSink - traces every aligned record

use contracts::{ContractError, OutputRecord, RecordSink};
use tracing::{debug, info, instrument};

/// Sink that reports records through `tracing` instead of a file
pub struct LogSink {
    name: String,
    records: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: 0,
        }
    }
}

impl RecordSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, record),
        fields(sink = %self.name, frame_index = record.frame_index)
    )]
    async fn write(&mut self, record: &OutputRecord) -> Result<(), ContractError> {
        debug!(
            left_diameter = record.left.diameter,
            left_confidence = record.left.confidence,
            right_diameter = record.right.diameter,
            right_confidence = record.right.confidence,
            "Pupil record"
        );
        self.records += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, records = self.records, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PupilMeasurement;

    #[tokio::test]
    async fn test_log_sink_counts_records() {
        let mut sink = LogSink::new("log");
        let m = PupilMeasurement::missing(0);
        for i in 0..3 {
            sink.write(&OutputRecord::new(i, Some(m), None)).await.unwrap();
        }
        sink.close().await.unwrap();
        assert_eq!(sink.records, 3);
        assert_eq!(sink.name(), "log");
    }
}
