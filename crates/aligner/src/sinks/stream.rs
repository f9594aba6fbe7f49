//! StreamSink - raw float stream plus XML sidecar
//!
//! `{base}_PUPIL_DATA.stream~` holds back-to-back native-endian f32 values,
//! `{base}_PUPIL_DATA.stream` describes them. The sidecar is written on close
//! once the record count is known.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{ContractError, OutputRecord, RecordSink, StreamLayout};
use tracing::{debug, instrument};

use super::OUTPUT_SUFFIX;

/// Sink that writes the SSI binary stream
pub struct StreamSink {
    name: String,
    header_path: PathBuf,
    data_path: PathBuf,
    writer: Option<BufWriter<File>>,
    layout: StreamLayout,
    fps: f64,
    count: u64,
}

impl StreamSink {
    /// Create the data file; the sidecar follows on close
    pub fn create(
        dir: &Path,
        base_name: &str,
        layout: StreamLayout,
        fps: f64,
    ) -> Result<Self, ContractError> {
        let header_path = dir.join(format!("{base_name}{OUTPUT_SUFFIX}.stream"));
        let data_path = dir.join(format!("{base_name}{OUTPUT_SUFFIX}.stream~"));
        let file = File::create(&data_path).map_err(|e| {
            ContractError::sink_creation("stream", format!("{}: {e}", data_path.display()))
        })?;

        debug!(path = %data_path.display(), ?layout, fps, "Stream sink created");
        Ok(Self {
            name: "stream".to_string(),
            header_path,
            data_path,
            writer: Some(BufWriter::new(file)),
            layout,
            fps,
            count: 0,
        })
    }

    pub fn header_path(&self) -> &Path {
        &self.header_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn values(&self, record: &OutputRecord) -> Vec<f32> {
        let (l, r) = (&record.left, &record.right);
        match self.layout {
            StreamLayout::Compact => vec![l.diameter, l.confidence, r.diameter, r.confidence],
            StreamLayout::Extended => vec![
                l.diameter,
                l.diameter_relative,
                l.confidence,
                r.diameter,
                r.diameter_relative,
                r.confidence,
            ],
        }
    }
}

/// SSI sidecar for `count` samples
pub fn stream_header(fps: f64, dimensions: usize, count: u64) -> String {
    let duration = if fps > 0.0 { count as f64 / fps } else { 0.0 };
    format!(
        "<?xml version=\"1.0\" ?>\n\
         <stream ssi-v=\"2\">\n\
         \x20   <info ftype=\"BINARY\" sr=\"{fps}\" dim=\"{dimensions}\" byte=\"{byte}\" type=\"FLOAT\" />\n\
         \x20   <meta />\n\
         \x20   <chunk from=\"0.000000\" to=\"{duration:.6}\" byte=\"0\" num=\"{count}\"/>\n\
         </stream>\n",
        byte = std::mem::size_of::<f32>(),
    )
}

impl RecordSink for StreamSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &OutputRecord) -> Result<(), ContractError> {
        let values = self.values(record);
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_write("stream", "sink already closed"))?;
        writer
            .write_all(bytemuck::cast_slice(values.as_slice()))
            .map_err(|e| ContractError::sink_write("stream", e.to_string()))?;
        self.count += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        match self.writer.as_mut() {
            Some(writer) => writer
                .flush()
                .map_err(|e| ContractError::sink_write("stream", e.to_string())),
            None => Ok(()),
        }
    }

    #[instrument(name = "stream_sink_close", skip(self), fields(path = %self.header_path.display()))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .map_err(|e| ContractError::sink_write("stream", e.to_string()))?;

        let header = stream_header(self.fps, self.layout.dimensions(), self.count);
        fs::write(&self.header_path, header)
            .map_err(|e| ContractError::sink_write("stream", e.to_string()))?;

        debug!(samples = self.count, "Stream sink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PupilMeasurement, PupilObservation};

    fn record(index: u64) -> OutputRecord {
        let obs = PupilObservation {
            diameter: 10.0 + index as f32,
            confidence: 0.5,
            timestamp: index,
        };
        OutputRecord::new(
            index,
            Some(PupilMeasurement::from_observation(index, &obs, 40.0)),
            None,
        )
    }

    #[test]
    fn test_header_text() {
        let expected = "<?xml version=\"1.0\" ?>\n\
<stream ssi-v=\"2\">\n    <info ftype=\"BINARY\" sr=\"30\" dim=\"4\" byte=\"4\" type=\"FLOAT\" />\n    <meta />\n    <chunk from=\"0.000000\" to=\"0.100000\" byte=\"0\" num=\"3\"/>\n</stream>\n";
        assert_eq!(stream_header(30.0, 4, 3), expected);
        assert!(stream_header(29.97, 6, 0).contains("sr=\"29.97\" dim=\"6\""));
    }

    #[tokio::test]
    async fn test_compact_layout_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = StreamSink::create(dir.path(), "s", StreamLayout::Compact, 30.0).unwrap();
        sink.write(&record(0)).await.unwrap();
        sink.write(&record(1)).await.unwrap();
        sink.close().await.unwrap();

        let bytes = std::fs::read(sink.data_path()).unwrap();
        assert_eq!(bytes.len(), 2 * 4 * 4);
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(values, vec![10.0, 0.5, -1.0, -1.0, 11.0, 0.5, -1.0, -1.0]);

        let header = std::fs::read_to_string(sink.header_path()).unwrap();
        assert!(header.contains("num=\"2\""));
        assert!(header.contains("dim=\"4\""));
    }

    #[tokio::test]
    async fn test_extended_layout_includes_relative() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = StreamSink::create(dir.path(), "e", StreamLayout::Extended, 25.0).unwrap();
        sink.write(&record(0)).await.unwrap();
        sink.close().await.unwrap();

        let bytes = std::fs::read(dir.path().join("e_PUPIL_DATA.stream~")).unwrap();
        assert_eq!(bytes.len(), 6 * 4);
        let rel = f32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(rel, 0.25);
        assert!(dir.path().join("e_PUPIL_DATA.stream").exists());
    }
}
