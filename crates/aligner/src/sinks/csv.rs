//! CsvSink - one text row per aligned record

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{ContractError, OutputRecord, PupilMeasurement, RecordSink};
use tracing::{debug, instrument};

use super::OUTPUT_SUFFIX;

/// Header row of the CSV output
pub const CSV_HEADER: &str =
    "ts, left_diam_abs, left_diam_rel, left_conf, right_diam_abs, right_diam_rel, right_conf";

/// Sink that writes `{base}_PUPIL_DATA.csv`
pub struct CsvSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    rows: u64,
}

impl CsvSink {
    /// Create the CSV file and write its header
    pub fn create(dir: &Path, base_name: &str) -> Result<Self, ContractError> {
        let path = dir.join(format!("{base_name}{OUTPUT_SUFFIX}.csv"));
        let file = File::create(&path)
            .map_err(|e| ContractError::sink_creation("csv", format!("{}: {e}", path.display())))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{CSV_HEADER}")
            .map_err(|e| ContractError::sink_creation("csv", e.to_string()))?;

        debug!(path = %path.display(), "CSV sink created");
        Ok(Self {
            name: "csv".to_string(),
            path,
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ContractError> {
        self.writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_write("csv", "sink already closed"))
    }
}

fn format_row(record: &OutputRecord) -> String {
    let side = |m: &PupilMeasurement| {
        format!("{},{},{}", m.diameter, m.diameter_relative, m.confidence)
    };
    format!(
        "{},{},{}",
        record.frame_index,
        side(&record.left),
        side(&record.right)
    )
}

impl RecordSink for CsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &OutputRecord) -> Result<(), ContractError> {
        let row = format_row(record);
        writeln!(self.writer()?, "{row}").map_err(|e| ContractError::sink_write("csv", e.to_string()))?;
        self.rows += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer()?
            .flush()
            .map_err(|e| ContractError::sink_write("csv", e.to_string()))
    }

    #[instrument(name = "csv_sink_close", skip(self), fields(path = %self.path.display()))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write("csv", e.to_string()))?;
        }
        debug!(rows = self.rows, "CSV sink closed");
        Ok(())
    }
}

/// Parse CSV output back into records
///
/// # Errors
/// `Other` naming the offending line for a bad header or malformed row.
pub fn parse_csv(text: &str) -> Result<Vec<OutputRecord>, ContractError> {
    let mut lines = text.lines();
    match lines.next() {
        Some(header) if header.trim() == CSV_HEADER => {}
        other => {
            return Err(ContractError::Other(format!(
                "unexpected csv header: {other:?}"
            )))
        }
    }

    lines
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let bad = |what: &str| ContractError::Other(format!("csv line {}: {what}", i + 2));
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 7 {
                return Err(bad("expected 7 fields"));
            }
            let frame_index: u64 = fields[0].parse().map_err(|_| bad("bad frame index"))?;
            let mut values = [0f32; 6];
            for (value, field) in values.iter_mut().zip(&fields[1..]) {
                *value = field.parse().map_err(|_| bad("bad float"))?;
            }
            let side = |v: &[f32]| PupilMeasurement {
                frame_index,
                diameter: v[0],
                diameter_relative: v[1],
                confidence: v[2],
            };
            Ok(OutputRecord {
                frame_index,
                left: side(&values[0..3]),
                right: side(&values[3..6]),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PupilObservation;

    fn record(index: u64) -> OutputRecord {
        let obs = PupilObservation {
            diameter: 12.345_678,
            confidence: 0.912_345,
            timestamp: index,
        };
        OutputRecord::new(
            index,
            Some(PupilMeasurement::from_observation(index, &obs, 37.3)),
            None,
        )
    }

    #[tokio::test]
    async fn test_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::create(dir.path(), "demo").unwrap();
        sink.write(&record(0)).await.unwrap();
        sink.close().await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("demo_PUPIL_DATA.csv")).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        let row = lines.next().unwrap();
        assert!(row.starts_with("0,12.345678,"));
        assert!(row.ends_with(",-1,-1,-1"));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::create(dir.path(), "rt").unwrap();
        let written: Vec<OutputRecord> = (0..4).map(record).collect();
        for r in &written {
            sink.write(r).await.unwrap();
        }
        sink.close().await.unwrap();

        let parsed = parse_csv(&std::fs::read_to_string(sink.path()).unwrap()).unwrap();
        assert_eq!(parsed, written);
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::create(dir.path(), "closed").unwrap();
        sink.close().await.unwrap();
        assert!(sink.write(&record(0)).await.is_err());
    }

    #[test]
    fn test_create_in_missing_dir_fails() {
        let err = CsvSink::create(Path::new("/nonexistent/dir"), "x").err().unwrap();
        assert!(matches!(err, ContractError::SinkCreation { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        assert!(parse_csv("a,b\n0,1,2,3,4,5,6").is_err());
    }
}
