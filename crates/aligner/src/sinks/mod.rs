//! Sink implementations

mod csv;
mod log;
mod stream;

pub use csv::{parse_csv, CsvSink, CSV_HEADER};
pub use log::LogSink;
pub use stream::{stream_header, StreamSink};

/// Common file stem suffix of every output file
pub const OUTPUT_SUFFIX: &str = "_PUPIL_DATA";
