//! # Aligner
//!
//! 测量流对齐与输出模块。
//!
//! 负责：
//! - 将左右眼（可能有缺口的）测量序列合并为按帧索引对齐的记录
//! - Fan-out 到 CSV / SSI stream sinks
//! - 每个 sink 独立队列与 worker，失败互不影响

pub mod error;
pub mod fanout;
pub mod handle;
pub mod merge;
pub mod metrics;
pub mod sinks;

pub use contracts::{OutputRecord, RecordSink};
pub use error::AlignerError;
pub use fanout::{DispatchReport, RecordDispatcher};
pub use handle::SinkHandle;
pub use merge::StreamAligner;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{parse_csv, stream_header, CsvSink, LogSink, StreamSink, CSV_HEADER, OUTPUT_SUFFIX};
