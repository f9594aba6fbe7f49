//! RecordSink trait - aligner output interface
//!
//! Defines the abstract interface for record sinks.

use crate::{ContractError, OutputRecord};

/// Record output trait
///
/// All sink implementations must implement this trait. Records arrive in
/// increasing frame-index order.
#[trait_variant::make(RecordSink: Send)]
pub trait LocalRecordSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one aligned record
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, record: &OutputRecord) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink, finalizing any companion files
    async fn close(&mut self) -> Result<(), ContractError>;
}
