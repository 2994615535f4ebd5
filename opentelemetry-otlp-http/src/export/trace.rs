//! Trace exporters
use std::fmt::Debug;
use std::time::Duration;

pub use opentelemetry_sdk::trace::SpanData;

/// Describes the result of an export.
///
/// Richer failure detail (status codes, response bodies, transport errors)
/// is reported through internal logging, never through this value.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportResult {
    /// The whole batch was accepted by the collector.
    Success,
    /// The batch was not delivered.
    Failure,
}

impl ExportResult {
    /// Returns `true` if the export succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, ExportResult::Success)
    }
}

/// `SpanExporter` defines the interface that protocol-specific exporters must
/// implement so that they can be plugged into a span processor.
///
/// The protocol exporter is expected to be primarily a simple telemetry data
/// encoder and transmitter. Any retry logic that is required by the exporter
/// is the responsibility of the exporter.
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch of readable spans.
    ///
    /// This call blocks until the batch is delivered or delivery has failed
    /// for good. Implementations may be called concurrently from several
    /// threads.
    fn export(&self, batch: Vec<SpanData>) -> ExportResult;

    /// Shuts down the exporter.
    ///
    /// After the first call, subsequent calls to `export` are not allowed and
    /// should return [`ExportResult::Failure`]. Calling `shutdown` again is a
    /// no-op.
    fn shutdown(&self);

    /// Exporters that buffer nothing have nothing to flush, so the default
    /// reports success immediately.
    fn force_flush(&self, _timeout: Duration) -> bool {
        true
    }
}
