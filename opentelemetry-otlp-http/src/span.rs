//! # OTLP - Span Exporter
//!
//! Defines a [SpanExporter] to send trace data via the OpenTelemetry Protocol (OTLP)

use std::time::Duration;

use crate::export::trace::{ExportResult, SpanData, SpanExporter as _};
use crate::exporter::http::{HttpExporterBuilder, OtlpHttpClient};

/// Target to which the exporter is going to send spans, defaults to http://localhost:4318/v1/traces.
/// Learn about the relationship between this constant and the generic endpoint at
/// <https://github.com/open-telemetry/opentelemetry-specification/blob/main/specification/protocol/exporter.md#endpoint-urls-for-otlphttp>
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
/// Max waiting time, in seconds, for the backend to process each spans batch, defaults to 10s.
pub const OTEL_EXPORTER_OTLP_TRACES_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TRACES_TIMEOUT";
/// Compression algorithm to use, defaults to none.
pub const OTEL_EXPORTER_OTLP_TRACES_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_TRACES_COMPRESSION";
/// Key-value pairs to be used as headers associated with HTTP requests
/// for sending spans.
/// Example: `k1=v1,k2=v2`
/// Note: this is only supported for HTTP.
pub const OTEL_EXPORTER_OTLP_TRACES_HEADERS: &str = "OTEL_EXPORTER_OTLP_TRACES_HEADERS";
/// Path to a PEM encoded certificate bundle used to verify the collector
/// when sending spans.
pub const OTEL_EXPORTER_OTLP_TRACES_CERTIFICATE: &str = "OTEL_EXPORTER_OTLP_TRACES_CERTIFICATE";

/// OTLP exporter that sends tracing information over HTTP.
///
/// `export` blocks the calling thread until the batch is delivered or given
/// up on, including the backoff sleeps between attempts.
#[derive(Debug)]
pub struct SpanExporter {
    client: OtlpHttpClient,
}

impl SpanExporter {
    /// Obtain a builder to configure a [SpanExporter].
    pub fn builder() -> HttpExporterBuilder {
        HttpExporterBuilder::default()
    }

    pub(crate) fn from_http(client: OtlpHttpClient) -> Self {
        SpanExporter { client }
    }
}

impl crate::export::trace::SpanExporter for SpanExporter {
    fn export(&self, batch: Vec<SpanData>) -> ExportResult {
        self.client.export(batch)
    }

    fn shutdown(&self) {
        self.client.shutdown()
    }

    fn force_flush(&self, timeout: Duration) -> bool {
        self.client.force_flush(timeout)
    }
}
