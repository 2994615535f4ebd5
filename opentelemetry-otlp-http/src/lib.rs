//! # OpenTelemetry OTLP/HTTP Span Exporter
//!
//! Sends recorded spans to an OpenTelemetry collector using the OTLP protocol
//! over HTTP with protobuf payloads. Each export is delivered synchronously:
//! retryable collector responses (`408`, `429` and most `5xx`) are retried with
//! an exponential backoff that doubles from one second and stops once it
//! reaches [`MAX_RETRY_TIMEOUT`] seconds.
//!
//! ## Quickstart
//!
//! First make sure you have a running version of the opentelemetry collector
//! you want to send data to:
//!
//! ```shell
//! $ docker run -p 4318:4318 otel/opentelemetry-collector:latest
//! ```
//!
//! Then build an exporter and hand it batches of finished spans
//! ([`opentelemetry_sdk::trace::SpanData`]):
//!
//! ```no_run
//! use opentelemetry_otlp_http::export::trace::{SpanData, SpanExporter as _};
//! use opentelemetry_otlp_http::{SpanExporter, WithExportConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exporter = SpanExporter::builder()
//!         .with_endpoint("http://localhost:4318")
//!         .build()?;
//!
//!     let batch: Vec<SpanData> = Vec::new();
//!     if !exporter.export(batch).is_success() {
//!         eprintln!("spans were not delivered");
//!     }
//!
//!     exporter.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Every option left unset on the builder is read from the environment,
//! the trace-specific variable first, then the generic one:
//!
//! | Option      | Variables                                                                    | Default                           |
//! |-------------|------------------------------------------------------------------------------|-----------------------------------|
//! | endpoint    | `OTEL_EXPORTER_OTLP_TRACES_ENDPOINT`, `OTEL_EXPORTER_OTLP_ENDPOINT`          | `http://localhost:4318/v1/traces` |
//! | headers     | `OTEL_EXPORTER_OTLP_TRACES_HEADERS`, `OTEL_EXPORTER_OTLP_HEADERS`            | none                              |
//! | timeout     | `OTEL_EXPORTER_OTLP_TRACES_TIMEOUT`, `OTEL_EXPORTER_OTLP_TIMEOUT`            | 10 seconds                        |
//! | compression | `OTEL_EXPORTER_OTLP_TRACES_COMPRESSION`, `OTEL_EXPORTER_OTLP_COMPRESSION`    | none                              |
//! | certificate | `OTEL_EXPORTER_OTLP_TRACES_CERTIFICATE`, `OTEL_EXPORTER_OTLP_CERTIFICATE`    | system roots                      |
//!
//! `v1/traces` is appended to any endpoint that does not already end with it.
//!
//! ## Crate Feature Flags
//!
//! * `reqwest-blocking-client`: Use reqwest blocking http client (enabled by default).
//! * `gzip-http`: Enable gzip and deflate request compression (enabled by default).
//! * `internal-logs`: Emit the exporter's diagnostics through `tracing` (enabled by default).
//!
//! Without `reqwest-blocking-client`, a client must be supplied with
//! [`HttpExporterBuilder::with_http_client`].
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unused_extern_crates
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
mod env;
pub mod export;
mod exporter;
mod retry;
mod retry_classification;
mod span;

pub use crate::client::{Bytes, HttpClient, HttpError, Request, Response};
pub use crate::env::{EnvReader, ProcessEnv};
pub use crate::exporter::{
    http::HttpExporterBuilder, CertificatePolicy, Compression, ExportConfig, ExporterBuildError,
    HasExportConfig, WithExportConfig, OTEL_EXPORTER_OTLP_CERTIFICATE,
    OTEL_EXPORTER_OTLP_COMPRESSION, OTEL_EXPORTER_OTLP_ENDPOINT,
    OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT, OTEL_EXPORTER_OTLP_HEADERS, OTEL_EXPORTER_OTLP_TIMEOUT,
    OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT,
};
pub use crate::retry::{RetryPolicy, MAX_RETRY_TIMEOUT};
pub use crate::span::{
    SpanExporter, OTEL_EXPORTER_OTLP_TRACES_CERTIFICATE, OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
    OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, OTEL_EXPORTER_OTLP_TRACES_HEADERS,
    OTEL_EXPORTER_OTLP_TRACES_TIMEOUT,
};
