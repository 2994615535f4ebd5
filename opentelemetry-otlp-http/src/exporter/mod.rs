//! OTLP exporter builder and configurations.
//!
//! Every option is resolved with the same precedence: programmatic
//! configuration, then the trace-specific environment variable, then the
//! generic `OTEL_EXPORTER_OTLP_*` variable, then a default.

use crate::env::EnvReader;
use crate::exporter::http::HttpExporterBuilder;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Target to which the exporter is going to send signals, defaults to http://localhost:4318.
/// Learn about the relationship between this constant and the trace endpoint at
/// <https://github.com/open-telemetry/opentelemetry-specification/blob/main/specification/protocol/exporter.md#endpoint-urls-for-otlphttp>
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Default target to which the exporter is going to send signals.
pub const OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT: &str = "http://localhost:4318/";
/// Key-value pairs to be used as headers associated with HTTP requests.
/// Example: `k1=v1,k2=v2`
pub const OTEL_EXPORTER_OTLP_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";
/// Compression algorithm to use, defaults to none.
pub const OTEL_EXPORTER_OTLP_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_COMPRESSION";
/// Path to a PEM encoded certificate bundle used to verify the collector.
pub const OTEL_EXPORTER_OTLP_CERTIFICATE: &str = "OTEL_EXPORTER_OTLP_CERTIFICATE";
/// Max waiting time, in seconds, for the backend to process each batch.
pub const OTEL_EXPORTER_OTLP_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TIMEOUT";
/// Default max waiting time for the backend to process each batch.
pub const OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT: Duration = Duration::from_secs(10);

pub(crate) mod http;

/// Configuration for the OTLP exporter.
#[derive(Debug, Default)]
pub struct ExportConfig {
    /// The address of the OTLP collector.
    /// Default address will be used if not set.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    pub endpoint: Option<String>,

    /// The timeout of each request to the collector.
    /// The default value is 10 seconds.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    pub timeout: Option<Duration>,
}

#[derive(Error, Debug)]
/// Errors that can occur while building an exporter.
#[non_exhaustive]
pub enum ExporterBuildError {
    /// Feature required to use the specified compression algorithm.
    #[cfg(not(feature = "gzip-http"))]
    #[error("feature '{0}' is required to use the compression algorithm '{1}'")]
    FeatureRequiredForCompressionAlgorithm(&'static str, Compression),

    /// No Http client specified.
    #[error("no http client specified")]
    NoHttpClient,

    /// Unsupported compression algorithm.
    #[error("unsupported compression algorithm '{0}'")]
    UnsupportedCompressionAlgorithm(String),

    /// Invalid URI.
    #[error("invalid URI {0}. Reason {1}")]
    InvalidUri(String, String),

    /// Invalid configuration.
    #[error("{name}: {reason}")]
    InvalidConfig {
        /// The configuration name.
        name: String,
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// Failed due to an internal error.
    /// The error message is intended for logging purposes only and should not
    /// be used to make programmatic decisions.
    #[error("Reason: {0}")]
    InternalFailure(String),
}

/// The compression algorithm to use when sending data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    /// Compresses data using gzip.
    Gzip,
    /// Compresses data using deflate (zlib framing).
    Deflate,
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Gzip => write!(f, "gzip"),
            Compression::Deflate => write!(f, "deflate"),
        }
    }
}

impl FromStr for Compression {
    type Err = ExporterBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gzip" => Ok(Compression::Gzip),
            "deflate" => Ok(Compression::Deflate),
            _ => Err(ExporterBuildError::UnsupportedCompressionAlgorithm(
                s.to_string(),
            )),
        }
    }
}

/// How the collector's TLS certificate is verified.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum CertificatePolicy {
    /// Trust the certificates in the given PEM file.
    VerifyWithFile(PathBuf),
    /// Trust the platform's root certificates.
    #[default]
    VerifySystem,
    /// Accept any certificate. Only meant for local testing.
    NoVerify,
}

/// Parses a compression value as found in the environment. `none` maps to no
/// compression.
fn parse_compression(value: &str) -> Result<Option<Compression>, ExporterBuildError> {
    match value.trim().to_lowercase().as_str() {
        "none" => Ok(None),
        other => other.parse::<Compression>().map(Some),
    }
}

/// Resolve compression with priority:
/// 1. Provided config value
/// 2. Signal-specific environment variable
/// 3. Generic OTEL_EXPORTER_OTLP_COMPRESSION
/// 4. None (default)
fn resolve_compression(
    config_compression: Option<Compression>,
    signal_env_var: &str,
    env: &dyn EnvReader,
) -> Result<Option<Compression>, ExporterBuildError> {
    if let Some(compression) = config_compression {
        Ok(Some(compression))
    } else if let Some(compression) = env.get(signal_env_var) {
        parse_compression(&compression)
    } else if let Some(compression) = env.get(OTEL_EXPORTER_OTLP_COMPRESSION) {
        parse_compression(&compression)
    } else {
        Ok(None)
    }
}

fn resolve_certificate(
    config_certificate: Option<&CertificatePolicy>,
    signal_env_var: &str,
    env: &dyn EnvReader,
) -> CertificatePolicy {
    if let Some(policy) = config_certificate {
        policy.clone()
    } else if let Some(path) = env
        .get(signal_env_var)
        .or_else(|| env.get(OTEL_EXPORTER_OTLP_CERTIFICATE))
    {
        CertificatePolicy::VerifyWithFile(PathBuf::from(path))
    } else {
        CertificatePolicy::VerifySystem
    }
}

fn resolve_timeout(
    signal_timeout_var: &str,
    provided_timeout: Option<&Duration>,
    env: &dyn EnvReader,
) -> Result<Duration, ExporterBuildError> {
    // programmatic configuration overrides any value set via environment variables
    if let Some(timeout) = provided_timeout {
        return Ok(*timeout);
    }

    for var in [signal_timeout_var, OTEL_EXPORTER_OTLP_TIMEOUT] {
        if let Some(value) = env.get(var) {
            return value
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ExporterBuildError::InvalidConfig {
                    name: var.to_string(),
                    reason: format!("expected a whole number of seconds, got '{value}': {e}"),
                });
        }
    }

    Ok(OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT)
}

/// Provide access to the [ExportConfig] field within the exporter builders.
pub trait HasExportConfig {
    /// Return a mutable reference to the [ExportConfig] within the exporter builders.
    fn export_config(&mut self) -> &mut ExportConfig;
}

/// Provide [ExportConfig] access to the [HttpExporterBuilder].
impl HasExportConfig for HttpExporterBuilder {
    fn export_config(&mut self) -> &mut ExportConfig {
        &mut self.exporter_config
    }
}

/// Expose methods to override [ExportConfig].
///
/// This trait will be implemented for every struct that implemented [`HasExportConfig`] trait.
///
/// ## Examples
/// ```
/// use opentelemetry_otlp_http::{SpanExporter, WithExportConfig};
/// let exporter_builder = SpanExporter::builder().with_endpoint("http://localhost:7201");
/// ```
pub trait WithExportConfig {
    /// Set the address of the OTLP collector. If not set or set to empty string, the default address is used.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    fn with_endpoint<T: Into<String>>(self, endpoint: T) -> Self;
    /// Set the timeout of each request to the collector.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    fn with_timeout(self, timeout: Duration) -> Self;
    /// Set export config. This will override all previous configurations.
    ///
    /// Note: Programmatically setting this will override any value set via environment variables.
    fn with_export_config(self, export_config: ExportConfig) -> Self;
}

impl<B: HasExportConfig> WithExportConfig for B {
    fn with_endpoint<T: Into<String>>(mut self, endpoint: T) -> Self {
        self.export_config().endpoint = Some(endpoint.into());
        self
    }

    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.export_config().timeout = Some(timeout);
        self
    }

    fn with_export_config(mut self, exporter_config: ExportConfig) -> Self {
        self.export_config().endpoint = exporter_config.endpoint;
        self.export_config().timeout = exporter_config.timeout;
        self
    }
}

/// Splits a `k1=v1,k2=v2` header list. Empty segments are skipped; every
/// other segment must be a `key=value` pair with a non-empty key.
fn parse_header_string(value: &str) -> impl Iterator<Item = Result<(&str, String), &str>> {
    value
        .split_terminator(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| parse_header_key_value_string(segment).ok_or(segment))
}

fn url_decode(value: &str) -> Option<String> {
    let mut result = String::with_capacity(value.len());
    let mut chars_to_decode = Vec::<u8>::new();
    let mut all_chars = value.chars();

    loop {
        let ch = all_chars.next();

        if ch == Some('%') {
            chars_to_decode.push(
                u8::from_str_radix(&format!("{}{}", all_chars.next()?, all_chars.next()?), 16)
                    .ok()?,
            );
            continue;
        }

        if !chars_to_decode.is_empty() {
            result.push_str(std::str::from_utf8(&chars_to_decode).ok()?);
            chars_to_decode.clear();
        }

        if let Some(c) = ch {
            result.push(c);
        } else {
            return Some(result);
        }
    }
}

fn parse_header_key_value_string(key_value_string: &str) -> Option<(&str, String)> {
    key_value_string
        .split_once('=')
        .map(|(key, value)| {
            let value = value.trim();
            (key.trim(), url_decode(value).unwrap_or(value.to_string()))
        })
        .filter(|(key, _)| !key.is_empty())
}
