use super::{
    parse_header_string, resolve_certificate, resolve_compression, resolve_timeout,
    CertificatePolicy, Compression, ExporterBuildError,
};
use crate::client::HttpClient;
use crate::env::{EnvReader, ProcessEnv};
use crate::export::trace::SpanData;
use crate::retry::RetryPolicy;
use crate::{ExportConfig, OTEL_EXPORTER_OTLP_ENDPOINT, OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT};
use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Uri};
use opentelemetry::{otel_debug, otel_warn};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::transform::common::tonic::ResourceAttributesWithSchema;
use opentelemetry_proto::transform::trace::tonic::group_spans_by_resource_and_scope;
use opentelemetry_sdk::Resource;
use prost::Message;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod trace;

/// Path appended to the collector endpoint for trace exports.
pub(crate) const DEFAULT_TRACES_EXPORT_PATH: &str = "v1/traces";

const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";
const DEFAULT_USER_AGENT: &str = concat!("OTel-OTLP-Exporter-Rust/", env!("CARGO_PKG_VERSION"));

/// Configuration of the http transport
#[derive(Debug, Default)]
pub(crate) struct HttpConfig {
    /// Select the HTTP client
    client: Option<Arc<dyn HttpClient>>,

    /// Additional headers to send to the collector.
    headers: Option<HashMap<String, String>>,

    /// The compression algorithm to use when communicating with the collector.
    compression: Option<Compression>,

    /// How the collector's certificate is verified by the default client.
    certificate: Option<CertificatePolicy>,

    retry_policy: RetryPolicy,

    /// Resource describing the entity producing the spans.
    resource: Option<Resource>,
}

/// Configuration for the OTLP HTTP span exporter.
///
/// ## Examples
///
/// ```no_run
/// use opentelemetry_otlp_http::{Compression, SpanExporter, WithExportConfig};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let exporter = SpanExporter::builder()
///     .with_endpoint("http://collector:4318")
///     .with_timeout(Duration::from_secs(5))
///     .with_compression(Compression::Gzip)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct HttpExporterBuilder {
    pub(crate) exporter_config: ExportConfig,
    pub(crate) http_config: HttpConfig,
}

impl HttpExporterBuilder {
    /// Assign client implementation
    ///
    /// A caller-supplied client is used as is: the certificate policy only
    /// applies to the default client.
    pub fn with_http_client<T: HttpClient + 'static>(mut self, client: T) -> Self {
        self.http_config.client = Some(Arc::new(client));
        self
    }

    /// Set additional headers to send to the collector.
    ///
    /// Values are sent as given. A non-empty map replaces any headers
    /// configured through the environment; an empty one leaves them in effect.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        // headers will be wrapped, so we must do some logic to unwrap first.
        let mut inst_headers = self.http_config.headers.unwrap_or_default();
        inst_headers.extend(headers);
        self.http_config.headers = Some(inst_headers);
        self
    }

    /// Set the compression algorithm to use when communicating with the collector.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.http_config.compression = Some(compression);
        self
    }

    /// Set how the default client verifies the collector's certificate.
    pub fn with_certificate(mut self, certificate: CertificatePolicy) -> Self {
        self.http_config.certificate = Some(certificate);
        self
    }

    /// Set the backoff schedule used when the collector asks to retry.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.http_config.retry_policy = retry_policy;
        self
    }

    /// Set the resource describing the entity producing the spans.
    ///
    /// Every exported batch is reported under this resource. Without one the
    /// batch carries an empty resource.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.http_config.resource = Some(resource);
        self
    }

    /// Create a span exporter, resolving unset options from the process
    /// environment.
    pub fn build(self) -> Result<crate::SpanExporter, ExporterBuildError> {
        self.build_with_env(&ProcessEnv)
    }

    /// Create a span exporter, resolving unset options from `env`.
    pub fn build_with_env<E: EnvReader>(
        self,
        env: &E,
    ) -> Result<crate::SpanExporter, ExporterBuildError> {
        use crate::{
            OTEL_EXPORTER_OTLP_TRACES_CERTIFICATE, OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
            OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, OTEL_EXPORTER_OTLP_TRACES_HEADERS,
            OTEL_EXPORTER_OTLP_TRACES_TIMEOUT,
        };

        let client = self.build_client(
            env,
            SignalEnvVars {
                endpoint: OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
                endpoint_path: DEFAULT_TRACES_EXPORT_PATH,
                timeout: OTEL_EXPORTER_OTLP_TRACES_TIMEOUT,
                headers: OTEL_EXPORTER_OTLP_TRACES_HEADERS,
                compression: OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
                certificate: OTEL_EXPORTER_OTLP_TRACES_CERTIFICATE,
            },
        )?;

        Ok(crate::SpanExporter::from_http(client))
    }

    fn build_client(
        self,
        env: &dyn EnvReader,
        vars: SignalEnvVars,
    ) -> Result<OtlpHttpClient, ExporterBuildError> {
        let HttpExporterBuilder {
            exporter_config,
            http_config,
        } = self;

        let endpoint = resolve_endpoint(
            vars.endpoint,
            vars.endpoint_path,
            exporter_config.endpoint.as_deref(),
            env,
        )?;
        let timeout = resolve_timeout(vars.timeout, exporter_config.timeout.as_ref(), env)?;
        let compression = resolve_compression(http_config.compression, vars.compression, env)?;

        #[cfg(not(feature = "gzip-http"))]
        if let Some(compression) = compression {
            return Err(ExporterBuildError::FeatureRequiredForCompressionAlgorithm(
                "gzip-http",
                compression,
            ));
        }

        let mut headers = match http_config.headers.filter(|headers| !headers.is_empty()) {
            Some(headers) => headers_from_map(headers)?,
            None => match env
                .get(vars.headers)
                .map(|value| (vars.headers, value))
                .or_else(|| {
                    env.get(super::OTEL_EXPORTER_OTLP_HEADERS)
                        .map(|value| (super::OTEL_EXPORTER_OTLP_HEADERS, value))
                }) {
                // read headers from env var - signal specific env var is preferred over general
                Some((var, input)) => {
                    let mut headers = HeaderMap::new();
                    add_header_from_string(var, &input, &mut headers)?;
                    headers
                }
                None => HeaderMap::new(),
            },
        };
        add_protocol_headers(&mut headers, compression);

        let http_client = match http_config.client {
            Some(client) => client,
            None => default_client(&resolve_certificate(
                http_config.certificate.as_ref(),
                vars.certificate,
                env,
            ))?,
        };

        otel_debug!(
            name: "HttpSpanExporter.Built",
            endpoint = format!("{endpoint}"),
            timeout = format!("{timeout:?}"),
            compression = format!("{compression:?}")
        );

        Ok(OtlpHttpClient::new(
            http_client,
            endpoint,
            headers,
            compression,
            timeout,
            http_config.retry_policy,
            http_config
                .resource
                .as_ref()
                .map(ResourceAttributesWithSchema::from)
                .unwrap_or_default(),
        ))
    }
}

/// Environment variable names consulted for one signal.
struct SignalEnvVars {
    endpoint: &'static str,
    endpoint_path: &'static str,
    timeout: &'static str,
    headers: &'static str,
    compression: &'static str,
    certificate: &'static str,
}

#[cfg(feature = "reqwest-blocking-client")]
fn default_client(
    certificate: &CertificatePolicy,
) -> Result<Arc<dyn HttpClient>, ExporterBuildError> {
    Ok(Arc::new(crate::client::build_client(certificate)?))
}

#[cfg(not(feature = "reqwest-blocking-client"))]
fn default_client(
    _certificate: &CertificatePolicy,
) -> Result<Arc<dyn HttpClient>, ExporterBuildError> {
    Err(ExporterBuildError::NoHttpClient)
}

pub(crate) struct OtlpHttpClient {
    client: Mutex<Option<Arc<dyn HttpClient>>>,
    collector_endpoint: Uri,
    headers: HeaderMap,
    compression: Option<Compression>,
    timeout: Duration,
    retry_policy: RetryPolicy,
    resource: ResourceAttributesWithSchema,
}

impl fmt::Debug for OtlpHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlpHttpClient")
            .field("collector_endpoint", &self.collector_endpoint)
            .field("compression", &self.compression)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl OtlpHttpClient {
    fn new(
        client: Arc<dyn HttpClient>,
        collector_endpoint: Uri,
        headers: HeaderMap,
        compression: Option<Compression>,
        timeout: Duration,
        retry_policy: RetryPolicy,
        resource: ResourceAttributesWithSchema,
    ) -> Self {
        OtlpHttpClient {
            client: Mutex::new(Some(client)),
            collector_endpoint,
            headers,
            compression,
            timeout,
            retry_policy,
            resource,
        }
    }

    fn build_trace_export_body(&self, spans: Vec<SpanData>) -> Result<Bytes, String> {
        let req = ExportTraceServiceRequest {
            resource_spans: group_spans_by_resource_and_scope(spans, &self.resource),
        };
        self.process_body(req.encode_to_vec()).map(Bytes::from)
    }

    fn process_body(&self, body: Vec<u8>) -> Result<Vec<u8>, String> {
        match self.compression {
            #[cfg(feature = "gzip-http")]
            Some(Compression::Gzip) => {
                use flate2::write::GzEncoder;
                use std::io::Write;

                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&body).map_err(|e| e.to_string())?;
                encoder.finish().map_err(|e| e.to_string())
            }
            #[cfg(feature = "gzip-http")]
            Some(Compression::Deflate) => {
                use flate2::write::ZlibEncoder;
                use std::io::Write;

                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&body).map_err(|e| e.to_string())?;
                encoder.finish().map_err(|e| e.to_string())
            }
            #[cfg(not(feature = "gzip-http"))]
            Some(compression) => Err(format!(
                "compression '{compression}' requires the gzip-http feature"
            )),
            None => Ok(body),
        }
    }
}

fn build_endpoint_uri(endpoint: &str, path: &str) -> Result<Uri, ExporterBuildError> {
    let endpoint = endpoint.trim();
    let full = if endpoint.ends_with(path) {
        endpoint.to_string()
    } else if endpoint.ends_with('/') {
        format!("{endpoint}{path}")
    } else {
        format!("{endpoint}/{path}")
    };

    let uri: Uri = full
        .parse()
        .map_err(|e: http::uri::InvalidUri| ExporterBuildError::InvalidUri(full.clone(), e.to_string()))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(ExporterBuildError::InvalidUri(
            full,
            "endpoint must have a scheme and a host".to_string(),
        ));
    }
    Ok(uri)
}

// see https://github.com/open-telemetry/opentelemetry-specification/blob/main/specification/protocol/exporter.md#endpoint-urls-for-otlphttp
fn resolve_endpoint(
    signal_endpoint_var: &str,
    signal_endpoint_path: &str,
    provided_endpoint: Option<&str>,
    env: &dyn EnvReader,
) -> Result<Uri, ExporterBuildError> {
    let non_empty = |value: &str| !value.trim().is_empty();

    // programmatic configuration overrides any value set via environment variables.
    // An empty endpoint counts as unset.
    let endpoint = provided_endpoint
        .filter(|e| non_empty(e))
        .map(str::to_string)
        .or_else(|| env.get(signal_endpoint_var).filter(|e| non_empty(e)))
        .or_else(|| env.get(OTEL_EXPORTER_OTLP_ENDPOINT).filter(|e| non_empty(e)))
        .unwrap_or_else(|| OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT.to_string());

    build_endpoint_uri(&endpoint, signal_endpoint_path)
}

fn header_from_pair(
    source: &str,
    key: &str,
    value: &str,
) -> Result<(HeaderName, HeaderValue), ExporterBuildError> {
    let invalid = |reason: String| ExporterBuildError::InvalidConfig {
        name: source.to_string(),
        reason,
    };
    let name =
        HeaderName::from_str(key).map_err(|e| invalid(format!("header name '{key}': {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| invalid(format!("value of header '{key}': {e}")))?;
    Ok((name, value))
}

fn headers_from_map(headers: HashMap<String, String>) -> Result<HeaderMap, ExporterBuildError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let (name, value) = header_from_pair("headers", &key, &value)?;
        map.insert(name, value);
    }
    Ok(map)
}

fn add_header_from_string(
    source: &str,
    input: &str,
    headers: &mut HeaderMap,
) -> Result<(), ExporterBuildError> {
    for pair in parse_header_string(input) {
        let (key, value) = pair.map_err(|segment| ExporterBuildError::InvalidConfig {
            name: source.to_string(),
            reason: format!("expected key=value, got '{segment}'"),
        })?;
        let (name, value) = header_from_pair(source, key, &value)?;
        headers.insert(name, value);
    }
    Ok(())
}

/// Adds the headers every OTLP/HTTP request carries on top of the configured
/// ones.
fn add_protocol_headers(headers: &mut HeaderMap, compression: Option<Compression>) {
    if headers.contains_key(CONTENT_TYPE) {
        otel_warn!(
            name: "HttpSpanExporter.Headers.ContentTypeOverridden",
            message = format!("Content-Type is always {PROTOBUF_CONTENT_TYPE}, ignoring the configured value")
        );
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE));

    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    }

    if let Some(compression) = compression {
        if headers.contains_key(CONTENT_ENCODING) {
            otel_warn!(
                name: "HttpSpanExporter.Headers.ContentEncodingOverridden",
                message = format!("Content-Encoding is set from the compression '{compression}', ignoring the configured value")
            );
        }
        let encoding = match compression {
            Compression::Gzip => "gzip",
            Compression::Deflate => "deflate",
        };
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }
}
