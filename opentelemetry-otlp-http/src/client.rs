//! The transport seam used by the exporter.
//!
//! Any type implementing [`HttpClient`] can carry the export requests. With
//! the `reqwest-blocking-client` feature (enabled by default) the crate ships
//! an implementation for [`reqwest::blocking::Client`].

use std::fmt::Debug;
use std::time::Duration;

#[doc(no_inline)]
pub use bytes::Bytes;
#[doc(no_inline)]
pub use http::{Request, Response};

/// Error returned by an [`HttpClient`] when a request could not be completed.
pub type HttpError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A minimal interface necessary for sending requests over HTTP.
///
/// Users sometime choose HTTP clients with their own connection or TLS
/// requirements. This trait allows users to bring their choice of HTTP
/// client.
pub trait HttpClient: Debug + Send + Sync {
    /// Send the specified HTTP request with `Bytes` payload, waiting at most
    /// `timeout` for the exchange to complete.
    ///
    /// Returns the HTTP response including the status code and body, whatever
    /// the status code is. Non-2xx responses must not be turned into errors.
    ///
    /// Returns an error if it can't connect to the server or the request could not be completed,
    /// e.g. because of a timeout, infinite redirects, or a loss of connection.
    fn send_bytes(
        &self,
        request: Request<Bytes>,
        timeout: Duration,
    ) -> Result<Response<Bytes>, HttpError>;
}

#[cfg(feature = "reqwest-blocking-client")]
mod reqwest {
    use super::{Bytes, HttpClient, HttpError, Request, Response};
    use crate::exporter::{CertificatePolicy, ExporterBuildError};
    use opentelemetry::otel_debug;
    use std::time::Duration;

    impl HttpClient for reqwest::blocking::Client {
        fn send_bytes(
            &self,
            request: Request<Bytes>,
            timeout: Duration,
        ) -> Result<Response<Bytes>, HttpError> {
            otel_debug!(name: "ReqwestBlockingClient.Send");
            let mut request: reqwest::blocking::Request = request.try_into()?;
            *request.timeout_mut() = Some(timeout);
            let mut response = self.execute(request)?;
            let headers = std::mem::take(response.headers_mut());
            let mut http_response = Response::builder()
                .status(response.status())
                .body(response.bytes()?)?;
            *http_response.headers_mut() = headers;

            Ok(http_response)
        }
    }

    /// Builds the default blocking client, applying the certificate policy.
    pub(crate) fn build_client(
        certificate: &CertificatePolicy,
    ) -> Result<reqwest::blocking::Client, ExporterBuildError> {
        let builder = reqwest::blocking::Client::builder();
        let builder = match certificate {
            CertificatePolicy::VerifySystem => builder,
            CertificatePolicy::NoVerify => builder.danger_accept_invalid_certs(true),
            CertificatePolicy::VerifyWithFile(path) => {
                let pem = std::fs::read(path).map_err(|e| ExporterBuildError::InvalidConfig {
                    name: "certificate".to_string(),
                    reason: format!("cannot read {}: {e}", path.display()),
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    ExporterBuildError::InvalidConfig {
                        name: "certificate".to_string(),
                        reason: format!("{} is not a PEM certificate: {e}", path.display()),
                    }
                })?;
                builder.add_root_certificate(cert)
            }
        };

        builder
            .build()
            .map_err(|e| ExporterBuildError::InternalFailure(e.to_string()))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::path::PathBuf;

        #[test]
        fn missing_certificate_file_is_a_config_error() {
            let policy = CertificatePolicy::VerifyWithFile(PathBuf::from(
                "/definitely/not/here/collector.pem",
            ));
            let err = build_client(&policy).unwrap_err();
            assert!(matches!(
                err,
                ExporterBuildError::InvalidConfig { ref name, .. } if name == "certificate"
            ));
        }
    }
}

#[cfg(feature = "reqwest-blocking-client")]
pub(crate) use self::reqwest::build_client;
