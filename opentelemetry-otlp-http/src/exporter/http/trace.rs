use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use opentelemetry::{otel_debug, otel_error, otel_warn};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceResponse;
use prost::Message;

use super::OtlpHttpClient;
use crate::client::HttpClient;
use crate::export::trace::{ExportResult, SpanData, SpanExporter};
use crate::retry_classification::{http::classify_http_status, ResponseClass};

impl SpanExporter for OtlpHttpClient {
    fn export(&self, batch: Vec<SpanData>) -> ExportResult {
        let client = match self.client.lock() {
            Ok(guard) => match &*guard {
                Some(client) => Arc::clone(client),
                None => {
                    otel_warn!(
                        name: "HttpSpanExporter.Export.AlreadyShutdown",
                        message = "exporter is already shut down, dropping the batch".to_string()
                    );
                    return ExportResult::Failure;
                }
            },
            Err(err) => {
                otel_error!(
                    name: "HttpSpanExporter.Export.LockPoisoned",
                    error = format!("{err}")
                );
                return ExportResult::Failure;
            }
        };

        otel_debug!(
            name: "HttpSpanExporter.ExportStarted",
            span_count = format!("{}", batch.len())
        );

        let body = match self.build_trace_export_body(batch) {
            Ok(body) => body,
            Err(err) => {
                otel_error!(
                    name: "HttpSpanExporter.Export.EncodingFailed",
                    error = err.clone()
                );
                return ExportResult::Failure;
            }
        };

        self.deliver(client.as_ref(), body)
    }

    fn shutdown(&self) {
        match self.client.lock() {
            Ok(mut guard) => {
                if guard.take().is_none() {
                    otel_warn!(
                        name: "HttpSpanExporter.Shutdown.AlreadyShutdown",
                        message = "exporter was already shut down".to_string()
                    );
                }
            }
            Err(err) => {
                otel_error!(
                    name: "HttpSpanExporter.Shutdown.LockPoisoned",
                    error = format!("{err}")
                );
            }
        }
    }
}

impl OtlpHttpClient {
    /// Sends `body` until the collector accepts it, rejects it for good, or
    /// the backoff schedule reaches its ceiling.
    fn deliver(&self, client: &dyn HttpClient, body: Bytes) -> ExportResult {
        for delay in self.retry_policy.delays() {
            let request = match self.build_request(body.clone()) {
                Ok(request) => request,
                Err(err) => {
                    otel_error!(
                        name: "HttpSpanExporter.Export.InvalidRequest",
                        error = format!("{err}")
                    );
                    return ExportResult::Failure;
                }
            };

            let response = match client.send_bytes(request, self.timeout) {
                Ok(response) => response,
                Err(err) => {
                    otel_error!(
                        name: "HttpSpanExporter.Export.TransportFailed",
                        url = format!("{}", self.collector_endpoint),
                        error = format!("{err}")
                    );
                    return ExportResult::Failure;
                }
            };

            let status = response.status();
            match classify_http_status(status.as_u16()) {
                ResponseClass::Success => {
                    report_partial_success(response.body());
                    otel_debug!(
                        name: "HttpSpanExporter.ExportSucceeded",
                        status = format!("{status}")
                    );
                    return ExportResult::Success;
                }
                ResponseClass::Retryable => {
                    otel_warn!(
                        name: "HttpSpanExporter.Export.Retrying",
                        reason = reason(status),
                        status = format!("{}", status.as_u16()),
                        delay = format!("{delay:?}")
                    );
                    std::thread::sleep(delay);
                }
                ResponseClass::NonRetryable => {
                    otel_error!(
                        name: "HttpSpanExporter.Export.Failed",
                        url = format!("{}", self.collector_endpoint),
                        status = format!("{}", status.as_u16()),
                        response = String::from_utf8_lossy(response.body()).into_owned()
                    );
                    return ExportResult::Failure;
                }
            }
        }

        otel_error!(
            name: "HttpSpanExporter.Export.RetriesExhausted",
            url = format!("{}", self.collector_endpoint),
            max_delay = format!("{:?}", self.retry_policy.max_delay())
        );
        ExportResult::Failure
    }

    fn build_request(&self, body: Bytes) -> Result<Request<Bytes>, http::Error> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(self.collector_endpoint.clone())
            .body(body)?;
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown Status")
        .to_string()
}

/// Reports spans the collector accepted the request for but dropped.
fn report_partial_success(body: &Bytes) {
    if body.is_empty() {
        return;
    }
    match ExportTraceServiceResponse::decode(body.as_ref()) {
        Ok(ExportTraceServiceResponse {
            partial_success: Some(partial),
        }) if partial.rejected_spans > 0 || !partial.error_message.is_empty() => {
            otel_warn!(
                name: "HttpSpanExporter.Export.PartialSuccess",
                rejected_spans = format!("{}", partial.rejected_spans),
                message = partial.error_message.clone()
            );
        }
        Ok(_) => {}
        Err(err) => {
            otel_debug!(
                name: "HttpSpanExporter.Export.UndecodableResponse",
                error = format!("{err}")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{build_client_with, empty_env, sample_span, ScriptedClient};
    use super::super::HttpExporterBuilder;
    use crate::client::{HttpClient, HttpError, Request, Response};
    use crate::export::trace::{ExportResult, SpanExporter};
    use crate::retry::RetryPolicy;
    use crate::WithExportConfig;
    use bytes::Bytes;
    use http::header::{CONTENT_TYPE, USER_AGENT};
    use opentelemetry::InstrumentationScope;
    use opentelemetry_proto::tonic::collector::trace::v1::{
        ExportTracePartialSuccess, ExportTraceServiceRequest, ExportTraceServiceResponse,
    };
    use prost::Message;
    use std::collections::HashMap;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Holds each request inside `send_bytes` until the test releases it.
    #[derive(Debug)]
    struct GatedClient {
        inner: ScriptedClient,
        entered: Arc<Barrier>,
        release: Arc<Barrier>,
    }

    impl HttpClient for GatedClient {
        fn send_bytes(
            &self,
            request: Request<Bytes>,
            timeout: Duration,
        ) -> Result<Response<Bytes>, HttpError> {
            self.entered.wait();
            self.release.wait();
            self.inner.send_bytes(request, timeout)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(64)).unwrap()
    }

    fn exporter_with(client: &ScriptedClient) -> super::OtlpHttpClient {
        let builder = HttpExporterBuilder::default()
            .with_http_client(client.clone())
            .with_retry_policy(fast_policy())
            .with_endpoint("http://collector:4318");
        build_client_with(builder, &empty_env()).unwrap()
    }

    #[test]
    fn test_accepted_on_first_attempt() {
        for status in [200, 202] {
            let client = ScriptedClient::always(status);
            let exporter = exporter_with(&client);

            let span = sample_span("GET /", InstrumentationScope::builder("web").build());
            let result = exporter.export(vec![span]);

            assert_eq!(result, ExportResult::Success, "status {status}");
            assert_eq!(client.call_count(), 1);
        }
    }

    #[test]
    fn test_empty_batch_is_still_sent() {
        let client = ScriptedClient::always(200);
        let exporter = exporter_with(&client);

        assert_eq!(exporter.export(vec![]), ExportResult::Success);

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let payload = ExportTraceServiceRequest::decode(requests[0].body.as_ref()).unwrap();
        assert_eq!(payload.resource_spans.len(), 1);
        assert!(payload.resource_spans[0].scope_spans.is_empty());
    }

    #[test]
    fn test_retryable_statuses_stop_at_saturation() {
        for status in [408, 429, 500, 502, 503, 504, 599] {
            let client = ScriptedClient::always(status);
            let exporter = exporter_with(&client);

            let started = Instant::now();
            let result = exporter.export(vec![]);

            assert_eq!(result, ExportResult::Failure, "status {status}");
            // 1, 2, 4, 8, 16 and 32 ms; 64 ms is the ceiling
            assert_eq!(client.call_count(), 6, "status {status}");
            assert!(started.elapsed() >= Duration::from_millis(63));
        }
    }

    #[test]
    fn test_retry_until_accepted() {
        let client = ScriptedClient::with_statuses(&[503, 429]);
        let exporter = exporter_with(&client);

        assert_eq!(exporter.export(vec![]), ExportResult::Success);
        assert_eq!(client.call_count(), 3);

        let bodies: Vec<Bytes> = client.requests().into_iter().map(|r| r.body).collect();
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_non_retryable_statuses_fail_after_one_call() {
        for status in [400, 401, 403, 404, 413, 501, 201, 204, 302] {
            let client = ScriptedClient::always(status);
            let exporter = exporter_with(&client);

            assert_eq!(exporter.export(vec![]), ExportResult::Failure, "status {status}");
            assert_eq!(client.call_count(), 1, "status {status}");
        }
    }

    #[test]
    fn test_transport_error_is_not_retried() {
        let client = ScriptedClient::default();
        client.push(Err("connection refused".to_string()));
        let exporter = exporter_with(&client);

        assert_eq!(exporter.export(vec![]), ExportResult::Failure);
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn test_policy_starting_at_ceiling_sends_nothing() {
        let client = ScriptedClient::always(200);
        let builder = HttpExporterBuilder::default()
            .with_http_client(client.clone())
            .with_retry_policy(
                RetryPolicy::new(Duration::from_millis(64), Duration::from_millis(64)).unwrap(),
            );
        let exporter = build_client_with(builder, &empty_env()).unwrap();

        assert_eq!(exporter.export(vec![]), ExportResult::Failure);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_requests_carry_endpoint_headers_and_timeout() {
        let client = ScriptedClient::always(200);
        let builder = HttpExporterBuilder::default()
            .with_http_client(client.clone())
            .with_endpoint("http://collector:4318/")
            .with_timeout(Duration::from_secs(3))
            .with_headers(HashMap::from([("x-tenant".to_string(), "blue".to_string())]));
        let exporter = build_client_with(builder, &empty_env()).unwrap();

        assert_eq!(exporter.export(vec![]), ExportResult::Success);

        let request = &client.requests()[0];
        assert_eq!(request.method, http::Method::POST);
        assert_eq!(request.uri, "http://collector:4318/v1/traces");
        assert_eq!(request.timeout, Duration::from_secs(3));
        assert_eq!(request.headers["x-tenant"], "blue");
        assert_eq!(request.headers[CONTENT_TYPE], "application/x-protobuf");
        assert!(request.headers.contains_key(USER_AGENT));
    }

    #[test]
    fn test_partial_success_is_still_success() {
        let client = ScriptedClient::default();
        let response = ExportTraceServiceResponse {
            partial_success: Some(ExportTracePartialSuccess {
                rejected_spans: 2,
                error_message: "spans too large".to_string(),
            }),
        };
        client.push(Ok((200, Bytes::from(response.encode_to_vec()))));
        let exporter = exporter_with(&client);

        assert_eq!(exporter.export(vec![]), ExportResult::Success);
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn test_undecodable_success_body_is_ignored() {
        let client = ScriptedClient::default();
        client.push(Ok((200, Bytes::from_static(b"\xff\xff\xff"))));
        let exporter = exporter_with(&client);

        assert_eq!(exporter.export(vec![]), ExportResult::Success);
    }

    #[test]
    fn test_export_after_shutdown_fails_without_calls() {
        let client = ScriptedClient::always(200);
        let exporter = exporter_with(&client);

        exporter.shutdown();

        assert_eq!(exporter.export(vec![]), ExportResult::Failure);
        assert_eq!(exporter.export(vec![]), ExportResult::Failure);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_double_shutdown_releases_client_once() {
        let client = ScriptedClient::always(200);
        let exporter = exporter_with(&client);
        assert_eq!(client.other_handles(), 1);

        exporter.shutdown();
        assert_eq!(client.other_handles(), 0);

        exporter.shutdown();
        assert_eq!(client.other_handles(), 0);
        assert!(exporter.client.lock().unwrap().is_none());
    }

    #[test]
    fn test_force_flush_is_a_no_op() {
        let client = ScriptedClient::always(200);
        let exporter = exporter_with(&client);

        assert!(exporter.force_flush(Duration::from_millis(1)));
        exporter.shutdown();
        assert!(exporter.force_flush(Duration::from_millis(1)));
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_concurrent_exports_share_the_client() {
        let client = ScriptedClient::always(200);
        let exporter = Arc::new(exporter_with(&client));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let exporter = Arc::clone(&exporter);
                thread::spawn(move || {
                    let name = if i % 2 == 0 { "even" } else { "odd" };
                    let scope = InstrumentationScope::builder("worker").build();
                    exporter.export(vec![sample_span(name, scope)])
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), ExportResult::Success);
        }
        assert_eq!(client.call_count(), 4);
    }

    #[test]
    fn test_shutdown_during_send_lets_it_finish() {
        let client = ScriptedClient::always(200);
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let builder = HttpExporterBuilder::default()
            .with_http_client(GatedClient {
                inner: client.clone(),
                entered: Arc::clone(&entered),
                release: Arc::clone(&release),
            })
            .with_retry_policy(fast_policy());
        let exporter = Arc::new(build_client_with(builder, &empty_env()).unwrap());

        let in_flight = {
            let exporter = Arc::clone(&exporter);
            thread::spawn(move || exporter.export(vec![]))
        };
        entered.wait();

        exporter.shutdown();
        assert!(exporter.client.lock().unwrap().is_none());
        // the blocked send still holds the client
        assert_eq!(client.other_handles(), 1);
        assert_eq!(client.call_count(), 0);

        release.wait();
        assert_eq!(in_flight.join().unwrap(), ExportResult::Success);
        assert_eq!(client.call_count(), 1);
        assert_eq!(client.other_handles(), 0);

        assert_eq!(exporter.export(vec![]), ExportResult::Failure);
        assert_eq!(client.call_count(), 1);
    }
}
