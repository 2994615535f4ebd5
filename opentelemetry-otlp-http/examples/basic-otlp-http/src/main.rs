use opentelemetry::trace::{
    Event, SpanContext, SpanId, SpanKind, Status, TraceFlags, TraceId, TraceState,
};
use opentelemetry::{InstrumentationScope, KeyValue};
use opentelemetry_otlp_http::export::trace::SpanExporter as _;
use opentelemetry_otlp_http::SpanExporter;
use opentelemetry_sdk::trace::{SpanData, SpanEvents, SpanLinks};
use opentelemetry_sdk::Resource;
use std::borrow::Cow;
use std::error::Error;
use std::time::{Duration, SystemTime};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_logs() {
    // The fmt layer prints `info` and above, plus the exporter's own
    // diagnostics from `debug` up. Override with RUST_LOG.
    let filter_fmt = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info").add_directive("opentelemetry_otlp_http=debug".parse().unwrap())
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_names(true)
        .with_filter(filter_fmt);

    tracing_subscriber::registry().with(fmt_layer).init();
}

fn span(
    name: &'static str,
    span_id: u64,
    parent_span_id: SpanId,
    start_time: SystemTime,
    scope: &InstrumentationScope,
) -> SpanData {
    SpanData {
        span_context: SpanContext::new(
            TraceId::from_bytes(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736_u128.to_be_bytes()),
            SpanId::from_bytes(span_id.to_be_bytes()),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        ),
        parent_span_id,
        parent_span_is_remote: false,
        span_kind: SpanKind::Internal,
        name: Cow::Borrowed(name),
        start_time,
        end_time: start_time + Duration::from_millis(25),
        attributes: vec![KeyValue::new("another.key", "yes")],
        dropped_attributes_count: 0,
        events: SpanEvents::default(),
        links: SpanLinks::default(),
        status: Status::Ok,
        instrumentation_scope: scope.clone(),
    }
}

fn main() -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    init_logs();

    // Endpoint, headers, timeout, compression and certificate all come from
    // the OTEL_EXPORTER_OTLP_* environment variables when set.
    let exporter = SpanExporter::builder()
        .with_resource(
            Resource::builder_empty()
                .with_service_name("basic-otlp-example-http")
                .build(),
        )
        .build()?;

    let scope = InstrumentationScope::builder("basic")
        .with_version("1.0")
        .with_attributes([KeyValue::new("scope-key", "scope-value")])
        .build();

    let now = SystemTime::now();
    let mut main_span = span("Main operation", 0xb7ad_6b71_6920_3331, SpanId::INVALID, now, &scope);
    main_span.events.events.push(Event::new(
        "Nice operation!",
        now + Duration::from_millis(5),
        vec![KeyValue::new("some.key", 100)],
        0,
    ));
    let sub_span = span(
        "Sub operation...",
        0x00f0_67aa_0ba9_02b7,
        main_span.span_context.span_id(),
        now + Duration::from_millis(10),
        &scope,
    );

    let result = exporter.export(vec![sub_span, main_span]);
    info!(target: "my-target", "export finished, success: {}", result.is_success());

    exporter.shutdown();

    Ok(())
}
