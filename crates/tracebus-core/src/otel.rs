//! OpenTelemetry adapter for the tracer port.
//!
//! `OtelTracer` and `OtelProvider` implement the `tracebus_span` port
//! traits over the OpenTelemetry SDK. `TracerProviderFactory` builds an
//! OTLP/HTTP pipeline from a `TracingConfig`.

use opentelemetry::trace::{
    Span as _, SpanBuilder, SpanContext as OtelSpanContext, SpanId, Status as OtelStatus, TraceContextExt,
    TraceFlags, TraceId, TraceState, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::sync::Arc;
use thiserror::Error;
use tracebus_span::{
    AttributeValue, Attributes, FlushError, Span, SpanContext, SpanKind, SpanOptions, Status, Tracer,
    TracerProvider,
};
use uuid::Uuid;

use crate::config::{ConfigError, TracingConfig};
use crate::telemetry::Tracing;

/// OpenTelemetry pipeline setup errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid tracing configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Failed to set up span exporter: {0}")]
    SpanExporterSetup(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

fn trace_id_of(uuid: &Uuid) -> TraceId {
    TraceId::from_bytes(*uuid.as_bytes())
}

/// Span ids are 8 bytes; the low half of the UUID is used.
fn span_id_of(uuid: &Uuid) -> SpanId {
    let bytes = uuid.as_bytes();
    let mut id = [0u8; 8];
    id.copy_from_slice(&bytes[8..]);
    SpanId::from_bytes(id)
}

fn context_of(otel: &OtelSpanContext) -> SpanContext {
    let mut span_bytes = [0u8; 16];
    span_bytes[8..].copy_from_slice(&otel.span_id().to_bytes());
    SpanContext {
        trace_id: Uuid::from_bytes(otel.trace_id().to_bytes()),
        span_id: Uuid::from_bytes(span_bytes),
    }
}

fn parent_context(parent: Option<&SpanContext>) -> Context {
    match parent {
        Some(parent) => Context::new().with_remote_span_context(OtelSpanContext::new(
            trace_id_of(&parent.trace_id),
            span_id_of(&parent.span_id),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        )),
        None => Context::new(),
    }
}

fn kind_of(kind: SpanKind) -> opentelemetry::trace::SpanKind {
    use opentelemetry::trace::SpanKind as Otel;
    match kind {
        SpanKind::Internal => Otel::Internal,
        SpanKind::Server => Otel::Server,
        SpanKind::Client => Otel::Client,
        SpanKind::Producer => Otel::Producer,
        SpanKind::Consumer => Otel::Consumer,
    }
}

fn value_of(value: AttributeValue) -> Value {
    match value {
        AttributeValue::Bool(v) => Value::Bool(v),
        AttributeValue::Int(v) => Value::I64(v),
        AttributeValue::Float(v) => Value::F64(v),
        AttributeValue::String(v) => Value::String(v.into()),
    }
}

fn key_values(attributes: Attributes) -> Vec<KeyValue> {
    attributes
        .into_iter()
        .map(|(key, value)| KeyValue::new(key, value_of(value)))
        .collect()
}

fn status_of(status: Status) -> OtelStatus {
    match status {
        Status::Unset => OtelStatus::Unset,
        Status::Ok => OtelStatus::Ok,
        Status::Error { message } => OtelStatus::error(message),
    }
}

fn flush_error(error: OTelSdkError) -> FlushError {
    match error {
        OTelSdkError::AlreadyShutdown => FlushError::ShutDown,
        OTelSdkError::Timeout(elapsed) => FlushError::Timeout(format!("{:?}", elapsed)),
        other => FlushError::ExportFailed(other.to_string()),
    }
}

/// Tracer port over an OpenTelemetry tracer.
pub struct OtelTracer<T> {
    inner: T,
}

impl<T> OtelTracer<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T> Tracer for OtelTracer<T>
where
    T: opentelemetry::trace::Tracer + Send + Sync,
    T::Span: Send + 'static,
{
    fn start_span(&self, name: &str, options: SpanOptions, parent: Option<&SpanContext>) -> Box<dyn Span> {
        let builder = SpanBuilder::from_name(name.to_string())
            .with_kind(kind_of(options.kind.unwrap_or_default()))
            .with_attributes(key_values(options.attributes));
        let span = self.inner.build_with_context(builder, &parent_context(parent));

        Box::new(OtelSpan {
            inner: span,
            ended: false,
        })
    }
}

/// Span port over an OpenTelemetry span.
pub struct OtelSpan<S> {
    inner: S,
    ended: bool,
}

impl<S> Span for OtelSpan<S>
where
    S: opentelemetry::trace::Span + Send,
{
    fn context(&self) -> SpanContext {
        context_of(self.inner.span_context())
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.inner.set_attribute(KeyValue::new(key.to_string(), value_of(value)));
    }

    fn add_event(&mut self, name: &str, attributes: Attributes) {
        self.inner.add_event(name.to_string(), key_values(attributes));
    }

    fn record_exception(&mut self, fault: &dyn std::error::Error) {
        self.inner.record_error(fault);
    }

    fn set_status(&mut self, status: Status) {
        self.inner.set_status(status_of(status));
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            self.inner.end();
        }
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

/// Provider port over the OpenTelemetry SDK provider.
#[derive(Clone)]
pub struct OtelProvider {
    inner: SdkTracerProvider,
}

impl std::fmt::Debug for OtelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtelProvider").finish_non_exhaustive()
    }
}

impl OtelProvider {
    pub fn new(inner: SdkTracerProvider) -> Self {
        Self { inner }
    }

    pub fn sdk_provider(&self) -> &SdkTracerProvider {
        &self.inner
    }
}

impl TracerProvider for OtelProvider {
    fn tracer(&self, instrumentation_name: &str) -> Arc<dyn Tracer> {
        Arc::new(OtelTracer::new(self.inner.tracer(instrumentation_name.to_string())))
    }

    fn force_flush(&self) -> std::result::Result<(), FlushError> {
        self.inner.force_flush().map_err(flush_error)
    }

    fn shutdown(&self) -> std::result::Result<(), FlushError> {
        self.inner.shutdown().map_err(flush_error)
    }
}

/// Builds the OTLP export pipeline.
pub struct TracerProviderFactory;

impl TracerProviderFactory {
    /// Build a provider exporting to `config.otlp_endpoint` over OTLP/HTTP
    pub fn create(config: &TracingConfig) -> Result<OtelProvider> {
        config.validate()?;

        let exporter = SpanExporter::builder()
            .with_http()
            .with_endpoint(config.otlp_endpoint.clone())
            .with_protocol(Protocol::HttpBinary)
            .build()
            .map_err(|e| TelemetryError::SpanExporterSetup(e.to_string()))?;

        let resource = Resource::builder()
            .with_attributes([
                KeyValue::new("service.name", config.service_name.clone()),
                KeyValue::new("service.version", config.service_version.clone()),
                KeyValue::new("deployment.environment.name", config.environment.clone()),
            ])
            .build();

        let builder = SdkTracerProvider::builder()
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
            .with_resource(resource);

        let builder = if config.use_batch_processor {
            let processor = BatchSpanProcessor::builder(exporter)
                .with_batch_config(
                    BatchConfigBuilder::default()
                        .with_max_queue_size(config.max_queue_size)
                        .build(),
                )
                .build();
            builder.with_span_processor(processor)
        } else {
            builder.with_simple_exporter(exporter)
        };

        tracing::debug!(
            endpoint = %config.otlp_endpoint,
            service = %config.service_name,
            batch = config.use_batch_processor,
            "Created OTLP tracer provider"
        );

        Ok(OtelProvider::new(builder.build()))
    }

    /// Build the provider and the `Tracing` state wired to it
    pub fn create_tracing(config: &TracingConfig) -> Result<(Tracing, Arc<OtelProvider>)> {
        let provider = Arc::new(Self::create(config)?);
        let tracing = Tracing::from_config(config, Arc::clone(&provider) as Arc<dyn TracerProvider>);
        Ok((tracing, provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_survive_mapping() {
        let trace_id = Uuid::new_v4();
        let mut span_bytes = [0u8; 16];
        span_bytes[8..].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let span_id = Uuid::from_bytes(span_bytes);

        let otel = OtelSpanContext::new(
            trace_id_of(&trace_id),
            span_id_of(&span_id),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        );
        let back = context_of(&otel);
        assert_eq!(back.trace_id, trace_id);
        assert_eq!(back.span_id, span_id);
    }

    #[test]
    fn test_parent_context() {
        assert!(!parent_context(None).has_active_span());

        let parent = SpanContext {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
        };
        let cx = parent_context(Some(&parent));
        assert_eq!(cx.span().span_context().trace_id(), trace_id_of(&parent.trace_id));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(Status::Ok), OtelStatus::Ok);
        assert_eq!(status_of(Status::error("boom")), OtelStatus::error("boom"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TracingConfig::builder().max_queue_size(0).build();
        assert!(matches!(
            TracerProviderFactory::create(&config),
            Err(TelemetryError::InvalidConfig(ConfigError::ZeroQueueSize))
        ));
    }

    #[test]
    fn test_flush_error_mapping() {
        assert_eq!(flush_error(OTelSdkError::AlreadyShutdown), FlushError::ShutDown);
        assert!(matches!(
            flush_error(OTelSdkError::InternalFailure("x".into())),
            FlushError::ExportFailed(_)
        ));
    }
}
