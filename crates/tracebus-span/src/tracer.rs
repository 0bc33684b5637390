//! Tracer port.
//!
//! Components that trace depend on these traits rather than on a concrete
//! telemetry SDK. `recording` provides the in-memory implementation; an
//! OpenTelemetry adapter lives in `tracebus-core` behind the `otlp` feature.

use std::sync::Arc;
use thiserror::Error;

use crate::context::SpanContext;
use crate::span::{AttributeValue, Attributes, SpanKind, Status};

/// Errors reported by a provider flush or shutdown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlushError {
    /// The exporter refused or failed to accept the queued spans
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// The flush did not complete in time
    #[error("Flush timed out: {0}")]
    Timeout(String),

    /// The provider was already shut down
    #[error("Provider is shut down")]
    ShutDown,
}

/// Construction options for a new span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanOptions {
    pub kind: Option<SpanKind>,
    pub attributes: Attributes,
}

impl SpanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// A started span.
pub trait Span: Send {
    fn context(&self) -> SpanContext;

    fn set_attribute(&mut self, key: &str, value: AttributeValue);

    fn add_event(&mut self, name: &str, attributes: Attributes);

    /// Attach `fault` as a recorded exception. Does not change the status.
    fn record_exception(&mut self, fault: &dyn std::error::Error);

    fn set_status(&mut self, status: Status);

    /// End the span. Calls after the first are ignored.
    fn end(&mut self);

    fn is_ended(&self) -> bool;
}

/// Builds spans.
pub trait Tracer: Send + Sync {
    /// Start a span named `name`; a `parent` makes it a child in the same trace.
    fn start_span(&self, name: &str, options: SpanOptions, parent: Option<&SpanContext>)
        -> Box<dyn Span>;
}

/// Owns the export pipeline behind one or more tracers.
pub trait TracerProvider: Send + Sync {
    fn tracer(&self, instrumentation_name: &str) -> Arc<dyn Tracer>;

    /// Block until queued spans are handed to the exporter.
    fn force_flush(&self) -> Result<(), FlushError>;

    /// Flush and stop accepting spans.
    fn shutdown(&self) -> Result<(), FlushError>;
}
