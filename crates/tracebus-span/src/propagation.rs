//! Header propagation of the trace context across process boundaries.
//!
//! Writes and reads `X-Trace-Id` and `X-Parent-Span-Id`. A missing or
//! malformed parent span id yields a root context; a valid parent without
//! a trace id starts a fresh trace.

use std::collections::HashMap;
use uuid::Uuid;

use crate::context::{SpanContext, TraceContext};

pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const PARENT_SPAN_ID_HEADER: &str = "x-parent-span-id";

/// Carrier that trace headers can be written into.
pub trait Injector {
    fn set(&mut self, key: &str, value: String);
}

/// Carrier that trace headers can be read from.
pub trait Extractor {
    fn get(&self, key: &str) -> Option<&str>;
}

impl Injector for HashMap<String, String> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_ascii_lowercase(), value);
    }
}

impl Extractor for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.iter()
            .find(|(k, _)| k.to_ascii_lowercase() == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Write the active span of `ctx` into `carrier`. Root contexts write nothing.
pub fn inject(ctx: &TraceContext, carrier: &mut dyn Injector) {
    if let Some(span) = ctx.active_span() {
        carrier.set(TRACE_ID_HEADER, span.trace_id.to_string());
        carrier.set(PARENT_SPAN_ID_HEADER, span.span_id.to_string());
    }
}

/// Rebuild a trace context from `carrier`.
pub fn extract(carrier: &dyn Extractor) -> TraceContext {
    let parent_span_id = match carrier
        .get(PARENT_SPAN_ID_HEADER)
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
    {
        Some(id) => id,
        None => return TraceContext::root(),
    };

    let trace_id = carrier
        .get(TRACE_ID_HEADER)
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .unwrap_or_else(|| {
            tracing::debug!(
                parent_span_id = %parent_span_id,
                "Trace id header missing, starting a new trace"
            );
            Uuid::new_v4()
        });

    TraceContext::root().with_active(SpanContext {
        trace_id,
        span_id: parent_span_id,
    })
}
