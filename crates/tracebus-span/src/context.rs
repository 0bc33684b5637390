//! Explicit trace context threaded through a dispatch.
//!
//! There is no ambient "current span": whoever starts a span hands the
//! derived `TraceContext` to the code that runs inside it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiers linking a span into its trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanContext {
    /// Identifier shared by every span of one logical request.
    pub trace_id: Uuid,
    /// Identifier of this span.
    pub span_id: Uuid,
}

/// The span that is active for a unit of work, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    active: Option<SpanContext>,
}

impl TraceContext {
    /// A context with no active span. Spans started from it are roots.
    pub fn root() -> Self {
        Self::default()
    }

    /// Derive a context in which `span` is the active span.
    pub fn with_active(&self, span: SpanContext) -> Self {
        Self { active: Some(span) }
    }

    pub fn active_span(&self) -> Option<&SpanContext> {
        self.active.as_ref()
    }

    pub fn trace_id(&self) -> Option<Uuid> {
        self.active.map(|s| s.trace_id)
    }

    pub fn is_root(&self) -> bool {
        self.active.is_none()
    }
}
