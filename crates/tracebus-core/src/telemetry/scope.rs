//! Span activation and guaranteed cleanup.

use tracebus_span::{Span, SpanContext, TraceContext};

/// Activation of a span within an explicit trace context.
///
/// Holds the context the span was started from and the derived context in
/// which it is active. Detaching consumes the scope, so it happens at most
/// once.
#[must_use = "a scope should be detached when its span ends"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    previous: TraceContext,
    active: TraceContext,
}

impl Scope {
    /// Make `span` the active span of a context derived from `parent`.
    pub fn activate(parent: &TraceContext, span: SpanContext) -> Self {
        Self {
            previous: *parent,
            active: parent.with_active(span),
        }
    }

    /// Context to hand to work running inside the span.
    pub fn context(&self) -> TraceContext {
        self.active
    }

    /// Context that was active before this scope.
    pub fn previous(&self) -> TraceContext {
        self.previous
    }

    /// Deactivate, returning the context that was active before.
    pub fn detach(self) -> TraceContext {
        self.previous
    }
}

/// Detach `scope` if present, then end `span` if present.
pub fn finish_span(span: Option<Box<dyn Span>>, scope: Option<Scope>) {
    if let Some(scope) = scope {
        let _ = scope.detach();
    }
    if let Some(mut span) = span {
        span.end();
    }
}

/// Owns a started span and its scope until the traced work completes.
///
/// `finish` closes both. If the guard is dropped first, for instance when
/// the future holding it is cancelled or a panic unwinds through it, the
/// drop closes them instead. Either way the span ends exactly once.
#[must_use = "dropping the guard ends the span immediately"]
pub struct SpanGuard {
    span: Option<Box<dyn Span>>,
    scope: Option<Scope>,
}

impl std::fmt::Debug for SpanGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanGuard")
            .field("span", &self.span.as_ref().map(|s| s.context()))
            .field("scope", &self.scope)
            .finish()
    }
}

impl SpanGuard {
    pub fn new(span: Box<dyn Span>, scope: Option<Scope>) -> Self {
        Self {
            span: Some(span),
            scope,
        }
    }

    pub fn span_mut(&mut self) -> Option<&mut Box<dyn Span>> {
        self.span.as_mut()
    }

    /// Context in which the guarded span is active, if it was activated.
    pub fn context(&self) -> Option<TraceContext> {
        self.scope.as_ref().map(Scope::context)
    }

    pub fn span_context(&self) -> Option<SpanContext> {
        self.span.as_ref().map(|s| s.context())
    }

    /// Detach the scope and end the span.
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        finish_span(self.span.take(), self.scope.take());
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if self.span.is_some() {
            tracing::debug!(span = ?self.span_context(), "Span guard dropped before finish, ending span");
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracebus_span::{ExportMode, RecordingProvider, SpanOptions, TracerProvider};

    #[test]
    fn test_scope_restores_previous_context() {
        let (provider, _exporter) = RecordingProvider::in_memory(ExportMode::Immediate);
        let span = provider.tracer("test").start_span("op", SpanOptions::new(), None);

        let root = TraceContext::root();
        let scope = Scope::activate(&root, span.context());
        assert_eq!(scope.context().active_span(), Some(&span.context()));
        assert_eq!(scope.detach(), root);
    }

    #[test]
    fn test_finish_span_with_nothing_is_noop() {
        finish_span(None, None);
    }

    #[test]
    fn test_finish_span_ends_span() {
        let (provider, exporter) = RecordingProvider::in_memory(ExportMode::Immediate);
        let span = provider.tracer("test").start_span("op", SpanOptions::new(), None);
        let scope = Scope::activate(&TraceContext::root(), span.context());

        finish_span(Some(span), Some(scope));
        assert_eq!(exporter.len(), 1);
    }

    #[test]
    fn test_guard_ends_span_once() {
        let (provider, exporter) = RecordingProvider::in_memory(ExportMode::Immediate);
        let span = provider.tracer("test").start_span("op", SpanOptions::new(), None);
        let scope = Scope::activate(&TraceContext::root(), span.context());

        let guard = SpanGuard::new(span, Some(scope));
        assert!(guard.context().is_some());
        guard.finish();
        assert_eq!(exporter.len(), 1);
    }

    #[test]
    fn test_dropped_guard_ends_span() {
        let (provider, exporter) = RecordingProvider::in_memory(ExportMode::Immediate);
        {
            let span = provider.tracer("test").start_span("op", SpanOptions::new(), None);
            let _guard = SpanGuard::new(span, None);
        }
        assert_eq!(exporter.len(), 1);
        assert!(exporter.finished_spans()[0].is_ended());
    }
}
