//! Span lifecycle manager shared by traced components.
//!
//! A component that traces owns a `Tracing` value and calls its
//! primitives. Every primitive degrades to a no-op while tracing is
//! disabled or no tracer is wired, so callers never branch on telemetry
//! state themselves.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracebus_span::{FlushError, Span, Status, TraceContext, Tracer, TracerProvider};

use super::helper::{process_span_options, OperationOptions, TracingHelper};
use super::scope::{finish_span, Scope, SpanGuard};
use crate::config::TracingConfig;

/// Owner name used until a component identifies itself.
pub const DEFAULT_OWNER: &str = "tracebus";

/// Per-component tracing state.
///
/// The helper is present exactly when the tracer is. The enabled flag is
/// independent and can be toggled without clearing either.
#[derive(Clone)]
pub struct Tracing {
    owner: &'static str,
    enabled: bool,
    tracer: Option<Arc<dyn Tracer>>,
    helper: Option<TracingHelper>,
    provider: Option<Arc<dyn TracerProvider>>,
}

impl fmt::Debug for Tracing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracing")
            .field("owner", &self.owner)
            .field("enabled", &self.enabled)
            .field("tracer", &self.tracer.is_some())
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

impl Default for Tracing {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracing {
    /// Disabled, with nothing wired
    pub fn new() -> Self {
        Self {
            owner: DEFAULT_OWNER,
            enabled: false,
            tracer: None,
            helper: None,
            provider: None,
        }
    }

    /// Disabled state owned by component type `C`; its short name prefixes
    /// operation names
    pub fn for_component<C: ?Sized>() -> Self {
        Self::new().with_owner(std::any::type_name::<C>())
    }

    /// Wire enable flag, tracer and provider from configuration
    pub fn from_config(config: &TracingConfig, provider: Arc<dyn TracerProvider>) -> Self {
        let tracer = provider.tracer(&config.instrumentation_name);
        Self::new()
            .with_enabled(config.enabled)
            .with_tracer(tracer)
            .with_provider(provider)
    }

    pub fn with_owner(mut self, owner: &'static str) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.set_tracer(Some(tracer));
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn TracerProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Set or clear the tracer. The helper follows.
    pub fn set_tracer(&mut self, tracer: Option<Arc<dyn Tracer>>) {
        self.helper = tracer.as_ref().map(|t| TracingHelper::new(Arc::clone(t)));
        self.tracer = tracer;
    }

    pub fn set_provider(&mut self, provider: Option<Arc<dyn TracerProvider>>) {
        self.provider = provider;
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enabled and wired to a tracer
    pub fn is_active(&self) -> bool {
        self.enabled && self.tracer.is_some()
    }

    pub fn tracer(&self) -> Option<&Arc<dyn Tracer>> {
        self.tracer.as_ref()
    }

    pub fn helper(&self) -> Option<&TracingHelper> {
        self.helper.as_ref()
    }

    pub fn provider(&self) -> Option<&Arc<dyn TracerProvider>> {
        self.provider.as_ref()
    }

    fn active_tracer(&self) -> Option<&Arc<dyn Tracer>> {
        if self.enabled {
            self.tracer.as_ref()
        } else {
            None
        }
    }

    fn start(&self, ctx: &TraceContext, operation: &str, options: OperationOptions) -> Option<Box<dyn Span>> {
        let tracer = self.active_tracer()?;
        let (name, span_options) = process_span_options(self.owner, operation, options);
        let span = tracer.start_span(&name, span_options, ctx.active_span());
        tracing::debug!(span = %name, parent = ?ctx.active_span().map(|p| p.span_id), "Started span");
        Some(span)
    }

    /// Start a span as a child of `ctx` and activate it
    ///
    /// Returns `None` while disabled or without a tracer. The scope's
    /// context is what nested work should receive.
    pub fn start_active_span(
        &self,
        ctx: &TraceContext,
        operation: &str,
        options: OperationOptions,
    ) -> Option<(Box<dyn Span>, Scope)> {
        let span = self.start(ctx, operation, options)?;
        let scope = Scope::activate(ctx, span.context());
        Some((span, scope))
    }

    /// Start a span as a child of `ctx` without activating it
    ///
    /// For sibling or background work. The caller ends the span.
    pub fn start_detached_span(
        &self,
        ctx: &TraceContext,
        operation: &str,
        options: OperationOptions,
    ) -> Option<Box<dyn Span>> {
        self.start(ctx, operation, options)
    }

    /// Start an active span owned by a guard that ends it on drop
    pub fn start_guarded_span(&self, ctx: &TraceContext, operation: &str, options: OperationOptions) -> Option<SpanGuard> {
        self.start_active_span(ctx, operation, options)
            .map(|(span, scope)| SpanGuard::new(span, Some(scope)))
    }

    /// Detach `scope`, then end `span`. Either may be absent.
    pub fn finish_span(&self, span: Option<Box<dyn Span>>, scope: Option<Scope>) {
        finish_span(span, scope);
    }

    /// Record `fault` on the span and mark it failed with the fault's message
    pub fn record_exception(&self, span: Option<&mut Box<dyn Span>>, fault: &dyn Error) {
        if let Some(span) = span {
            span.record_exception(fault);
            span.set_status(Status::error(fault.to_string()));
        }
    }

    pub fn set_status_ok(&self, span: Option<&mut Box<dyn Span>>) {
        if let Some(span) = span {
            span.set_status(Status::Ok);
        }
    }

    /// Provider to flush, if tracing is enabled and one is wired
    pub fn flush_target(&self) -> Option<&Arc<dyn TracerProvider>> {
        if self.enabled {
            self.provider.as_ref()
        } else {
            None
        }
    }

    /// Force-flush the provider. Succeeds without doing anything while
    /// disabled or without a provider.
    pub fn flush(&self) -> Result<(), FlushError> {
        match self.flush_target() {
            Some(provider) => provider.force_flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracebus_span::{AttributeValue, ExportMode, InMemoryExporter, RecordingProvider, SpanKind};

    struct OrderService;

    fn wired(enabled: bool) -> (Tracing, RecordingProvider, InMemoryExporter) {
        let (provider, exporter) = RecordingProvider::in_memory(ExportMode::Immediate);
        let tracing = Tracing::for_component::<OrderService>()
            .with_enabled(enabled)
            .with_tracer(provider.tracer("test"))
            .with_provider(Arc::new(provider.clone()));
        (tracing, provider, exporter)
    }

    #[derive(Debug, thiserror::Error)]
    #[error("stock exhausted")]
    struct StockExhausted;

    #[test]
    fn test_new_is_disabled_and_empty() {
        let tracing = Tracing::new();
        assert!(!tracing.is_enabled());
        assert!(!tracing.is_active());
        assert!(tracing.tracer().is_none());
        assert!(tracing.helper().is_none());
        assert!(tracing
            .start_active_span(&TraceContext::root(), "op", OperationOptions::new())
            .is_none());
    }

    #[test]
    fn test_helper_follows_tracer() {
        let (mut tracing, _, _) = wired(true);
        assert!(tracing.helper().is_some());

        tracing.set_tracer(None);
        assert!(tracing.helper().is_none());
        assert!(tracing.is_enabled());
        assert!(!tracing.is_active());
    }

    #[test]
    fn test_disabled_keeps_tracer() {
        let (mut tracing, _, _) = wired(true);
        tracing.set_enabled(false);
        assert!(tracing.tracer().is_some());
        assert!(tracing
            .start_detached_span(&TraceContext::root(), "op", OperationOptions::new())
            .is_none());
    }

    #[test]
    fn test_active_span_name_and_options() {
        let (tracing, _, exporter) = wired(true);
        let options = OperationOptions::new()
            .with_kind(SpanKind::Producer)
            .with_attribute("order", "o-1");

        let (span, scope) = tracing
            .start_active_span(&TraceContext::root(), "reserve", options)
            .unwrap();
        assert_eq!(scope.context().active_span(), Some(&span.context()));
        tracing.finish_span(Some(span), Some(scope));

        let record = exporter.span_named("OrderService_reserve").unwrap();
        assert_eq!(record.kind, SpanKind::Producer);
        assert_eq!(record.attribute("order"), Some(&AttributeValue::from("o-1")));
    }

    #[test]
    fn test_detached_span_is_child_of_context() {
        let (tracing, _, exporter) = wired(true);
        let (parent, scope) = tracing
            .start_active_span(&TraceContext::root(), "parent", OperationOptions::new())
            .unwrap();

        let mut sibling = tracing
            .start_detached_span(&scope.context(), "sibling", OperationOptions::new().without_caller_prefix())
            .unwrap();
        sibling.end();
        tracing.finish_span(Some(parent), Some(scope));

        let tree = exporter.tree();
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.roots()[0].children[0].name, "sibling");
    }

    #[test]
    fn test_record_exception_sets_error() {
        let (tracing, _, exporter) = wired(true);
        let mut span = tracing.start_detached_span(&TraceContext::root(), "op", OperationOptions::new());

        tracing.record_exception(span.as_mut(), &StockExhausted);
        tracing.finish_span(span, None);

        let record = exporter.finished_spans().remove(0);
        assert_eq!(record.status, Status::error("stock exhausted"));
        assert!(record.event("exception").is_some());
    }

    #[test]
    fn test_primitives_without_span_are_noops() {
        let tracing = Tracing::new();
        tracing.record_exception(None, &StockExhausted);
        tracing.set_status_ok(None);
        tracing.finish_span(None, None);
    }

    #[test]
    fn test_set_status_ok() {
        let (tracing, _, exporter) = wired(true);
        let mut span = tracing.start_detached_span(&TraceContext::root(), "op", OperationOptions::new());
        tracing.set_status_ok(span.as_mut());
        tracing.finish_span(span, None);

        assert_eq!(exporter.finished_spans()[0].status, Status::Ok);
    }

    #[test]
    fn test_flush_skipped_when_disabled() {
        let (tracing, provider, _) = wired(false);
        assert!(tracing.flush_target().is_none());
        provider.shutdown().unwrap();
        // A shut-down provider would refuse the flush, so this proves it was not called.
        assert!(tracing.flush().is_ok());
    }

    #[test]
    fn test_flush_reports_provider_result() {
        let (tracing, provider, _) = wired(true);
        assert!(tracing.flush().is_ok());
        provider.shutdown().unwrap();
        assert_eq!(tracing.flush(), Err(FlushError::ShutDown));
    }

    #[test]
    fn test_from_config() {
        let (provider, _) = RecordingProvider::in_memory(ExportMode::Batch);
        let config = TracingConfig::builder().enabled(true).build();

        let tracing = Tracing::from_config(&config, Arc::new(provider));
        assert!(tracing.is_active());
        assert!(tracing.provider().is_some());
    }
}
