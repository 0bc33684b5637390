//! Tracing middleware around command dispatch
//!
//! Wraps each dispatch in a span named after the handler that will service
//! it. The middleware never changes what the wrapped stage returns: values
//! and faults come back exactly as produced, with the span as the only side
//! effect.
//!
//! # Span lifecycle
//!
//! ```text
//! idle ─┬─ disabled / no tracer / no handler ──────────────> pass-through
//!       └─ start span + activate ─> run next ─┬─ Ok  ─> status OK    ─┐
//!                                             └─ Err ─> record fault ─┴─> detach + end
//! ```
//!
//! Detach and end happen on every path. A `SpanGuard` covers the paths that
//! never reach the end of `execute`: a dropped future or an unwinding panic.

use std::future::Future;
use std::sync::Arc;
use tracebus_span::{Attributes, TraceContext};

use super::handler::{HandlerLocator, TracedFault};
use crate::message::Message;
use crate::telemetry::keys::{self, component, event};
use crate::telemetry::{OperationOptions, SpanGuard, Tracing};

/// Opens a span around each dispatch it executes.
pub struct TracerMiddleware {
    locator: Arc<dyn HandlerLocator>,
    tracing: Tracing,
}

impl std::fmt::Debug for TracerMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracerMiddleware")
            .field("tracing", &self.tracing)
            .finish_non_exhaustive()
    }
}

impl TracerMiddleware {
    /// Create middleware with tracing disabled
    pub fn new(locator: Arc<dyn HandlerLocator>) -> Self {
        Self {
            locator,
            tracing: Tracing::for_component::<Self>(),
        }
    }

    pub fn with_tracing(mut self, tracing: Tracing) -> Self {
        self.tracing = tracing;
        self
    }

    pub fn tracing(&self) -> &Tracing {
        &self.tracing
    }

    pub fn tracing_mut(&mut self) -> &mut Tracing {
        &mut self.tracing
    }

    /// Run `next` for `message` inside a dispatch span
    ///
    /// `next` receives the context in which the dispatch span is active,
    /// or `ctx` itself when no span was started.
    pub async fn execute<M, R, E, F, Fut>(&self, ctx: &TraceContext, message: &M, next: F) -> Result<R, E>
    where
        M: Message + ?Sized,
        E: TracedFault,
        F: FnOnce(TraceContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        self.execute_with_attributes(ctx, message, Attributes::new(), next)
            .await
    }

    /// Like `execute`, adding `attributes` to the dispatch span
    pub async fn execute_with_attributes<M, R, E, F, Fut>(
        &self,
        ctx: &TraceContext,
        message: &M,
        attributes: Attributes,
        next: F,
    ) -> Result<R, E>
    where
        M: Message + ?Sized,
        E: TracedFault,
        F: FnOnce(TraceContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let Some(mut guard) = self.start_trace(ctx, message, attributes) else {
            return next(*ctx).await;
        };

        let child = guard.context().unwrap_or(*ctx);
        let result = next(child).await;

        match &result {
            Ok(_) => self.tracing.set_status_ok(guard.span_mut()),
            Err(fault) => self.handle_trace_exception(&mut guard, message, fault),
        }
        guard.finish();

        result
    }

    fn start_trace<M>(&self, ctx: &TraceContext, message: &M, attributes: Attributes) -> Option<SpanGuard>
    where
        M: Message + ?Sized,
    {
        if !self.tracing.is_active() {
            return None;
        }

        let Some(resolved) = self.locator.locate(message.type_name(), message.message_type()) else {
            tracing::warn!(
                message_type = %message.message_type(),
                command = %message.type_name(),
                "No handler located, dispatching without a span"
            );
            return None;
        };

        let mut options = OperationOptions::new()
            .without_caller_prefix()
            .with_attribute(keys::COMPONENT, component::COMMAND_BUS)
            .with_attribute(keys::COMMAND, message.type_name())
            .with_attribute(keys::MESSAGE_TYPE, message.message_type());
        if let Some(process_uuid) = message.process_uuid() {
            options = options.with_attribute(keys::PROCESS_UUID, process_uuid.to_string());
        }
        for (key, value) in attributes {
            options = options.with_attribute(key, value);
        }

        self.tracing
            .start_guarded_span(ctx, &resolved.operation_name(), options)
    }

    fn handle_trace_exception<M, E>(&self, guard: &mut SpanGuard, message: &M, fault: &E)
    where
        M: Message + ?Sized,
        E: TracedFault,
    {
        self.tracing.record_exception(guard.span_mut(), fault);

        let (Some(helper), Some(span)) = (self.tracing.helper(), guard.span_mut()) else {
            return;
        };

        let mut fields: Attributes = vec![
            (event::MESSAGE.to_string(), fault.to_string().into()),
            (event::CODE.to_string(), fault.code().into()),
        ];
        if let Some(location) = fault.location() {
            fields.push((event::FILE.to_string(), location.file.into()));
            fields.push((event::LINE.to_string(), location.line.into()));
        }

        helper
            .set_attribute(&mut **span, keys::COMMAND_FAILED, message.type_name())
            .add_event(&mut **span, event::COMMAND_ERROR, fields);
    }
}
