//! In-process command bus.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracebus_span::TraceContext;

use super::handler::{FaultLocation, HandlerFault, HandlerLocator, TracedFault};
use super::middleware::TracerMiddleware;
use crate::message::Command;
use crate::telemetry::{keys, Tracing};

/// Errors returned by `CommandBus::dispatch`
#[derive(Error, Debug)]
pub enum BusError {
    /// No handler is registered for the command
    #[error("No handler registered for {message_type} ({type_name})")]
    HandlerNotFound {
        message_type: String,
        type_name: String,
    },

    /// The handler failed; the fault is passed on unchanged
    #[error(transparent)]
    Handler(#[from] HandlerFault),
}

impl BusError {
    /// Check if this error is a wiring gap rather than a handler failure
    pub fn is_wiring_error(&self) -> bool {
        matches!(self, BusError::HandlerNotFound { .. })
    }

    pub fn handler_fault(&self) -> Option<&HandlerFault> {
        match self {
            BusError::Handler(fault) => Some(fault),
            BusError::HandlerNotFound { .. } => None,
        }
    }
}

impl TracedFault for BusError {
    fn code(&self) -> i64 {
        self.handler_fault().map(TracedFault::code).unwrap_or(0)
    }

    fn location(&self) -> Option<FaultLocation> {
        self.handler_fault().and_then(TracedFault::location)
    }
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Resolves a handler for each command and runs it inside the tracing
/// middleware.
pub struct CommandBus {
    locator: Arc<dyn HandlerLocator>,
    middleware: TracerMiddleware,
}

impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBus")
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

impl CommandBus {
    /// Create a bus with tracing disabled
    pub fn new(locator: Arc<dyn HandlerLocator>) -> Self {
        Self {
            middleware: TracerMiddleware::new(Arc::clone(&locator)),
            locator,
        }
    }

    pub fn with_tracing(mut self, tracing: Tracing) -> Self {
        self.middleware = self.middleware.with_tracing(tracing);
        self
    }

    pub fn tracing(&self) -> &Tracing {
        self.middleware.tracing()
    }

    pub fn middleware(&self) -> &TracerMiddleware {
        &self.middleware
    }

    /// Dispatch `command` to its handler
    pub async fn dispatch(&self, ctx: &TraceContext, command: &dyn Command) -> Result<Option<Value>> {
        let resolved = self
            .locator
            .locate(command.type_name(), command.message_type())
            .ok_or_else(|| BusError::HandlerNotFound {
                message_type: command.message_type().to_string(),
                type_name: command.type_name().to_string(),
            })?;

        tracing::debug!(
            message_type = %command.message_type(),
            handler = %resolved.handler.type_name(),
            method = %resolved.method,
            "Dispatching command"
        );

        let mut attributes = Vec::new();
        if let Some(uuid) = command.uuid() {
            attributes.push((keys::ENTITY_UUID.to_string(), uuid.to_string().into()));
        }

        let handler = resolved.handler;
        self.middleware
            .execute_with_attributes(ctx, command, attributes, move |child| async move {
                handler.handle(child, command).await
            })
            .await
            .map_err(BusError::Handler)
    }
}
