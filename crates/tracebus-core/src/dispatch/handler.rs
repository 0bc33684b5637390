//! Command handlers, their faults and handler lookup.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use thiserror::Error;
use tracebus_span::TraceContext;

use crate::message::Command;
use crate::telemetry::short_name;

/// Source position a fault was raised at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultLocation {
    pub file: &'static str,
    pub line: u32,
}

impl FaultLocation {
    /// Location of the caller of the function this is invoked from.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for FaultLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A fault the dispatch middleware can describe on a span.
pub trait TracedFault: StdError + Send + Sync + 'static {
    /// Application-defined error code
    fn code(&self) -> i64 {
        0
    }

    /// Where the fault was raised, when known
    fn location(&self) -> Option<FaultLocation> {
        None
    }
}

/// A fault raised by a command handler.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct HandlerFault {
    message: String,
    code: i64,
    location: FaultLocation,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HandlerFault {
    /// Create a fault located at the caller
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 0,
            location: FaultLocation::caller(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it as the fault's source
    #[track_caller]
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            code: 0,
            location: FaultLocation::caller(),
            source: Some(Box::new(error)),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl TracedFault for HandlerFault {
    fn code(&self) -> i64 {
        self.code
    }

    fn location(&self) -> Option<FaultLocation> {
        Some(self.location)
    }
}

/// Result of handling a command. `None` is a valid, empty result.
pub type HandlerResult = Result<Option<Value>, HandlerFault>;

/// Services one or more command types.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Type path used in span names
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Handle `command`. `ctx` has the dispatch span active, so spans
    /// started from it become its children.
    async fn handle(&self, ctx: TraceContext, command: &dyn Command) -> HandlerResult;
}

/// A handler together with the method name that services the command.
#[derive(Clone)]
pub struct ResolvedHandler {
    pub handler: Arc<dyn CommandHandler>,
    pub method: String,
}

impl fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("handler", &self.handler.type_name())
            .field("method", &self.method)
            .finish()
    }
}

impl ResolvedHandler {
    /// `<ShortHandlerTypeName>_<method>`
    pub fn operation_name(&self) -> String {
        format!("{}_{}", short_name(self.handler.type_name()), self.method)
    }
}

/// Finds the handler for a message.
pub trait HandlerLocator: Send + Sync {
    /// Look up by concrete type path, falling back to the type tag at the
    /// implementation's discretion.
    fn locate(&self, type_name: &str, message_type: &str) -> Option<ResolvedHandler>;
}

/// Derives the handler method name for a message.
pub trait MethodNameInflector: Send + Sync {
    fn method_name(&self, type_name: &str, message_type: &str) -> String;
}

/// Always `handle`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleInflector;

impl MethodNameInflector for HandleInflector {
    fn method_name(&self, _type_name: &str, _message_type: &str) -> String {
        "handle".to_string()
    }
}

/// `handle_<type tag>`, e.g. `handle_create_user`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleTypeInflector;

impl MethodNameInflector for HandleTypeInflector {
    fn method_name(&self, _type_name: &str, message_type: &str) -> String {
        format!("handle_{}", message_type)
    }
}

/// Handler registry keyed by message type path, with the type tag as a
/// fallback key.
pub struct InMemoryHandlerLocator {
    by_type: HashMap<String, Arc<dyn CommandHandler>>,
    by_tag: HashMap<String, Arc<dyn CommandHandler>>,
    inflector: Arc<dyn MethodNameInflector>,
}

impl fmt::Debug for InMemoryHandlerLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.by_type.keys().collect();
        types.sort();
        let mut tags: Vec<&String> = self.by_tag.keys().collect();
        tags.sort();
        f.debug_struct("InMemoryHandlerLocator")
            .field("types", &types)
            .field("tags", &tags)
            .finish()
    }
}

impl Default for InMemoryHandlerLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHandlerLocator {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_tag: HashMap::new(),
            inflector: Arc::new(HandleInflector),
        }
    }

    pub fn with_inflector<I: MethodNameInflector + 'static>(mut self, inflector: I) -> Self {
        self.inflector = Arc::new(inflector);
        self
    }

    /// Register `handler` for the concrete message type `M`
    pub fn with_handler<M: ?Sized, H: CommandHandler + 'static>(mut self, handler: H) -> Self {
        self.register::<M>(Arc::new(handler));
        self
    }

    /// Register `handler` for every message carrying `tag`
    pub fn with_tag_handler<H: CommandHandler + 'static>(mut self, tag: impl Into<String>, handler: H) -> Self {
        self.register_tag(tag, Arc::new(handler));
        self
    }

    pub fn register<M: ?Sized>(&mut self, handler: Arc<dyn CommandHandler>) {
        self.by_type.insert(std::any::type_name::<M>().to_string(), handler);
    }

    pub fn register_tag(&mut self, tag: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.by_tag.insert(tag.into(), handler);
    }

    pub fn len(&self) -> usize {
        self.by_type.len() + self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.by_tag.is_empty()
    }
}

impl HandlerLocator for InMemoryHandlerLocator {
    fn locate(&self, type_name: &str, message_type: &str) -> Option<ResolvedHandler> {
        let handler = self
            .by_type
            .get(type_name)
            .or_else(|| self.by_tag.get(message_type))?;

        Some(ResolvedHandler {
            handler: Arc::clone(handler),
            method: self.inflector.method_name(type_name, message_type),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    struct CreateUser;
    struct RenameUser;

    struct UserHandler;

    #[async_trait]
    impl CommandHandler for UserHandler {
        async fn handle(&self, _ctx: TraceContext, _command: &dyn Command) -> HandlerResult {
            Ok(None)
        }
    }

    #[test]
    fn test_fault_captures_call_site() {
        let line = line!() + 1;
        let fault = HandlerFault::new("user exists").with_code(409);

        assert_eq!(fault.to_string(), "user exists");
        assert_eq!(fault.code(), 409);
        let location = fault.location().unwrap();
        assert_eq!(location.line, line);
        assert!(location.file.ends_with("handler.rs"));
    }

    #[test]
    fn test_fault_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let fault = HandlerFault::from_error(io);

        assert_eq!(fault.message(), "disk full");
        assert!(fault.source().is_some());
    }

    #[test]
    fn test_locate_by_type_then_tag() {
        let locator = InMemoryHandlerLocator::new()
            .with_handler::<CreateUser, _>(UserHandler)
            .with_tag_handler("rename_user", UserHandler);

        let resolved = locator
            .locate(std::any::type_name::<CreateUser>(), "create_user")
            .unwrap();
        assert_eq!(resolved.method, "handle");
        assert_eq!(resolved.operation_name(), "UserHandler_handle");

        assert!(locator
            .locate(std::any::type_name::<RenameUser>(), "rename_user")
            .is_some());
        assert!(locator.locate("unknown::Type", "delete_user").is_none());
    }

    #[test]
    fn test_custom_inflector() {
        let locator = InMemoryHandlerLocator::new()
            .with_inflector(HandleTypeInflector)
            .with_tag_handler("create_user", UserHandler);

        let resolved = locator.locate("any", "create_user").unwrap();
        assert_eq!(resolved.operation_name(), "UserHandler_handle_create_user");
    }
}
