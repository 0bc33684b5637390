//! Command dispatch with tracing
//!
//! - `CommandBus`: locates the handler and runs it through the middleware.
//! - `TracerMiddleware`: wraps a dispatch in a span, transparently.
//! - `handler`: handler trait, faults, locator and method name inflectors.

pub mod bus;
pub mod handler;
pub mod middleware;

pub use bus::{BusError, CommandBus};
pub use handler::{
    CommandHandler, FaultLocation, HandleInflector, HandleTypeInflector, HandlerFault, HandlerLocator,
    HandlerResult, InMemoryHandlerLocator, MethodNameInflector, ResolvedHandler, TracedFault,
};
pub use middleware::TracerMiddleware;
