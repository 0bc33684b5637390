//! Command/query factory resolution and traced dispatch.
//!
//! This crate resolves typed commands and queries through a chain of
//! factories and wraps their dispatch in tracing spans.
//!
//! # Data Flow
//!
//! ```text
//! caller
//!   └─ FactoryChain::build_from_positional / build_from_dto   (typed command)
//!       └─ CommandBus::dispatch
//!           └─ TracerMiddleware::execute                       (dispatch span)
//!               └─ CommandHandler::handle                      (child spans)
//! FlushTrigger::on_boundary                                    (end of request / process)
//! ```
//!
//! # Usage
//!
//! 1. Register factories on a `CommandFactoryChain` in priority order.
//! 2. Register handlers on an `InMemoryHandlerLocator`.
//! 3. Build `Tracing` from a `TracingConfig` with `provider::build_recording`
//!    (or `otel::TracerProviderFactory` with the `otlp` feature) and hand it
//!    to the `CommandBus` and a `FlushTrigger`.

pub mod config;
pub mod dispatch;
pub mod factory;
pub mod flush;
pub mod message;
#[cfg(feature = "otlp")]
pub mod otel;
pub mod provider;
pub mod telemetry;

pub use config::{ConfigError, TracingConfig, TracingConfigBuilder};
pub use dispatch::{
    BusError, CommandBus, CommandHandler, HandlerFault, HandlerLocator, HandlerResult, InMemoryHandlerLocator,
    ResolvedHandler, TracedFault, TracerMiddleware,
};
pub use factory::{
    AllowedTypes, CommandFactoryChain, FactoryChain, FactoryError, FactoryResult, InstanceFactory, PositionalArgs,
    QueryFactoryChain,
};
pub use flush::{BoundaryEvent, FlushOutcome, FlushTrigger};
pub use message::{Command, CommandData, Dto, Message, Payload, ProcessUuid, Query};
pub use provider::{build_recording, RecordingTelemetry};
pub use telemetry::{OperationOptions, Scope, SpanGuard, Tracing};

pub use tracebus_span;
