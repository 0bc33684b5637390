//! Span types and the tracer port for tracebus dispatch instrumentation.
//!
//! This crate provides the pieces shared by everything that traces a
//! command or query dispatch:
//!
//! - `SpanRecord`, `Status`, `SpanKind`: the recorded shape of a span.
//! - `TraceContext`: the active span, passed explicitly instead of being
//!   held in ambient thread-local state.
//! - `Tracer`, `Span`, `TracerProvider`: the port instrumented components
//!   depend on.
//! - `RecordingProvider` + `InMemoryExporter`: an in-process
//!   implementation of the port with batch or immediate export.
//!
//! # Span Hierarchy
//!
//! ```text
//! Caller (remote, via propagation headers)
//!   └─ command_bus span (one per dispatch)
//!       └─ handler spans (started from the TraceContext passed to the handler)
//! ```

pub mod context;
pub mod propagation;
pub mod recording;
pub mod span;
pub mod tracer;
pub mod tree;

pub use context::{SpanContext, TraceContext};
pub use propagation::{extract, inject, Extractor, Injector};
pub use recording::{ExportMode, InMemoryExporter, RecordingProvider, SpanExporter};
pub use span::{AttributeValue, Attributes, SpanEvent, SpanKind, SpanRecord, Status};
pub use tracer::{FlushError, Span, SpanOptions, Tracer, TracerProvider};
pub use tree::SpanTree;
