//! Tracing primitives for dispatch-adjacent components
//!
//! - `Tracing`: enable flag, tracer, helper and provider, plus the
//!   start/finish/record primitives built on them.
//! - `Scope` / `SpanGuard`: explicit activation and guaranteed cleanup.
//! - `TracingHelper`: operation naming and span annotation.
//! - `keys`: attribute keys and component tags.

pub mod helper;
pub mod keys;
pub mod lifecycle;
pub mod scope;

pub use helper::{process_span_options, short_name, OperationOptions, TracingHelper};
pub use lifecycle::{Tracing, DEFAULT_OWNER};
pub use scope::{finish_span, Scope, SpanGuard};
