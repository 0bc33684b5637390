//! Span naming and annotation helpers.

use std::sync::Arc;
use tracebus_span::{AttributeValue, Attributes, Span, SpanKind, SpanOptions, Tracer};

/// Options accepted when starting an operation span.
///
/// `prefix_with_caller` decides whether the operation name gets the
/// caller's short type name prepended; unset means yes. It is consumed by
/// `process_span_options` and never reaches the tracer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationOptions {
    pub prefix_with_caller: Option<bool>,
    pub span: SpanOptions,
}

impl OperationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the operation name exactly as given.
    pub fn without_caller_prefix(mut self) -> Self {
        self.prefix_with_caller = Some(false);
        self
    }

    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.span = self.span.with_kind(kind);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.span = self.span.with_attribute(key, value);
        self
    }
}

impl From<SpanOptions> for OperationOptions {
    fn from(span: SpanOptions) -> Self {
        Self {
            prefix_with_caller: None,
            span,
        }
    }
}

/// Unqualified name of a type path.
///
/// Generic arguments are dropped, then everything up to the last `::`
/// (or `\`) separator. A name without separators is returned whole.
///
/// ```
/// use tracebus_core::telemetry::short_name;
///
/// assert_eq!(short_name("app::handlers::CreateUserHandler"), "CreateUserHandler");
/// assert_eq!(short_name("Vec<alloc::string::String>"), "Vec");
/// assert_eq!(short_name(""), "");
/// ```
pub fn short_name(type_name: &str) -> &str {
    let base = match type_name.find('<') {
        Some(index) => &type_name[..index],
        None => type_name,
    };
    let after_path = match base.rfind("::") {
        Some(index) => &base[index + 2..],
        None => base,
    };
    match after_path.rfind('\\') {
        Some(index) => &after_path[index + 1..],
        None => after_path,
    }
}

/// Resolve the final operation name and the options handed to the tracer.
pub fn process_span_options(caller: &str, operation: &str, options: OperationOptions) -> (String, SpanOptions) {
    let name = if options.prefix_with_caller.unwrap_or(true) {
        format!("{}_{}", short_name(caller), operation)
    } else {
        operation.to_string()
    };
    (name, options.span)
}

/// Attribute and event adapter bound to a tracer.
///
/// Only exists alongside a tracer: `Tracing` creates one whenever a tracer
/// is set and drops it when the tracer is cleared.
#[derive(Clone)]
pub struct TracingHelper {
    tracer: Arc<dyn Tracer>,
}

impl std::fmt::Debug for TracingHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingHelper").finish_non_exhaustive()
    }
}

impl TracingHelper {
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer }
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    pub fn set_attribute(&self, span: &mut dyn Span, key: &str, value: impl Into<AttributeValue>) -> &Self {
        span.set_attribute(key, value.into());
        self
    }

    pub fn set_attributes(&self, span: &mut dyn Span, attributes: Attributes) -> &Self {
        for (key, value) in attributes {
            span.set_attribute(&key, value);
        }
        self
    }

    pub fn add_event(&self, span: &mut dyn Span, name: &str, attributes: Attributes) -> &Self {
        span.add_event(name, attributes);
        self
    }

    pub fn process_span_options(&self, caller: &str, operation: &str, options: OperationOptions) -> (String, SpanOptions) {
        process_span_options(caller, operation, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tracebus_span::{ExportMode, RecordingProvider, TracerProvider};

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("A\\B\\C"), "C");
        assert_eq!(short_name("C"), "C");
        assert_eq!(short_name(""), "");
        assert_eq!(short_name("crate::dispatch::Handler"), "Handler");
        assert_eq!(short_name("crate::Wrapper<crate::Inner>"), "Wrapper");
    }

    #[test]
    fn test_process_span_options_prefixes_by_default() {
        let (name, options) = process_span_options("Ns\\Handler", "op", OperationOptions::new());
        assert_eq!(name, "Handler_op");
        assert_eq!(options, SpanOptions::new());
    }

    #[test]
    fn test_process_span_options_suppressed() {
        let options = OperationOptions::new()
            .without_caller_prefix()
            .with_kind(SpanKind::Consumer)
            .with_attribute("k", "v");

        let (name, span_options) = process_span_options("Ns\\Handler", "op", options);
        assert_eq!(name, "op");
        assert_eq!(span_options.kind, Some(SpanKind::Consumer));
        assert_eq!(span_options.attributes.len(), 1);
    }

    #[test]
    fn test_explicit_prefix_flag() {
        let options = OperationOptions {
            prefix_with_caller: Some(true),
            ..OperationOptions::default()
        };
        let (name, _) = process_span_options("app::Saga", "step", options);
        assert_eq!(name, "Saga_step");
    }

    #[test]
    fn test_helper_annotates_span() {
        let (provider, exporter) = RecordingProvider::in_memory(ExportMode::Immediate);
        let helper = TracingHelper::new(provider.tracer("test"));

        let mut span = helper.tracer().start_span("work", SpanOptions::new(), None);
        helper
            .set_attribute(&mut *span, "component", "task")
            .add_event(&mut *span, "started", vec![("n".to_string(), 1i64.into())]);
        span.end();

        let record = exporter.span_named("work").unwrap();
        assert_eq!(record.attribute("component"), Some(&AttributeValue::from("task")));
        assert!(record.event("started").is_some());
    }

    proptest! {
        #[test]
        fn prop_short_name_is_last_segment(
            segments in prop::collection::vec("[a-z_]{1,8}", 0..4),
            last in "[A-Za-z_][A-Za-z0-9_]{0,12}",
        ) {
            let mut path = segments.join("::");
            if !path.is_empty() {
                path.push_str("::");
            }
            path.push_str(&last);
            prop_assert_eq!(short_name(&path), last.as_str());

            let backslashed = path.replace("::", "\\");
            prop_assert_eq!(short_name(&backslashed), last.as_str());
        }
    }
}
