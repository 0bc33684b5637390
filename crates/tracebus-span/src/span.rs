//! Span record types for traced units of work.
//!
//! Defines `SpanRecord`, `SpanKind`, `Status` and the scalar
//! `AttributeValue` used for span attributes and event fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::context::SpanContext;

/// Scalar value stored on a span attribute or event field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::Int(i64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

/// Ordered list of attribute key/value pairs.
pub type Attributes = Vec<(String, AttributeValue)>;

/// Role of a span in the trace, mirroring the OpenTelemetry span kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    #[default]
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Status {
    #[default]
    Unset,
    Ok,
    Error { message: String },
}

impl Status {
    pub fn error(message: impl Into<String>) -> Self {
        Status::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }

    /// Whether `next` may replace `self`.
    ///
    /// `Ok` is final, `Unset` never overrides a set status.
    fn accepts(&self, next: &Status) -> bool {
        match (self, next) {
            (Status::Ok, _) => false,
            (_, Status::Unset) => false,
            _ => true,
        }
    }
}

/// A timestamped annotation recorded on a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl SpanEvent {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            attributes: attributes.into_iter().collect(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// A single span in a trace tree.
///
/// Spans are causally ordered via `parent_span_id` and share the
/// `trace_id` of their root. Records are JSON-serializable without loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRecord {
    pub span_id: Uuid,
    pub trace_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<Uuid>,
    pub name: String,
    pub kind: SpanKind,
    pub status: Status,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub attributes: HashMap<String, AttributeValue>,
    pub events: Vec<SpanEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SpanRecord>,
}

impl SpanRecord {
    /// Start a new span, either as a root or as a child of `parent`.
    pub fn start(name: impl Into<String>, kind: SpanKind, parent: Option<&SpanContext>) -> Self {
        let (trace_id, parent_span_id) = match parent {
            Some(parent) => (parent.trace_id, Some(parent.span_id)),
            None => (Uuid::new_v4(), None),
        };

        Self {
            span_id: Uuid::new_v4(),
            trace_id,
            parent_span_id,
            name: name.into(),
            kind,
            status: Status::Unset,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            attributes: HashMap::new(),
            events: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn context(&self) -> SpanContext {
        SpanContext {
            trace_id: self.trace_id,
            span_id: self.span_id,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn add_event(&mut self, name: impl Into<String>, attributes: Attributes) {
        self.events.push(SpanEvent::new(name, attributes));
    }

    pub fn event(&self, name: &str) -> Option<&SpanEvent> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Attach an `exception` event describing `fault` and its sources.
    pub fn record_exception(&mut self, fault: &dyn std::error::Error) {
        let mut attributes: Attributes = vec![
            ("exception.type".to_string(), exception_type(fault).into()),
            ("exception.message".to_string(), fault.to_string().into()),
        ];

        let mut causes = Vec::new();
        let mut source = fault.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        if !causes.is_empty() {
            attributes.push(("exception.cause".to_string(), causes.join(": ").into()));
        }

        self.add_event("exception", attributes);
    }

    pub fn set_status(&mut self, status: Status) {
        if self.status.accepts(&status) {
            self.status = status;
        }
    }

    /// Mark the span as ended. Ending an ended span does nothing.
    pub fn end(&mut self) {
        if self.is_ended() {
            return;
        }
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }

    pub fn add_child(&mut self, child: SpanRecord) {
        self.children.push(child);
    }
}

/// Best-effort type label for an error, taken from its `Debug` output.
fn exception_type(fault: &dyn std::error::Error) -> String {
    let debug = format!("{:?}", fault);
    debug
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("Error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    #[derive(Debug, thiserror::Error)]
    #[error("write failed")]
    struct WriteFailed(#[source] DiskFull);

    #[test]
    fn test_root_span_gets_fresh_trace() {
        let a = SpanRecord::start("a", SpanKind::Internal, None);
        let b = SpanRecord::start("b", SpanKind::Internal, None);

        assert_ne!(a.trace_id, b.trace_id);
        assert!(a.parent_span_id.is_none());
        assert_eq!(a.status, Status::Unset);
        assert!(!a.is_ended());
    }

    #[test]
    fn test_child_span_inherits_trace() {
        let parent = SpanRecord::start("parent", SpanKind::Server, None);
        let child = SpanRecord::start("child", SpanKind::Internal, Some(&parent.context()));

        assert_eq!(child.trace_id, parent.trace_id);
        assert_eq!(child.parent_span_id, Some(parent.span_id));
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut span = SpanRecord::start("op", SpanKind::Internal, None);
        span.end();
        let first = span.ended_at;
        span.end();

        assert_eq!(span.ended_at, first);
        assert!(span.duration_ms.is_some());
    }

    #[test]
    fn test_status_precedence() {
        let mut span = SpanRecord::start("op", SpanKind::Internal, None);
        span.set_status(Status::error("first"));
        span.set_status(Status::Unset);
        assert_eq!(span.status, Status::error("first"));

        span.set_status(Status::error("second"));
        assert_eq!(span.status, Status::error("second"));

        span.set_status(Status::Ok);
        span.set_status(Status::error("late"));
        assert_eq!(span.status, Status::Ok);
    }

    #[test]
    fn test_record_exception_with_sources() {
        let mut span = SpanRecord::start("op", SpanKind::Internal, None);
        span.record_exception(&WriteFailed(DiskFull));

        let event = span.event("exception").unwrap();
        assert_eq!(
            event.attribute("exception.message"),
            Some(&AttributeValue::from("write failed"))
        );
        assert_eq!(
            event.attribute("exception.type"),
            Some(&AttributeValue::from("WriteFailed"))
        );
        assert_eq!(
            event.attribute("exception.cause"),
            Some(&AttributeValue::from("disk full"))
        );
    }

    #[test]
    fn test_json_serialization_roundtrip() {
        let mut span = SpanRecord::start("command_bus", SpanKind::Internal, None);
        span.set_attribute("component", "command_bus");
        span.set_attribute("attempt", 2_i64);
        let mut child = SpanRecord::start("handler", SpanKind::Internal, Some(&span.context()));
        child.add_event("command.error", vec![("code".to_string(), 42_i64.into())]);
        child.set_status(Status::error("boom"));
        child.end();
        span.add_child(child);
        span.set_status(Status::Ok);
        span.end();

        let json = serde_json::to_string(&span).unwrap();
        let restored: SpanRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.span_id, span.span_id);
        assert_eq!(restored.status, Status::Ok);
        assert_eq!(restored.attribute("attempt"), Some(&AttributeValue::Int(2)));
        assert_eq!(restored.children.len(), 1);
        assert_eq!(restored.children[0].status, Status::error("boom"));
    }
}
