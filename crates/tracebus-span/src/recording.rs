//! In-memory implementation of the tracer port.
//!
//! `RecordingProvider` hands ended spans to a `SpanExporter`, either as soon
//! as they end (`ExportMode::Immediate`) or when the queue is flushed or
//! full (`ExportMode::Batch`). `InMemoryExporter` keeps exported spans for
//! inspection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::SpanContext;
use crate::span::{AttributeValue, Attributes, SpanRecord, Status};
use crate::tracer::{FlushError, Span, SpanOptions, Tracer, TracerProvider};
use crate::tree::SpanTree;

/// Default number of queued spans that triggers an export in batch mode.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2048;

/// Receives batches of ended spans.
pub trait SpanExporter: Send + Sync {
    fn export(&self, batch: Vec<SpanRecord>) -> Result<(), FlushError>;

    fn shutdown(&self) {}
}

/// When ended spans are handed to the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// Queue until flushed or the queue is full
    #[default]
    Batch,
    /// Export each span as it ends
    Immediate,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exporter that keeps every exported span in memory.
#[derive(Clone, Default)]
pub struct InMemoryExporter {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl fmt::Debug for InMemoryExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryExporter")
            .field("spans", &lock(&self.spans).len())
            .finish()
    }
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flat copy of the exported spans, in export order.
    pub fn finished_spans(&self) -> Vec<SpanRecord> {
        lock(&self.spans).clone()
    }

    pub fn span_named(&self, name: &str) -> Option<SpanRecord> {
        lock(&self.spans).iter().find(|s| s.name == name).cloned()
    }

    /// Exported spans nested into trees.
    pub fn tree(&self) -> SpanTree {
        SpanTree::assemble(self.finished_spans())
    }

    pub fn len(&self) -> usize {
        lock(&self.spans).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.spans).is_empty()
    }

    pub fn reset(&self) {
        lock(&self.spans).clear();
    }
}

impl SpanExporter for InMemoryExporter {
    fn export(&self, batch: Vec<SpanRecord>) -> Result<(), FlushError> {
        lock(&self.spans).extend(batch);
        Ok(())
    }
}

struct Pipeline {
    mode: ExportMode,
    max_queue_size: usize,
    queue: Mutex<Vec<SpanRecord>>,
    exporter: Arc<dyn SpanExporter>,
    shut_down: AtomicBool,
}

impl Pipeline {
    fn on_end(&self, record: SpanRecord) {
        if self.shut_down.load(Ordering::SeqCst) {
            tracing::debug!(span = %record.name, "Provider shut down, dropping span");
            return;
        }

        match self.mode {
            ExportMode::Immediate => {
                if let Err(e) = self.exporter.export(vec![record]) {
                    tracing::warn!(error = %e, "Failed to export span");
                }
            }
            ExportMode::Batch => {
                let full = {
                    let mut queue = lock(&self.queue);
                    queue.push(record);
                    queue.len() >= self.max_queue_size
                };
                if full {
                    if let Err(e) = self.flush() {
                        tracing::warn!(error = %e, "Failed to export full span queue");
                    }
                }
            }
        }
    }

    fn flush(&self) -> Result<(), FlushError> {
        let batch = std::mem::take(&mut *lock(&self.queue));
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!(spans = batch.len(), "Exporting queued spans");
        self.exporter.export(batch)
    }
}

/// Provider exporting spans through a `SpanExporter`.
#[derive(Clone)]
pub struct RecordingProvider {
    pipeline: Arc<Pipeline>,
}

impl fmt::Debug for RecordingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingProvider")
            .field("mode", &self.pipeline.mode)
            .field("max_queue_size", &self.pipeline.max_queue_size)
            .field("queued", &self.queued_len())
            .finish()
    }
}

impl RecordingProvider {
    pub fn new(exporter: Arc<dyn SpanExporter>, mode: ExportMode) -> Self {
        Self::with_max_queue_size(exporter, mode, DEFAULT_MAX_QUEUE_SIZE)
    }

    pub fn with_max_queue_size(
        exporter: Arc<dyn SpanExporter>,
        mode: ExportMode,
        max_queue_size: usize,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                mode,
                max_queue_size: max_queue_size.max(1),
                queue: Mutex::new(Vec::new()),
                exporter,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Provider exporting into a fresh `InMemoryExporter`, returned alongside.
    pub fn in_memory(mode: ExportMode) -> (Self, InMemoryExporter) {
        let exporter = InMemoryExporter::new();
        (Self::new(Arc::new(exporter.clone()), mode), exporter)
    }

    pub fn mode(&self) -> ExportMode {
        self.pipeline.mode
    }

    /// Spans ended but not yet exported.
    pub fn queued_len(&self) -> usize {
        lock(&self.pipeline.queue).len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.pipeline.shut_down.load(Ordering::SeqCst)
    }
}

impl TracerProvider for RecordingProvider {
    fn tracer(&self, instrumentation_name: &str) -> Arc<dyn Tracer> {
        Arc::new(RecordingTracer {
            pipeline: Arc::clone(&self.pipeline),
            instrumentation_name: instrumentation_name.to_string(),
        })
    }

    fn force_flush(&self) -> Result<(), FlushError> {
        if self.is_shut_down() {
            return Err(FlushError::ShutDown);
        }
        self.pipeline.flush()
    }

    fn shutdown(&self) -> Result<(), FlushError> {
        if self.pipeline.shut_down.swap(true, Ordering::SeqCst) {
            return Err(FlushError::ShutDown);
        }
        let result = self.pipeline.flush();
        self.pipeline.exporter.shutdown();
        result
    }
}

/// Tracer producing `RecordingSpan`s.
pub struct RecordingTracer {
    pipeline: Arc<Pipeline>,
    instrumentation_name: String,
}

impl RecordingTracer {
    pub fn instrumentation_name(&self) -> &str {
        &self.instrumentation_name
    }
}

impl Tracer for RecordingTracer {
    fn start_span(
        &self,
        name: &str,
        options: SpanOptions,
        parent: Option<&SpanContext>,
    ) -> Box<dyn Span> {
        let mut record = SpanRecord::start(name, options.kind.unwrap_or_default(), parent);
        for (key, value) in options.attributes {
            record.set_attribute(key, value);
        }

        tracing::trace!(
            span = %record.name,
            span_id = %record.span_id,
            scope = %self.instrumentation_name,
            "Span started"
        );

        Box::new(RecordingSpan {
            record,
            pipeline: Arc::clone(&self.pipeline),
            ended: false,
        })
    }
}

/// Span backed by a `SpanRecord`. Exported once, when it ends.
///
/// A span dropped without being ended is ended on drop.
pub struct RecordingSpan {
    record: SpanRecord,
    pipeline: Arc<Pipeline>,
    ended: bool,
}

impl Span for RecordingSpan {
    fn context(&self) -> SpanContext {
        self.record.context()
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.record.set_attribute(key, value);
    }

    fn add_event(&mut self, name: &str, attributes: Attributes) {
        self.record.add_event(name, attributes);
    }

    fn record_exception(&mut self, fault: &dyn std::error::Error) {
        self.record.record_exception(fault);
    }

    fn set_status(&mut self, status: Status) {
        self.record.set_status(status);
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.record.end();
        self.pipeline.on_end(self.record.clone());
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

impl Drop for RecordingSpan {
    fn drop(&mut self) {
        if !self.ended {
            tracing::debug!(span = %self.record.name, "Span dropped before end");
            self.end();
        }
    }
}
