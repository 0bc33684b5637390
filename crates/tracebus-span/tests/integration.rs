//! Integration tests for the recording tracer
//!
//! Covers a trace crossing a process boundary through propagation headers
//! and being reassembled from the exporter.

use std::collections::HashMap;
use tracebus_span::{
    extract, inject, ExportMode, RecordingProvider, SpanOptions, SpanTree, Status, TraceContext,
    TracerProvider,
};

#[test]
fn test_trace_survives_propagation() {
    let (provider, exporter) = RecordingProvider::in_memory(ExportMode::Batch);
    let tracer = provider.tracer("integration");

    let mut outer = tracer.start_span("api_request", SpanOptions::new(), None);
    let ctx = TraceContext::root().with_active(outer.context());

    // Cross the boundary
    let mut headers = HashMap::new();
    inject(&ctx, &mut headers);
    let remote_ctx = extract(&headers);

    let mut inner = tracer.start_span("worker_job", SpanOptions::new(), remote_ctx.active_span());
    inner.set_status(Status::Ok);
    inner.end();
    outer.end();

    provider.force_flush().unwrap();

    let tree = SpanTree::assemble(exporter.finished_spans());
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.len(), 2);

    let root = &tree.roots()[0];
    assert_eq!(root.name, "api_request");
    assert_eq!(root.children[0].name, "worker_job");
    assert_eq!(root.children[0].trace_id, root.trace_id);
    assert_eq!(root.children[0].status, Status::Ok);
}

#[test]
fn test_detached_siblings_share_parent() {
    let (provider, exporter) = RecordingProvider::in_memory(ExportMode::Immediate);
    let tracer = provider.tracer("integration");

    let mut parent = tracer.start_span("fan_out", SpanOptions::new(), None);
    let parent_ctx = parent.context();

    let mut siblings: Vec<_> = (0..3)
        .map(|i| tracer.start_span(&format!("task_{}", i), SpanOptions::new(), Some(&parent_ctx)))
        .collect();
    for sibling in siblings.iter_mut() {
        sibling.end();
    }
    parent.end();

    let tree = exporter.tree();
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.roots()[0].children.len(), 3);
}
