//! Span tree assembly for exported span records.
//!
//! Exporters receive flat span records in end order (children before
//! parents). `SpanTree` nests them back under their parents so a whole
//! dispatch can be inspected as one hierarchy.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::span::SpanRecord;

/// Nested view over a set of exported spans.
#[derive(Debug, Clone, Default)]
pub struct SpanTree {
    roots: Vec<SpanRecord>,
}

impl SpanTree {
    /// Nest `records` under their parents.
    ///
    /// - Records whose parent is not part of the set stay roots.
    /// - Siblings and roots are ordered by start time.
    pub fn assemble(records: Vec<SpanRecord>) -> Self {
        let ids: HashSet<Uuid> = records.iter().map(|r| r.span_id).collect();
        let mut by_parent: HashMap<Uuid, Vec<SpanRecord>> = HashMap::new();
        let mut roots = Vec::new();

        for record in records {
            match record.parent_span_id {
                Some(parent) if ids.contains(&parent) && parent != record.span_id => {
                    by_parent.entry(parent).or_default().push(record)
                }
                _ => roots.push(record),
            }
        }

        let mut roots: Vec<SpanRecord> = roots
            .into_iter()
            .map(|root| attach_children(root, &mut by_parent))
            .collect();
        roots.sort_by_key(|r| r.started_at);

        Self { roots }
    }

    pub fn roots(&self) -> &[SpanRecord] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<SpanRecord> {
        self.roots
    }

    /// Roots belonging to the given trace.
    pub fn trace(&self, trace_id: Uuid) -> Vec<&SpanRecord> {
        self.roots.iter().filter(|r| r.trace_id == trace_id).collect()
    }

    /// Total number of spans in the tree.
    pub fn len(&self) -> usize {
        fn count(span: &SpanRecord) -> usize {
            1 + span.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn attach_children(mut span: SpanRecord, by_parent: &mut HashMap<Uuid, Vec<SpanRecord>>) -> SpanRecord {
    if let Some(children) = by_parent.remove(&span.span_id) {
        let mut children: Vec<SpanRecord> = children
            .into_iter()
            .map(|child| attach_children(child, by_parent))
            .collect();
        children.sort_by_key(|c| c.started_at);
        span.children.extend(children);
    }
    span
}
