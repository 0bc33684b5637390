//! Flush on process and request boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::telemetry::Tracing;

/// A boundary after which queued spans should be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryEvent {
    /// A request or command has been answered
    RequestEnd,
    /// The process is about to exit. The provider is shut down after flushing.
    ProcessExit,
}

/// What a boundary flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Tracing disabled or no provider wired
    Skipped,
    Flushed,
    /// The provider reported a failure. Never propagated as an error.
    Failed(String),
}

impl FlushOutcome {
    /// Skipped and flushed both count as success
    pub fn is_success(&self) -> bool {
        !matches!(self, FlushOutcome::Failed(_))
    }
}

impl fmt::Display for FlushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushOutcome::Skipped => f.write_str("skipped"),
            FlushOutcome::Flushed => f.write_str("flushed"),
            FlushOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Forces queued spans out at boundaries.
#[derive(Debug, Clone)]
pub struct FlushTrigger {
    tracing: Tracing,
}

impl FlushTrigger {
    pub fn new(tracing: Tracing) -> Self {
        Self { tracing }
    }

    pub fn tracing(&self) -> &Tracing {
        &self.tracing
    }

    /// Flush for `event`. Blocks until the provider has handed queued spans
    /// to its exporter.
    pub fn on_boundary(&self, event: BoundaryEvent) -> FlushOutcome {
        let Some(provider) = self.tracing.flush_target() else {
            return FlushOutcome::Skipped;
        };

        let result = match event {
            BoundaryEvent::RequestEnd => provider.force_flush(),
            BoundaryEvent::ProcessExit => {
                let flushed = provider.force_flush();
                let shut_down = provider.shutdown();
                flushed.and(shut_down)
            }
        };

        match result {
            Ok(()) => {
                tracing::debug!(event = ?event, "Flushed spans");
                FlushOutcome::Flushed
            }
            Err(e) => {
                tracing::warn!(event = ?event, error = %e, "Failed to flush spans");
                FlushOutcome::Failed(e.to_string())
            }
        }
    }
}
