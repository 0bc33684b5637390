//! Provider construction for the in-process recording pipeline.

use std::sync::Arc;
use tracebus_span::{InMemoryExporter, RecordingProvider, SpanExporter, TracerProvider};

use crate::config::{self, TracingConfig};
use crate::telemetry::Tracing;

/// A recording provider, the exporter behind it, and tracing state wired
/// to both.
#[derive(Debug, Clone)]
pub struct RecordingTelemetry {
    pub tracing: Tracing,
    pub provider: RecordingProvider,
    pub exporter: InMemoryExporter,
}

/// Build a recording provider exporting through `exporter`.
///
/// The configuration is only validated when tracing is enabled. With
/// tracing off an invalid setting is logged and the provider stays idle.
pub fn recording_provider(config: &TracingConfig, exporter: Arc<dyn SpanExporter>) -> config::Result<RecordingProvider> {
    match config.validate() {
        Ok(()) => {}
        Err(e) if !config.enabled => {
            tracing::warn!(error = %e, "Ignoring invalid tracing configuration, tracing is disabled");
        }
        Err(e) => return Err(e),
    }
    Ok(RecordingProvider::with_max_queue_size(
        exporter,
        config.export_mode(),
        config.max_queue_size,
    ))
}

/// Build a recording pipeline into an in-memory exporter
pub fn build_recording(config: &TracingConfig) -> config::Result<RecordingTelemetry> {
    let exporter = InMemoryExporter::new();
    let provider = recording_provider(config, Arc::new(exporter.clone()))?;
    let tracing = Tracing::from_config(config, Arc::new(provider.clone()) as Arc<dyn TracerProvider>);

    tracing::debug!(
        enabled = config.enabled,
        mode = ?config.export_mode(),
        max_queue_size = config.max_queue_size,
        "Built recording tracer provider"
    );

    Ok(RecordingTelemetry {
        tracing,
        provider,
        exporter,
    })
}
