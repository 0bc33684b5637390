//! Output formatting for the tracebus CLI
//!
//! Every report renders as pretty JSON for machines or as indented text for
//! people. Rendering goes through a writer so reports can be captured.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};
use tracebus_core::tracebus_span::{SpanRecord, Status};
use tracebus_core::{FlushOutcome, TracingConfig};

use crate::error::{CliError, Result};

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for machine processing
    Json,
}

/// Anything the CLI prints.
pub trait Report: Serialize {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()>;

    fn render_to(&self, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?;
                writeln!(out, "{}", json).map_err(anyhow::Error::from)?;
            }
            OutputFormat::Text => self.write_text(out).map_err(anyhow::Error::from)?,
        }
        Ok(())
    }

    fn render(&self, format: OutputFormat) -> Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.render_to(format, &mut lock)?;
        lock.flush().map_err(|e| CliError::Internal(e.into()))
    }
}

/// Result of a `dispatch` run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutput {
    pub message_type: String,
    pub command: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultOutput>,
    pub flush: String,
    pub spans: Vec<SpanRecord>,
}

/// A handler fault as reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct FaultOutput {
    pub message: String,
    pub code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl DispatchOutput {
    pub fn new(message_type: impl Into<String>, command: impl Into<String>, flush: &FlushOutcome) -> Self {
        Self {
            message_type: message_type.into(),
            command: command.into(),
            success: true,
            result: None,
            fault: None,
            flush: flush.to_string(),
            spans: Vec::new(),
        }
    }
}

fn status_label(status: &Status) -> String {
    match status {
        Status::Unset => "unset".to_string(),
        Status::Ok => "ok".to_string(),
        Status::Error { message } => format!("error: {}", message),
    }
}

fn write_span(out: &mut dyn Write, span: &SpanRecord, depth: usize) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    let duration = span
        .duration_ms
        .map(|ms| format!(" {}ms", ms))
        .unwrap_or_default();
    writeln!(out, "{}- {} [{}]{}", indent, span.name, status_label(&span.status), duration)?;

    let mut keys: Vec<&String> = span.attributes.keys().collect();
    keys.sort();
    for key in keys {
        writeln!(out, "{}    {} = {}", indent, key, span.attributes[key])?;
    }
    for event in &span.events {
        let mut fields: Vec<String> = event
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        fields.sort();
        writeln!(out, "{}    event {} {}", indent, event.name, fields.join(" "))?;
    }
    for child in &span.children {
        write_span(out, child, depth + 1)?;
    }
    Ok(())
}

impl Report for DispatchOutput {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Dispatched {} ({})", self.message_type, self.command)?;
        match (&self.result, &self.fault) {
            (_, Some(fault)) => {
                writeln!(out, "Fault: {} (code {})", fault.message, fault.code)?;
                if let Some(location) = &fault.location {
                    writeln!(out, "  at {}", location)?;
                }
            }
            (Some(result), None) => writeln!(out, "Result: {}", result)?,
            (None, None) => writeln!(out, "Result: none")?,
        }
        writeln!(out, "Flush: {}", self.flush)?;

        if self.spans.is_empty() {
            writeln!(out, "Spans: none")?;
        } else {
            writeln!(out, "Spans:")?;
            for span in &self.spans {
                write_span(out, span, 1)?;
            }
        }
        Ok(())
    }
}

/// Resolved tracing configuration
#[derive(Debug, Clone, Serialize)]
pub struct ConfigOutput {
    #[serde(flatten)]
    pub config: TracingConfig,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConfigOutput {
    pub fn from_config(config: TracingConfig) -> Self {
        let error = config.validate().err().map(|e| e.to_string());
        Self {
            config,
            valid: error.is_none(),
            error,
        }
    }
}

impl Report for ConfigOutput {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        let c = &self.config;
        writeln!(out, "enabled              {}", c.enabled)?;
        writeln!(out, "service_name         {}", c.service_name)?;
        writeln!(out, "service_version      {}", c.service_version)?;
        writeln!(out, "environment          {}", c.environment)?;
        writeln!(out, "otlp_endpoint        {}", c.otlp_endpoint)?;
        writeln!(out, "use_batch_processor  {}", c.use_batch_processor)?;
        writeln!(out, "max_queue_size       {}", c.max_queue_size)?;
        writeln!(out, "instrumentation_name {}", c.instrumentation_name)?;
        if let Some(error) = &self.error {
            writeln!(out, "invalid: {}", error)?;
        }
        Ok(())
    }
}

/// One factory of the chain
#[derive(Debug, Clone, Serialize)]
pub struct FactoryOutput {
    pub priority: usize,
    pub name: String,
    pub allowed_types: Vec<String>,
}

/// The chain in priority order
#[derive(Debug, Clone, Serialize)]
pub struct FactoriesOutput {
    pub chain: String,
    pub factories: Vec<FactoryOutput>,
}

impl Report for FactoriesOutput {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Chain {}", self.chain)?;
        for factory in &self.factories {
            let allowed = if factory.allowed_types.is_empty() {
                "*".to_string()
            } else {
                factory.allowed_types.join(", ")
            };
            writeln!(out, "  {}. {} [{}]", factory.priority, factory.name, allowed)?;
        }
        Ok(())
    }
}
