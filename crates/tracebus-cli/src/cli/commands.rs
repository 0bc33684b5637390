//! CLI command definitions for tracebus
//!
//! Clap definitions for the `dispatch`, `config` and `factories` commands
//! and the functions that execute them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracebus_core::tracebus_span::{InMemoryExporter, TraceContext};
use tracebus_core::{
    build_recording, BoundaryEvent, BusError, CommandBus, CommandFactoryChain, FlushOutcome, FlushTrigger,
    InstanceFactory, ProcessUuid, TracedFault, Tracing, TracingConfig,
};

use super::output::{ConfigOutput, DispatchOutput, FactoriesOutput, FactoryOutput, FaultOutput, OutputFormat, Report};
use super::ExitCode;
use crate::demo::{self, Ledger};
use crate::error::Result;

/// tracebus CLI
///
/// Build commands through the demo factory chain, dispatch them on a
/// traced command bus and inspect the resulting spans.
#[derive(Parser, Debug)]
#[command(name = "tracebus")]
#[command(about = "Dispatch commands through a traced factory chain", long_about = None)]
#[command(version)]
pub struct TracebusCli {
    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: TracebusCommands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum TracebusCommands {
    /// Build and dispatch one command, then print its result and spans
    ///
    /// The fields `uuid`, `process_uuid` and `version` fill the matching
    /// command attributes; every other field goes into the payload.
    Dispatch {
        /// Type tag of the command, e.g. `deposit`
        #[arg(short = 't', long = "type")]
        type_tag: String,

        /// Command field as key=value. Values are read as JSON when they
        /// parse, as plain strings otherwise.
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,

        /// Dispatch without creating spans
        #[arg(long)]
        no_tracing: bool,

        /// Export each span as it ends instead of at the flush boundary
        #[arg(long)]
        immediate: bool,

        /// Export spans over OTLP/HTTP to the configured endpoint
        #[cfg(feature = "otlp")]
        #[arg(long, conflicts_with = "immediate")]
        otlp: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the tracing configuration resolved from the environment
    Config {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the factory chain in priority order
    Factories {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Parse a `key=value` field
pub fn parse_field(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// A command to build and dispatch
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    pub type_tag: String,
    pub fields: Vec<(String, Value)>,
}

impl DispatchRequest {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    /// Positional arguments in the layout of `demo::position`
    ///
    /// A fresh process uuid is generated unless one is given.
    pub fn positional_args(&self) -> Vec<Value> {
        let mut process_uuid = None;
        let mut uuid = Value::Null;
        let mut version = Value::Null;
        let mut payload = Map::new();

        for (key, value) in &self.fields {
            match key.as_str() {
                "process_uuid" => process_uuid = Some(value.clone()),
                "uuid" => uuid = value.clone(),
                "version" => version = value.clone(),
                _ => {
                    payload.insert(key.clone(), value.clone());
                }
            }
        }

        let process_uuid = process_uuid.unwrap_or_else(|| Value::String(ProcessUuid::new().to_string()));
        let payload = if payload.is_empty() {
            Value::Null
        } else {
            Value::Object(payload)
        };

        vec![Value::String(self.type_tag.clone()), process_uuid, uuid, payload, version]
    }
}

/// Demo chain, bus and flush trigger wired to one tracing setup
pub struct Session {
    chain: CommandFactoryChain,
    bus: CommandBus,
    flush: FlushTrigger,
    exporter: Option<InMemoryExporter>,
    ledger: Arc<Ledger>,
}

impl Session {
    /// Record spans in memory so they can be printed
    pub fn recording(config: &TracingConfig) -> Result<Self> {
        let telemetry = build_recording(config)?;
        Ok(Self::wire(telemetry.tracing, Some(telemetry.exporter)))
    }

    /// Export spans over OTLP/HTTP
    #[cfg(feature = "otlp")]
    pub fn otlp(config: &TracingConfig) -> Result<Self> {
        let (tracing, _provider) =
            tracebus_core::otel::TracerProviderFactory::create_tracing(config).map_err(anyhow::Error::from)?;
        Ok(Self::wire(tracing, None))
    }

    fn wire(tracing: Tracing, exporter: Option<InMemoryExporter>) -> Self {
        let ledger = Arc::new(Ledger::default());
        let locator = demo::handler_locator(Arc::clone(&ledger), &tracing);
        Self {
            chain: demo::factory_chain(),
            bus: CommandBus::new(Arc::new(locator)).with_tracing(tracing.clone()),
            flush: FlushTrigger::new(tracing),
            exporter,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Build the command and dispatch it.
    ///
    /// Factory and wiring failures are errors; a handler fault is part of
    /// the output and sets exit code 1.
    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<(DispatchOutput, ExitCode)> {
        let command = self.chain.build_from_positional(&request.positional_args())?;
        let mut output = DispatchOutput::new(command.message_type(), command.type_name(), &FlushOutcome::Skipped);

        match self.bus.dispatch(&TraceContext::root(), command.as_ref()).await {
            Ok(result) => {
                output.result = result;
                Ok((output, ExitCode::Success))
            }
            Err(BusError::Handler(fault)) => {
                output.success = false;
                output.fault = Some(FaultOutput {
                    message: fault.message().to_string(),
                    code: fault.code(),
                    location: fault.location().map(|l| l.to_string()),
                });
                Ok((output, ExitCode::HandlerFault))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Flush at process exit and attach the flush outcome and exported
    /// spans to `output`
    pub fn finish(&self, output: &mut DispatchOutput) {
        output.flush = self.flush.on_boundary(BoundaryEvent::ProcessExit).to_string();
        if let Some(exporter) = &self.exporter {
            output.spans = exporter.tree().into_roots();
        }
    }
}

/// Execute the dispatch command
pub fn execute_dispatch(
    request: DispatchRequest,
    no_tracing: bool,
    immediate: bool,
    otlp: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let mut config = TracingConfig::from_env();
    config.enabled = !no_tracing;
    if immediate {
        config.use_batch_processor = false;
    }

    let session = if otlp && config.enabled {
        otlp_session(&config)?
    } else {
        Session::recording(&config)?
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let dispatched = runtime.block_on(session.dispatch(&request));
    drop(runtime);

    let (mut output, code) = match dispatched {
        Ok(done) => done,
        Err(e) => {
            session.flush.on_boundary(BoundaryEvent::ProcessExit);
            return Err(e);
        }
    };
    session.finish(&mut output);

    output.render(format)?;
    Ok(code)
}

#[cfg(feature = "otlp")]
fn otlp_session(config: &TracingConfig) -> Result<Session> {
    Session::otlp(config)
}

#[cfg(not(feature = "otlp"))]
fn otlp_session(_config: &TracingConfig) -> Result<Session> {
    Err(crate::error::CliError::invalid_input(
        "OTLP export requires the otlp feature",
    ))
}

/// Execute the config command
pub fn execute_config(format: OutputFormat) -> Result<ExitCode> {
    let output = ConfigOutput::from_config(TracingConfig::from_env());
    output.render(format)?;
    Ok(ExitCode::Success)
}

/// Describe the demo chain
pub fn factories_output() -> FactoriesOutput {
    let chain = demo::factory_chain();
    let factories = chain
        .factories()
        .enumerate()
        .map(|(index, factory)| FactoryOutput {
            priority: index + 1,
            name: factory.name().to_string(),
            allowed_types: factory.allowed_types().iter().map(str::to_string).collect(),
        })
        .collect();

    FactoriesOutput {
        chain: chain.name().to_string(),
        factories,
    }
}

/// Execute the factories command
pub fn execute_factories(format: OutputFormat) -> Result<ExitCode> {
    factories_output().render(format)?;
    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field("amount=25").unwrap(), ("amount".to_string(), json!(25)));
        assert_eq!(parse_field("note=hello").unwrap(), ("note".to_string(), json!("hello")));
        assert_eq!(parse_field("flag=true").unwrap(), ("flag".to_string(), json!(true)));
        assert_eq!(parse_field("eq=a=b").unwrap(), ("eq".to_string(), json!("a=b")));
        assert!(parse_field("missing").is_err());
        assert!(parse_field("=1").is_err());
    }

    proptest! {
        #[test]
        fn test_parse_field_keeps_key_and_text(key in "[a-z_]{1,12}", text in "[a-zA-Z ]{0,16}") {
            let (parsed_key, value) = parse_field(&format!("{}={}", key, text)).unwrap();
            prop_assert_eq!(parsed_key, key);
            if let Value::String(s) = value {
                prop_assert_eq!(s, text);
            }
        }
    }

    #[test]
    fn test_positional_args_layout() {
        let account = "7f1b6f5e-3c1d-4d8e-9a43-2f4e1b0c9d11";
        let args = DispatchRequest::new("deposit")
            .with_field("uuid", json!(account))
            .with_field("amount", json!(10))
            .with_field("version", json!(2))
            .positional_args();

        assert_eq!(args.len(), 5);
        assert_eq!(args[0], json!("deposit"));
        assert!(args[1].is_string());
        assert_eq!(args[2], json!(account));
        assert_eq!(args[3], json!({"amount": 10}));
        assert_eq!(args[4], json!(2));
    }

    #[test]
    fn test_positional_args_without_payload() {
        let args = DispatchRequest::new("ping").positional_args();
        assert_eq!(args[2], Value::Null);
        assert_eq!(args[3], Value::Null);
    }

    #[test]
    fn test_factories_output() {
        let output = factories_output();
        assert_eq!(output.chain, "demo");
        let names: Vec<&str> = output.factories.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["accounts", "system"]);
        assert_eq!(output.factories[0].priority, 1);
        assert_eq!(output.factories[1].allowed_types, vec!["ping", "noop"]);
    }

    #[test]
    fn test_cli_parses_dispatch() {
        let cli = TracebusCli::parse_from([
            "tracebus", "dispatch", "--type", "deposit", "--field", "amount=5", "-f", "note=x", "--immediate",
        ]);
        match cli.command {
            TracebusCommands::Dispatch {
                type_tag,
                fields,
                immediate,
                no_tracing,
                format,
                ..
            } => {
                assert_eq!(type_tag, "deposit");
                assert_eq!(fields.len(), 2);
                assert!(immediate);
                assert!(!no_tracing);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
