//! CLI module for tracebus
//!
//! Dispatches demo commands on a traced bus, prints the resolved tracing
//! configuration and lists the factory chain.

pub mod commands;
pub mod output;

pub use commands::{DispatchRequest, Session, TracebusCli, TracebusCommands};
pub use output::{OutputFormat, Report};

use crate::error::{CliError, Result};

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// The handler returned a fault
    HandlerFault = 1,
    /// No factory accepts the type tag
    FactoryNotFound = 2,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Determine the exit code for a failed run
    pub fn from_error(error: &CliError) -> Self {
        match error {
            CliError::Factory(e) if e.is_not_found() => ExitCode::FactoryNotFound,
            e if e.is_user_error() => ExitCode::InvalidInput,
            _ => ExitCode::InternalError,
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub fn run(cli: TracebusCli) -> Result<ExitCode> {
    match cli.command {
        TracebusCommands::Dispatch {
            type_tag,
            fields,
            no_tracing,
            immediate,
            #[cfg(feature = "otlp")]
            otlp,
            format,
        } => {
            #[cfg(not(feature = "otlp"))]
            let otlp = false;
            let request = DispatchRequest { type_tag, fields };
            commands::execute_dispatch(request, no_tracing, immediate, otlp, format)
        }
        TracebusCommands::Config { format } => commands::execute_config(format),
        TracebusCommands::Factories { format } => commands::execute_factories(format),
    }
}
