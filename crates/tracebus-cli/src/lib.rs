//! tracebus command-line driver
//!
//! Wires a demo bounded context (an account ledger plus system commands)
//! onto `tracebus-core`: commands are built through a factory chain,
//! dispatched on a traced `CommandBus`, and the exported spans are printed
//! after the process-exit flush.
//!
//! ## CLI Usage
//!
//! ```bash
//! tracebus dispatch --type open_account --field amount=100
//! tracebus dispatch --type withdraw --field amount=5 --format json
//! tracebus config
//! tracebus factories --format json
//! ```

pub mod cli;
pub mod demo;
pub mod error;

pub use cli::{ExitCode, OutputFormat, TracebusCli};
pub use error::CliError;

/// Run the CLI and map failures to exit codes
///
/// ```rust,no_run
/// use clap::Parser;
/// use tracebus_cli::{run_cli, TracebusCli};
///
/// let cli = TracebusCli::parse();
/// let exit_code = run_cli(cli);
/// std::process::exit(exit_code.into());
/// ```
pub fn run_cli(cli: TracebusCli) -> ExitCode {
    match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            let code = ExitCode::from_error(&e);
            if code == ExitCode::InternalError {
                tracing::error!(error = %e, "tracebus run failed");
            }
            eprintln!("Error: {}", e);
            code
        }
    }
}
