//! tracebus CLI
//!
//! Dispatch commands through a traced factory chain and print the spans
//! they produce.
//!
//! # Usage
//!
//! ```bash
//! # Dispatch a deposit and print the result and span tree
//! tracebus dispatch --type deposit --field amount=250
//!
//! # Same, exporting each span as it ends
//! tracebus dispatch --type withdraw --field amount=10 --immediate --format json
//!
//! # Print the tracing configuration resolved from the environment
//! tracebus config --format json
//!
//! # List the factory chain in priority order
//! tracebus factories
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: The handler returned a fault
//! - 2: No factory accepts the type tag
//! - 3: Invalid input or arguments
//! - 10: Internal error

use clap::Parser;
use tracebus_cli::{run_cli, TracebusCli};

fn main() {
    let cli = TracebusCli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let exit_code = run_cli(cli);
    std::process::exit(exit_code.into());
}
