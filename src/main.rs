//! petrun - Entry Point
//!
//! Resolves the command line, runs the signal chain over every input and
//! exits non-zero unless every input succeeded.

use petrun::{
    CmdLineResolver, ConfigError, Error, InputOutcome, Orchestrator, OrchestratorConfig, SignalSummaryTask,
    StaticTaskRegistry,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("petrun=info")),
        )
        .init();

    let mut registry = StaticTaskRegistry::new();
    registry.register(SignalSummaryTask::NAME, || Box::new(SignalSummaryTask::new()));

    let orchestrator = Orchestrator::new(OrchestratorConfig::default(), CmdLineResolver::new(), registry);
    let args: Vec<String> = std::env::args().collect();

    match orchestrator.run(&args) {
        Ok(report) => {
            for (seq, outcome) in report.outcomes.iter().enumerate() {
                match outcome {
                    InputOutcome::Succeeded => println!("input {seq}: ok"),
                    InputOutcome::Failed(e) => println!("input {seq}: failed: {}", error_chain(e)),
                    InputOutcome::Skipped => println!("input {seq}: skipped"),
                }
            }
            if report.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(Error::Config(ConfigError::Usage(text))) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(Error::Config(ConfigError::Arguments(usage))) => {
            eprintln!("{usage}");
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!(error = %error_chain(&e), "run aborted");
            ExitCode::FAILURE
        }
    }
}

/// Error message followed by its sources.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
