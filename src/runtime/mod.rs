//! Runtime for processing inputs through task chains.

pub mod executor;
pub mod orchestrator;

pub use executor::{TaskChainExecutor, Unpacker};
pub use orchestrator::{InputOutcome, Orchestrator, OrchestratorConfig, RunReport};
