//! Data structures shared by the runtime and tasks.

pub mod run_options;
pub mod signal;

pub use run_options::{EventRange, InputFormat, RunId, RunOptions};
pub use signal::{ScopeSignal, SignalError};
