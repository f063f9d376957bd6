//! Option resolution and per-input expansion.

pub mod cli;
pub mod expand;

pub use cli::CmdLineResolver;
pub use expand::InputExpander;

use crate::data::{EventRange, InputFormat, RunId, RunOptions};
use crate::error::ConfigError;
use std::path::PathBuf;

/// Options of a whole processing run, checked for consistency.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOptions {
    pub inputs: Vec<PathBuf>,
    pub format: InputFormat,
    pub run_id: Option<RunId>,
    pub range: EventRange,
    /// Output directory; defaults to each input's directory.
    pub output: Option<PathBuf>,
    /// Local JSON parameter database.
    pub local_db: Option<PathBuf>,
    /// Process inputs concurrently.
    pub threads: bool,
}

impl ValidatedOptions {
    pub fn new(inputs: Vec<PathBuf>, format: InputFormat) -> Self {
        Self {
            inputs,
            format,
            run_id: None,
            range: EventRange::UNRESTRICTED,
            output: None,
            local_db: None,
            threads: false,
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_range(mut self, range: EventRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_local_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_db = Some(path.into());
        self
    }

    pub fn with_threads(mut self, threads: bool) -> Self {
        self.threads = threads;
        self
    }
}

/// Turns raw process arguments into validated options.
pub trait OptionResolver: Send + Sync {
    fn resolve(&self, args: &[String]) -> Result<ValidatedOptions, ConfigError>;
}

/// Expands run-wide options into one [`RunOptions`] per discovered input.
pub trait OptionsExpander: Send + Sync {
    fn expand(
        &self,
        options: &ValidatedOptions,
        chain_len: usize,
    ) -> Result<Vec<RunOptions>, ConfigError>;
}

/// Resolver that ignores the arguments and returns fixed options.
#[derive(Debug, Clone)]
pub struct FixedOptions(pub ValidatedOptions);

impl OptionResolver for FixedOptions {
    fn resolve(&self, _args: &[String]) -> Result<ValidatedOptions, ConfigError> {
        Ok(self.0.clone())
    }
}
