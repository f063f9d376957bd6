//! Task trait definitions.

use crate::data::RunOptions;
use crate::error::TaskError;
use crate::params::ParamBank;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Executor-owned handle to the parameter bank of one input.
///
/// Tasks receive a clone at construction, before the bank exists. The
/// executor installs the bank once during pre-processing; after that it is
/// read-only and shared by every task of the chain.
#[derive(Clone, Default)]
pub struct ParamAccess {
    bank: Arc<OnceCell<Arc<ParamBank>>>,
}

impl ParamAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bank(&self) -> Option<&ParamBank> {
        self.bank.get().map(Arc::as_ref)
    }

    pub fn shared(&self) -> Option<Arc<ParamBank>> {
        self.bank.get().cloned()
    }

    pub fn is_populated(&self) -> bool {
        self.bank.get().is_some()
    }

    /// Returns `false` if a bank was already installed.
    pub(crate) fn install(&self, bank: Arc<ParamBank>) -> bool {
        self.bank.set(bank).is_ok()
    }
}

impl fmt::Debug for ParamAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamAccess")
            .field("run_id", &self.bank().map(ParamBank::run_id))
            .finish()
    }
}

/// One stage of a processing chain.
///
/// The executor calls `init`, `exec` and `terminate` exactly once each, in
/// that order. `terminate` is called even when `init` or `exec` failed.
pub trait Task: Send {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Receive the executor's parameter handle. Called once, at construction.
    fn attach_params(&mut self, _params: ParamAccess) {}

    fn init(&mut self, options: &RunOptions) -> Result<(), TaskError>;

    fn exec(&mut self) -> Result<(), TaskError>;

    fn terminate(&mut self) -> Result<(), TaskError>;
}
