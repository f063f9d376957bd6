//! Execution of one task chain over one input.

use crate::data::RunOptions;
use crate::error::{ExecutorError, LifecycleStage, ProcessingError, TaskError};
use crate::params::ParamResolver;
use crate::task::{ParamAccess, ScopeReaderTask, Task, TaskChainTemplate};
use std::sync::Arc;

/// Unpacks raw hardware data into chain-ready records.
pub trait Unpacker: Send + Sync {
    fn unpack(&self, options: &RunOptions) -> Result<(), TaskError>;
}

/// Owns the task chain and parameter handle of exactly one input.
pub struct TaskChainExecutor {
    /// Options of the input this executor owns.
    options: RunOptions,
    /// Task instances in execution order.
    tasks: Vec<Box<dyn Task>>,
    /// Parameter handle shared with every task.
    params: ParamAccess,
    /// Shared parameter resolver of the run.
    resolver: Option<Arc<ParamResolver>>,
    /// Unpacker for raw hardware input.
    unpacker: Option<Arc<dyn Unpacker>>,
    /// Whether the input was unpacked.
    unpacked: bool,
    /// Whether pre-processing completed.
    prepared: bool,
}

impl TaskChainExecutor {
    /// Instantiate one fresh task per template entry, in template order.
    pub fn new(
        template: &TaskChainTemplate,
        options: RunOptions,
        resolver: Option<Arc<ParamResolver>>,
        unpacker: Option<Arc<dyn Unpacker>>,
    ) -> Self {
        let params = ParamAccess::new();
        let tasks = template.instantiate(&params);
        Self {
            options,
            tasks,
            params,
            resolver,
            unpacker,
            unpacked: false,
            prepared: false,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn params(&self) -> &ParamAccess {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Prepare the chain for the input format and install the parameter bank.
    ///
    /// Runs once; later calls are no-ops. After a failure it may be retried:
    /// the input is unpacked at most once and the adapter is added only when
    /// every fallible step succeeded.
    pub fn pre_process(&mut self) -> Result<(), ExecutorError> {
        if self.prepared {
            return Ok(());
        }
        let format = self.options.format;

        if format.needs_unpacking() && !self.unpacked {
            let unpacker = self
                .unpacker
                .as_ref()
                .ok_or(ExecutorError::MissingUnpacker(format))?;
            tracing::info!(input = %self.options.input.display(), "unpacking input");
            unpacker
                .unpack(&self.options)
                .map_err(|source| ExecutorError::Unpacking {
                    input: self.options.input.clone(),
                    source,
                })?;
            self.unpacked = true;
        }

        if let Some(run_id) = self.options.valid_run_id() {
            let resolver = self
                .resolver
                .as_ref()
                .ok_or(ExecutorError::NoResolver(run_id))?;
            let bank = resolver.bank(run_id, format.expected_missing())?;
            self.params.install(bank);
        }

        if format.needs_adapter() {
            let mut adapter: Box<dyn Task> = Box::new(ScopeReaderTask::new());
            adapter.attach_params(self.params.clone());
            self.tasks.insert(0, adapter);
        }

        self.prepared = true;
        Ok(())
    }

    /// Run every task in order. Only the first task sees the event range.
    ///
    /// A failing task aborts the rest of this chain. `terminate` runs for
    /// every task whose `init` was called.
    pub fn process(&mut self) -> Result<(), ExecutorError> {
        let seq = self.options.seq;
        let downstream = self.options.with_unrestricted_range();

        for (index, task) in self.tasks.iter_mut().enumerate() {
            let options = if index == 0 { &self.options } else { &downstream };
            let name = task.name().to_string();

            tracing::info!(input = seq, task = %name, "starting task");
            let outcome = task
                .init(options)
                .map_err(|e| (LifecycleStage::Init, e))
                .and_then(|()| task.exec().map_err(|e| (LifecycleStage::Exec, e)));
            let released = task.terminate();

            match (outcome, released) {
                (Ok(()), Ok(())) => {
                    tracing::info!(input = seq, task = %name, "finished task");
                }
                (Err((stage, source)), released) => {
                    if let Err(e) = released {
                        tracing::warn!(input = seq, task = %name, error = %e, "terminate failed after error");
                    }
                    return Err(ProcessingError {
                        task: name,
                        stage,
                        source,
                    }
                    .into());
                }
                (Ok(()), Err(source)) => {
                    return Err(ProcessingError {
                        task: name,
                        stage: LifecycleStage::Terminate,
                        source,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Pre-process, then process.
    pub fn run(&mut self) -> Result<(), ExecutorError> {
        self.pre_process()?;
        self.process()
    }
}
