//! petrun - task-chain processing of detector data files.
//!
//! Every input dataset is processed by its own executor, which owns a fresh
//! instance of a shared chain of tasks and a handle to the detector
//! parameters of the input's run:
//!
//! - Linear task chains with an `init` / `exec` / `terminate` lifecycle
//! - Sequential or parallel (one worker per input) processing
//! - Lazily resolved, cached detector parameter banks
//! - Format adapters for oscilloscope traces and raw hardware data
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │            Orchestrator             │
//! │  options → chain → per-input runs   │
//! └─────────────────────────────────────┘
//!          │                   │
//!          ▼                   ▼
//! ┌──────────────────┐ ┌──────────────────┐
//! │ TaskChainExecutor│ │  ParamResolver   │
//! │  (one per input) │◄│ (shared, cached) │
//! │  Task → Task → … │ │ Setup → … → Chan │
//! └──────────────────┘ └──────────────────┘
//!                              │
//!                              ▼
//!                      ┌──────────────────┐
//!                      │   ParamGetter    │
//!                      │ (local JSON db)  │
//!                      └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use petrun::{CmdLineResolver, Orchestrator, OrchestratorConfig, SignalSummaryTask, StaticTaskRegistry};
//!
//! let mut registry = StaticTaskRegistry::new();
//! registry.register(SignalSummaryTask::NAME, || Box::new(SignalSummaryTask::new()));
//!
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default(), CmdLineResolver::new(), registry);
//! let args: Vec<String> = std::env::args().collect();
//! let report = orchestrator.run(&args)?;
//! assert!(report.success());
//! # Ok::<(), petrun::Error>(())
//! ```

pub mod data;
pub mod error;
pub mod options;
pub mod params;
pub mod runtime;
pub mod task;

// Re-export commonly used items
pub use data::{EventRange, InputFormat, RunId, RunOptions, ScopeSignal};
pub use error::{
    ConfigError, Error, ExecutorError, GetterError, LifecycleStage, PersistError, ProcessingError,
    ResolutionError, Result, TaskError,
};
pub use options::{CmdLineResolver, InputExpander, OptionResolver, OptionsExpander, ValidatedOptions};
pub use params::{JsonParamGetter, KindSet, ParamBank, ParamGetter, ParamKind, ParamResolver};
pub use runtime::{InputOutcome, Orchestrator, OrchestratorConfig, RunReport, TaskChainExecutor, Unpacker};
pub use task::{
    ParamAccess, ScopeReaderTask, SignalSummaryTask, StaticTaskRegistry, Task, TaskChainTemplate,
    TaskRegistry,
};
