//! Error types for option resolution, parameter resolution and task processing.

use crate::data::{InputFormat, RunId};
use crate::params::{ParamId, ParamKind};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error reported by a task lifecycle call or an external collaborator.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Options could not be resolved into a runnable configuration.
///
/// Raised before any executor exists, so a configuration failure never
/// produces a partial run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid arguments: {0}")]
    Arguments(String),

    /// Help or version text was requested instead of a run.
    #[error("{0}")]
    Usage(String),

    #[error("input not found: {0}")]
    MissingInput(PathBuf),

    #[error("malformed event range '{0}', expected <first>:<last>")]
    MalformedRange(String),

    #[error("invalid event range: first event {first} is past last event {last}")]
    InvalidRange { first: u64, last: u64 },

    #[error("no input datasets discovered")]
    NoInputs,

    #[error("no tasks registered for {0} input")]
    EmptyChain(InputFormat),

    #[error("parameter store at {path} is unreachable: {reason}")]
    StoreUnreachable { path: PathBuf, reason: String },

    #[error("run {0} needs detector parameters but no parameter store is configured")]
    NoParamSource(RunId),
}

/// Failure of the backing parameter store.
#[derive(Error, Debug)]
pub enum GetterError {
    #[error("run {0} is not present in the parameter store")]
    UnknownRun(RunId),

    #[error("no {kind} entries for run {run_id}")]
    MissingKind { run_id: RunId, kind: ParamKind },

    #[error("malformed parameter store: {0}")]
    Malformed(String),
}

/// The parameter bank for a run could not be built.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error(
        "{kind} {id} of run {run_id} references {parent_kind} {parent_id}, which is not in the bank"
    )]
    DanglingParent {
        run_id: RunId,
        kind: ParamKind,
        id: ParamId,
        parent_kind: ParamKind,
        parent_id: ParamId,
    },

    #[error("{kind} {id} of run {run_id} declares no {parent_kind}")]
    MissingParentRef {
        run_id: RunId,
        kind: ParamKind,
        id: ParamId,
        parent_kind: ParamKind,
    },

    #[error("duplicate {kind} id {id} in run {run_id}")]
    Duplicate {
        run_id: RunId,
        kind: ParamKind,
        id: ParamId,
    },

    #[error("fetching {kind} for run {run_id}")]
    Store {
        run_id: RunId,
        kind: ParamKind,
        #[source]
        source: GetterError,
    },

    #[error("malformed {kind} description in run {run_id}")]
    Malformed {
        run_id: RunId,
        kind: ParamKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Lifecycle step of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    Init,
    Exec,
    Terminate,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleStage::Init => "init",
            LifecycleStage::Exec => "exec",
            LifecycleStage::Terminate => "terminate",
        };
        f.write_str(name)
    }
}

/// A task's lifecycle call failed.
#[derive(Error, Debug)]
#[error("task '{task}' failed during {stage}")]
pub struct ProcessingError {
    pub task: String,
    pub stage: LifecycleStage,
    #[source]
    pub source: TaskError,
}

/// Failure of a single input's executor. Never affects sibling executors.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("unpacking {input} failed")]
    Unpacking {
        input: PathBuf,
        #[source]
        source: TaskError,
    },

    #[error("{0} input requires an unpacker but none is configured")]
    MissingUnpacker(InputFormat),

    #[error("run {0} needs detector parameters but the executor has no resolver")]
    NoResolver(RunId),

    #[error("worker for input {seq} did not complete: {reason}")]
    Worker { seq: usize, reason: String },
}

/// Reading or writing a persisted parameter bank failed.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("io error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error on {path}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("persisted bank is inconsistent")]
    Inconsistent(#[from] ResolutionError),
}

/// Top-level error of a processing run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start worker runtime")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

pub type Result<T> = std::result::Result<T, Error>;
