//! Task system for processing chains.

pub mod registry;
pub mod scope_reader;
pub mod summary;
pub mod traits;

pub use registry::{StaticTaskRegistry, TaskChainTemplate, TaskFactory, TaskGenerator, TaskRegistry};
pub use scope_reader::ScopeReaderTask;
pub use summary::SignalSummaryTask;
pub use traits::{ParamAccess, Task};
