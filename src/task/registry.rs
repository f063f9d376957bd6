//! Task chain templates and the registry that provides them.

use super::traits::{ParamAccess, Task};
use crate::error::ConfigError;
use crate::options::ValidatedOptions;
use std::fmt;
use std::sync::Arc;

/// Constructor of a fresh task instance.
pub type TaskFactory = Arc<dyn Fn() -> Box<dyn Task> + Send + Sync>;

/// A named task constructor.
#[derive(Clone)]
pub struct TaskGenerator {
    pub name: String,
    factory: TaskFactory,
}

impl TaskGenerator {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn generate(&self) -> Box<dyn Task> {
        (self.factory)()
    }
}

impl fmt::Debug for TaskGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskGenerator").field(&self.name).finish()
    }
}

/// Ordered, read-only list of task constructors.
///
/// One template is shared by every executor of a run; each executor
/// instantiates its own tasks from it.
#[derive(Clone, Debug, Default)]
pub struct TaskChainTemplate {
    generators: Vec<TaskGenerator>,
}

impl TaskChainTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task constructor.
    pub fn with_task<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        self.generators.push(TaskGenerator::new(name, factory));
        self
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.name.as_str()).collect()
    }

    /// Fresh task instances in template order, each holding `params`.
    pub fn instantiate(&self, params: &ParamAccess) -> Vec<Box<dyn Task>> {
        self.generators
            .iter()
            .map(|generator| {
                let mut task = generator.generate();
                task.attach_params(params.clone());
                task
            })
            .collect()
    }
}

impl FromIterator<TaskGenerator> for TaskChainTemplate {
    fn from_iter<I: IntoIterator<Item = TaskGenerator>>(iter: I) -> Self {
        Self {
            generators: iter.into_iter().collect(),
        }
    }
}

/// Supplies the chain of tasks for a set of validated options.
pub trait TaskRegistry: Send + Sync {
    fn chain_for(&self, options: &ValidatedOptions) -> Result<Arc<TaskChainTemplate>, ConfigError>;
}

/// Registry returning the same chain for every run.
#[derive(Debug, Default)]
pub struct StaticTaskRegistry {
    template: Arc<TaskChainTemplate>,
}

impl StaticTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_template(template: TaskChainTemplate) -> Self {
        Self {
            template: Arc::new(template),
        }
    }

    /// Register a task at the end of the chain.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.template)
            .generators
            .push(TaskGenerator::new(name, factory));
    }

    pub fn template(&self) -> &TaskChainTemplate {
        &self.template
    }
}

impl TaskRegistry for StaticTaskRegistry {
    fn chain_for(&self, options: &ValidatedOptions) -> Result<Arc<TaskChainTemplate>, ConfigError> {
        if self.template.is_empty() {
            return Err(ConfigError::EmptyChain(options.format));
        }
        Ok(self.template.clone())
    }
}
