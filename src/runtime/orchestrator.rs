//! Top-level run coordination: options, chains, parameters and workers.

use super::executor::{TaskChainExecutor, Unpacker};
use crate::error::{ConfigError, Error, ExecutorError, Result};
use crate::options::{InputExpander, OptionResolver, OptionsExpander, ValidatedOptions};
use crate::params::{JsonParamGetter, ParamGetter, ParamResolver};
use crate::task::TaskRegistry;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Configuration for the orchestrator.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Process inputs concurrently, one worker per input.
    pub parallel: bool,
    /// Async worker threads in parallel mode. Inputs always get a thread each.
    pub worker_threads: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            worker_threads: num_cpus::get(),
        }
    }
}

/// Result of processing one input.
#[derive(Debug)]
pub enum InputOutcome {
    Succeeded,
    Failed(ExecutorError),
    /// Not attempted because an earlier input failed in sequential mode.
    Skipped,
}

impl InputOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InputOutcome::Succeeded)
    }
}

/// Per-input outcomes of a run, ordered by input sequence number.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<InputOutcome>,
}

impl RunReport {
    /// `true` only if every input succeeded.
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(InputOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &ExecutorError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(seq, outcome)| match outcome {
                InputOutcome::Failed(e) => Some((seq, e)),
                _ => None,
            })
    }
}

/// Owns the collaborators of a processing run. Constructed by the entry point.
pub struct Orchestrator {
    /// Configuration.
    config: OrchestratorConfig,
    /// Turns process arguments into validated options.
    resolver: Box<dyn OptionResolver>,
    /// Source of the task chain.
    registry: Box<dyn TaskRegistry>,
    /// Splits validated options into per-input options.
    expander: Box<dyn OptionsExpander>,
    /// Injected parameter source; overrides the local database.
    getter: Option<Arc<dyn ParamGetter>>,
    /// Unpacker for raw hardware input.
    unpacker: Option<Arc<dyn Unpacker>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        resolver: impl OptionResolver + 'static,
        registry: impl TaskRegistry + 'static,
    ) -> Self {
        Self {
            config,
            resolver: Box::new(resolver),
            registry: Box::new(registry),
            expander: Box::new(InputExpander),
            getter: None,
            unpacker: None,
        }
    }

    pub fn with_expander(mut self, expander: impl OptionsExpander + 'static) -> Self {
        self.expander = Box::new(expander);
        self
    }

    /// Use `getter` instead of the local database named by the options.
    pub fn with_param_getter(mut self, getter: Arc<dyn ParamGetter>) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn with_unpacker(mut self, unpacker: Arc<dyn Unpacker>) -> Self {
        self.unpacker = Some(unpacker);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Resolve options, build one executor per input and run them all.
    ///
    /// Configuration problems fail the whole run before any executor is
    /// built. Failures of individual inputs are reported in the [`RunReport`].
    pub fn run(&self, args: &[String]) -> Result<RunReport> {
        let options = self.resolver.resolve(args)?;
        let template = self.registry.chain_for(&options)?;
        let runs = self.expander.expand(&options, template.len())?;
        if runs.is_empty() {
            return Err(ConfigError::NoInputs.into());
        }

        let param_resolver = self.param_resolver(&options)?;
        if param_resolver.is_none() {
            if let Some(run_id) = runs.iter().find_map(|r| r.valid_run_id()) {
                return Err(ConfigError::NoParamSource(run_id).into());
            }
        }

        let executors: Vec<TaskChainExecutor> = runs
            .into_iter()
            .map(|run| {
                TaskChainExecutor::new(
                    &template,
                    run,
                    param_resolver.clone(),
                    self.unpacker.clone(),
                )
            })
            .collect();

        let parallel = self.config.parallel || options.threads;
        let inputs = executors.len();
        tracing::info!(inputs, parallel, tasks = template.len(), "starting run");
        let start = Instant::now();

        let report = if parallel {
            self.run_parallel(executors)?
        } else {
            Self::run_sequential(executors)
        };

        let failed = report.failures().count();
        tracing::info!(
            inputs,
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "finished run"
        );
        Ok(report)
    }

    fn param_resolver(&self, options: &ValidatedOptions) -> Result<Option<Arc<ParamResolver>>> {
        let getter = match (&self.getter, &options.local_db) {
            (Some(getter), _) => getter.clone(),
            (None, Some(path)) => Arc::new(JsonParamGetter::open(path)?) as Arc<dyn ParamGetter>,
            (None, None) => return Ok(None),
        };
        Ok(Some(Arc::new(ParamResolver::new(getter))))
    }

    fn run_sequential(executors: Vec<TaskChainExecutor>) -> RunReport {
        let mut outcomes = Vec::with_capacity(executors.len());
        let mut failed = false;

        for mut executor in executors {
            if failed {
                outcomes.push(InputOutcome::Skipped);
                continue;
            }
            let seq = executor.options().seq;
            match executor.run() {
                Ok(()) => outcomes.push(InputOutcome::Succeeded),
                Err(e) => {
                    tracing::error!(input = seq, error = %e, "input failed, skipping the rest");
                    failed = true;
                    outcomes.push(InputOutcome::Failed(e));
                }
            }
        }
        RunReport { outcomes }
    }

    fn run_parallel(&self, executors: Vec<TaskChainExecutor>) -> Result<RunReport> {
        let count = executors.len();
        // One blocking thread per input so no input waits for a sibling.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads.max(1))
            .max_blocking_threads(count.max(1))
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;

        let mut outcomes: Vec<Option<InputOutcome>> = (0..count).map(|_| None).collect();

        runtime.block_on(async {
            let mut workers = JoinSet::new();
            for (slot, mut executor) in executors.into_iter().enumerate() {
                workers.spawn_blocking(move || {
                    let seq = executor.options().seq;
                    let result = panic::catch_unwind(AssertUnwindSafe(|| executor.run()))
                        .unwrap_or_else(|payload| {
                            Err(ExecutorError::Worker {
                                seq,
                                reason: panic_reason(payload.as_ref()),
                            })
                        });
                    (slot, result)
                });
            }

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((slot, Ok(()))) => outcomes[slot] = Some(InputOutcome::Succeeded),
                    Ok((slot, Err(e))) => {
                        tracing::error!(input = slot, error = %e, "input failed");
                        outcomes[slot] = Some(InputOutcome::Failed(e));
                    }
                    Err(e) => tracing::error!(error = %e, "worker did not complete"),
                }
            }
        });

        let outcomes = outcomes
            .into_iter()
            .enumerate()
            .map(|(seq, outcome)| {
                outcome.unwrap_or_else(|| {
                    InputOutcome::Failed(ExecutorError::Worker {
                        seq,
                        reason: "worker was cancelled".into(),
                    })
                })
            })
            .collect();
        Ok(RunReport { outcomes })
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InputFormat, RunOptions};
    use crate::error::{LifecycleStage, ProcessingError, TaskError};
    use crate::options::{CmdLineResolver, FixedOptions};
    use crate::params::ParamBank;
    use crate::task::{ParamAccess, ScopeReaderTask, StaticTaskRegistry, Task, TaskChainTemplate};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Step {
        Init,
        Exec,
        Terminate,
    }

    type Log = Arc<Mutex<Vec<(usize, &'static str, Step)>>>;

    /// Task logging its lifecycle per input; fails `exec` for one input.
    struct Recorder {
        name: &'static str,
        log: Log,
        seq: usize,
        fail_for: Option<usize>,
        params: ParamAccess,
        banks: Arc<Mutex<Vec<Arc<ParamBank>>>>,
    }

    impl Task for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn attach_params(&mut self, params: ParamAccess) {
            self.params = params;
        }

        fn init(&mut self, options: &RunOptions) -> std::result::Result<(), TaskError> {
            self.seq = options.seq;
            self.log.lock().push((self.seq, self.name, Step::Init));
            if let Some(bank) = self.params.shared() {
                self.banks.lock().push(bank);
            }
            Ok(())
        }

        fn exec(&mut self) -> std::result::Result<(), TaskError> {
            self.log.lock().push((self.seq, self.name, Step::Exec));
            if self.fail_for == Some(self.seq) {
                return Err("induced failure".into());
            }
            Ok(())
        }

        fn terminate(&mut self) -> std::result::Result<(), TaskError> {
            self.log.lock().push((self.seq, self.name, Step::Terminate));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Fixture {
        log: Log,
        instances: Arc<AtomicUsize>,
        banks: Arc<Mutex<Vec<Arc<ParamBank>>>>,
    }

    impl Fixture {
        fn registry(&self, names: &[&'static str], fail_for: Option<usize>) -> StaticTaskRegistry {
            let template = names.iter().copied().fold(TaskChainTemplate::new(), |template, name| {
                let log = self.log.clone();
                let instances = self.instances.clone();
                let banks = self.banks.clone();
                template.with_task(name, move || {
                    instances.fetch_add(1, Ordering::SeqCst);
                    Box::new(Recorder {
                        name,
                        log: log.clone(),
                        seq: 0,
                        fail_for: if name == "A" { fail_for } else { None },
                        params: ParamAccess::new(),
                        banks: banks.clone(),
                    }) as Box<dyn Task>
                })
            });
            StaticTaskRegistry::from_template(template)
        }

        fn steps_for(&self, seq: usize) -> Vec<(&'static str, Step)> {
            self.log
                .lock()
                .iter()
                .filter(|(s, _, _)| *s == seq)
                .map(|(_, name, step)| (*name, step.clone()))
                .collect()
        }
    }

    fn options(count: usize, format: InputFormat) -> ValidatedOptions {
        let inputs = (0..count).map(|i| format!("/data/run{i}.{format}").into()).collect();
        ValidatedOptions::new(inputs, format)
    }

    fn config(parallel: bool) -> OrchestratorConfig {
        OrchestratorConfig {
            parallel,
            worker_threads: 2,
        }
    }

    #[test]
    fn test_parallel_three_inputs_two_tasks() {
        let fixture = Fixture::default();
        let orchestrator = Orchestrator::new(
            config(true),
            FixedOptions(options(3, InputFormat::Root)),
            fixture.registry(&["A", "B"], None),
        );

        let report = orchestrator.run(&[]).unwrap();

        assert!(report.success());
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(fixture.instances.load(Ordering::SeqCst), 6);
        for seq in 0..3 {
            assert_eq!(
                fixture.steps_for(seq),
                vec![
                    ("A", Step::Init),
                    ("A", Step::Exec),
                    ("A", Step::Terminate),
                    ("B", Step::Init),
                    ("B", Step::Exec),
                    ("B", Step::Terminate),
                ]
            );
        }
    }

    #[test]
    fn test_parallel_inputs_run_concurrently() {
        struct Rendezvous(Arc<Barrier>);

        impl Task for Rendezvous {
            fn name(&self) -> &str {
                "Rendezvous"
            }

            fn init(&mut self, _options: &RunOptions) -> std::result::Result<(), TaskError> {
                Ok(())
            }

            fn exec(&mut self) -> std::result::Result<(), TaskError> {
                self.0.wait();
                Ok(())
            }

            fn terminate(&mut self) -> std::result::Result<(), TaskError> {
                Ok(())
            }
        }

        // More inputs than worker threads; every input must be running at once.
        let inputs = 5;
        let barrier = Arc::new(Barrier::new(inputs));
        let registry = StaticTaskRegistry::from_template(
            TaskChainTemplate::new().with_task("Rendezvous", move || Box::new(Rendezvous(barrier.clone()))),
        );
        let config = OrchestratorConfig {
            parallel: true,
            worker_threads: 1,
        };
        let orchestrator = Orchestrator::new(config, FixedOptions(options(inputs, InputFormat::Root)), registry);

        let (done, finished) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = done.send(orchestrator.run(&[]).map(|report| report.success()));
        });

        let outcome = finished.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(outcome.unwrap());
    }

    #[test]
    fn test_parallel_failure_is_isolated_but_reported() {
        let fixture = Fixture::default();
        let orchestrator = Orchestrator::new(
            config(true),
            FixedOptions(options(3, InputFormat::Root)),
            fixture.registry(&["A", "B"], Some(1)),
        );

        let report = orchestrator.run(&[]).unwrap();

        assert!(!report.success());
        assert!(report.outcomes[0].is_success());
        assert!(report.outcomes[2].is_success());
        assert!(matches!(
            report.outcomes[1],
            InputOutcome::Failed(ExecutorError::Processing(ProcessingError {
                stage: LifecycleStage::Exec,
                ..
            }))
        ));
        assert_eq!(
            fixture.steps_for(1),
            vec![("A", Step::Init), ("A", Step::Exec), ("A", Step::Terminate)]
        );
    }

    #[test]
    fn test_sequential_stops_at_first_failure() {
        let fixture = Fixture::default();
        let orchestrator = Orchestrator::new(
            config(false),
            FixedOptions(options(3, InputFormat::Root)),
            fixture.registry(&["A", "B"], Some(1)),
        );

        let report = orchestrator.run(&[]).unwrap();

        assert!(!report.success());
        assert!(report.outcomes[0].is_success());
        assert!(matches!(report.outcomes[1], InputOutcome::Failed(_)));
        assert!(matches!(report.outcomes[2], InputOutcome::Skipped));
        assert!(fixture.steps_for(2).is_empty());
        assert_eq!(report.failures().map(|(seq, _)| seq).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_config_failure_builds_no_executor() {
        let fixture = Fixture::default();
        let orchestrator =
            Orchestrator::new(config(true), CmdLineResolver::new(), fixture.registry(&["A"], None));

        let err = orchestrator.run(&["petrun".to_string()]).unwrap_err();

        assert!(matches!(err, Error::Config(ConfigError::Arguments(_))));
        assert_eq!(fixture.instances.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_chain_and_no_inputs() {
        let orchestrator = Orchestrator::new(
            config(false),
            FixedOptions(options(1, InputFormat::Root)),
            StaticTaskRegistry::new(),
        );
        assert!(matches!(
            orchestrator.run(&[]),
            Err(Error::Config(ConfigError::EmptyChain(InputFormat::Root)))
        ));

        let fixture = Fixture::default();
        let orchestrator = Orchestrator::new(
            config(false),
            FixedOptions(options(0, InputFormat::Root)),
            fixture.registry(&["A"], None),
        );
        assert!(matches!(
            orchestrator.run(&[]),
            Err(Error::Config(ConfigError::NoInputs))
        ));
    }

    #[test]
    fn test_run_id_without_parameter_source() {
        let fixture = Fixture::default();
        let orchestrator = Orchestrator::new(
            config(false),
            FixedOptions(options(2, InputFormat::Root).with_run_id(5)),
            fixture.registry(&["A"], None),
        );

        assert!(matches!(
            orchestrator.run(&[]),
            Err(Error::Config(ConfigError::NoParamSource(5)))
        ));
        assert_eq!(fixture.instances.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inputs_share_one_bank() {
        let getter = JsonParamGetter::from_value(json!({
            "17": {
                "setup": [{"id": 1}],
                "layer": [{"id": 1, "radius": 42.5, "setup_id": 1}],
                "slot": [{"id": 1, "theta": 0.0, "layer_id": 1}],
                "scin": [{"id": 1, "length": 50.0, "height": 0.7, "width": 1.9, "slot_id": 1}],
                "pm": [{"id": 1, "side": "left", "scin_id": 1}],
                "channel": []
            }
        }))
        .unwrap();
        let fixture = Fixture::default();
        let orchestrator = Orchestrator::new(
            config(true),
            FixedOptions(options(3, InputFormat::Root).with_run_id(17)),
            fixture.registry(&["A"], None),
        )
        .with_param_getter(Arc::new(getter));

        assert!(orchestrator.run(&[]).unwrap().success());

        let banks = fixture.banks.lock();
        assert_eq!(banks.len(), 3);
        assert!(banks.iter().all(|bank| Arc::ptr_eq(bank, &banks[0])));
        assert_eq!(banks[0].pms().len(), 1);
    }

    #[test]
    fn test_scope_input_runs_adapter_first() {
        let fixture = Fixture::default();
        let orchestrator = Orchestrator::new(
            config(false),
            FixedOptions(options(1, InputFormat::Scope)),
            fixture.registry(&["A"], None),
        );

        let report = orchestrator.run(&[]).unwrap();

        // The adapter fails on the missing trace directory before "A" starts.
        match &report.outcomes[0] {
            InputOutcome::Failed(ExecutorError::Processing(e)) => {
                assert_eq!(e.task, ScopeReaderTask::NAME);
                assert_eq!(e.stage, LifecycleStage::Init);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(fixture.steps_for(0).is_empty());
    }

    #[test]
    fn test_scope_run_end_to_end() {
        use crate::task::scope_reader::tests::write_trace;
        use crate::task::summary::{SignalSummary, SUMMARY_FILE};
        use crate::task::SignalSummaryTask;

        let dir = tempfile::tempdir().unwrap();
        write_trace(dir.path(), 1, 0, &[(0.0, 0.0), (1e-10, -0.4)]);
        write_trace(dir.path(), 2, 0, &[(0.0, -0.1), (1e-10, 0.0)]);
        write_trace(dir.path(), 1, 1, &[(0.0, 0.0), (1e-10, -0.2)]);

        // Scope runs carry no setup, layer or channel entries.
        let getter = JsonParamGetter::from_value(json!({
            "17": {
                "slot": [{"id": 1, "theta": 0.0}],
                "scin": [{"id": 1, "length": 50.0, "height": 0.7, "width": 1.9, "slot_id": 1}],
                "pm": [
                    {"id": 10, "side": "left", "scin_id": 1},
                    {"id": 11, "side": "right", "scin_id": 1}
                ]
            }
        }))
        .unwrap();
        let registry = StaticTaskRegistry::from_template(
            TaskChainTemplate::new().with_task(SignalSummaryTask::NAME, || Box::new(SignalSummaryTask::new())),
        );
        let options = ValidatedOptions::new(vec![dir.path().to_path_buf()], InputFormat::Scope)
            .with_run_id(17)
            .with_range("0:1".parse().unwrap());
        let orchestrator = Orchestrator::new(config(false), FixedOptions(options), registry)
            .with_param_getter(Arc::new(getter));

        let report = orchestrator.run(&[]).unwrap();
        assert!(report.success(), "{report:?}");

        let text = std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
        let summaries: Vec<SignalSummary> = serde_json::from_str(&text).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].pm_id, Some(10));
        assert_eq!(summaries[1].pm_id, Some(11));
        assert_eq!(summaries[0].min_amplitude, Some(-0.4));
    }

    struct CountingUnpacker(AtomicUsize);

    impl Unpacker for CountingUnpacker {
        fn unpack(&self, _options: &RunOptions) -> std::result::Result<(), TaskError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_hld_inputs_unpacked_once_each() {
        let fixture = Fixture::default();
        let unpacker = Arc::new(CountingUnpacker(AtomicUsize::new(0)));
        let orchestrator = Orchestrator::new(
            config(true),
            FixedOptions(options(2, InputFormat::Hld)),
            fixture.registry(&["A", "B"], None),
        )
        .with_unpacker(unpacker.clone());

        assert!(orchestrator.run(&[]).unwrap().success());
        assert_eq!(unpacker.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_task_fails_only_its_input() {
        struct Panics;

        impl Task for Panics {
            fn name(&self) -> &str {
                "Panics"
            }

            fn init(&mut self, options: &RunOptions) -> std::result::Result<(), TaskError> {
                if options.seq == 0 {
                    panic!("boom");
                }
                Ok(())
            }

            fn exec(&mut self) -> std::result::Result<(), TaskError> {
                Ok(())
            }

            fn terminate(&mut self) -> std::result::Result<(), TaskError> {
                Ok(())
            }
        }

        let registry =
            StaticTaskRegistry::from_template(TaskChainTemplate::new().with_task("Panics", || Box::new(Panics)));
        let orchestrator =
            Orchestrator::new(config(true), FixedOptions(options(2, InputFormat::Root)), registry);

        let report = orchestrator.run(&[]).unwrap();

        assert!(matches!(
            &report.outcomes[0],
            InputOutcome::Failed(ExecutorError::Worker { seq: 0, reason }) if reason == "boom"
        ));
        assert!(report.outcomes[1].is_success());
        assert!(!report.success());
    }
}
