//! Per-signal summary statistics.

use super::scope_reader::SIGNALS_FILE;
use super::traits::Task;
use crate::data::{EventRange, RunOptions, ScopeSignal};
use crate::error::TaskError;
use crate::params::ParamId;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub source: String,
    pub channel: u32,
    pub time_window: u64,
    pub pm_id: Option<ParamId>,
    pub points: usize,
    pub min_amplitude: Option<f64>,
    /// Time of the minimum, i.e. of the pulse peak.
    pub min_time: Option<f64>,
    pub max_amplitude: Option<f64>,
}

impl SignalSummary {
    pub fn of(signal: &ScopeSignal) -> Self {
        let minimum = signal.minimum();
        Self {
            source: signal.source.clone(),
            channel: signal.channel,
            time_window: signal.time_window,
            pm_id: signal.pm_id,
            points: signal.len(),
            min_amplitude: minimum.map(|(_, value)| value),
            min_time: minimum.and_then(|(index, _)| signal.time.get(index).copied()),
            max_amplitude: signal.maximum().map(|(_, value)| value),
        }
    }
}

/// Summarizes the signals written by the scope adapter.
#[derive(Debug, Default)]
pub struct SignalSummaryTask {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    range: EventRange,
    summaries: Vec<SignalSummary>,
}

impl SignalSummaryTask {
    pub const NAME: &'static str = "SignalSummary";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Task for SignalSummaryTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Computes amplitude extrema for every signal"
    }

    fn init(&mut self, options: &RunOptions) -> Result<(), TaskError> {
        let input = options.output.join(SIGNALS_FILE);
        if !input.is_file() {
            return Err(format!("no signals at {}", input.display()).into());
        }
        self.input = Some(input);
        self.output = Some(options.output.join(SUMMARY_FILE));
        self.range = options.range;
        Ok(())
    }

    fn exec(&mut self) -> Result<(), TaskError> {
        let (Some(input), Some(output)) = (self.input.as_ref(), self.output.as_ref()) else {
            return Err("exec called before init".into());
        };

        let signals: Vec<ScopeSignal> = serde_json::from_reader(BufReader::new(File::open(input)?))?;
        self.summaries = signals
            .iter()
            .enumerate()
            .filter(|(index, _)| self.range.contains(*index as u64))
            .map(|(_, signal)| SignalSummary::of(signal))
            .collect();

        let mut writer = BufWriter::new(File::create(output)?);
        serde_json::to_writer_pretty(&mut writer, &self.summaries)?;
        writer.flush()?;
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), TaskError> {
        tracing::info!(signals = self.summaries.len(), "signal summary written");
        Ok(())
    }
}
