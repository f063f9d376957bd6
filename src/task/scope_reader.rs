//! Adapter task turning oscilloscope ASCII traces into signal records.

use super::traits::{ParamAccess, Task};
use crate::data::{RunOptions, ScopeSignal, SignalError};
use crate::error::TaskError;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File written by the adapter into the output directory.
pub const SIGNALS_FILE: &str = "signals.json";

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("{0} is not a directory of oscilloscope traces")]
    NotADirectory(PathBuf),

    #[error("{path}: missing '{expected}' header")]
    MissingHeader { path: PathBuf, expected: &'static str },

    #[error("{path}:{line}: malformed line '{content}'")]
    Malformed {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("{path}: expected {expected} points, found {found}")]
    PointCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A trace file named `C<channel>_<window>.txt`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TraceFile {
    pub time_window: u64,
    pub channel: u32,
    pub path: PathBuf,
}

impl TraceFile {
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.extension()? != "txt" {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let (channel, window) = stem.strip_prefix('C')?.split_once('_')?;
        Some(Self {
            time_window: window.parse().ok()?,
            channel: channel.parse().ok()?,
            path: path.to_path_buf(),
        })
    }
}

/// Trace files of `dir` sorted by time window, then channel.
pub fn list_traces(dir: &Path) -> Result<Vec<TraceFile>, ScopeError> {
    if !dir.is_dir() {
        return Err(ScopeError::NotADirectory(dir.to_path_buf()));
    }
    let mut traces = Vec::new();
    for entry in fs::read_dir(dir)? {
        if let Some(trace) = TraceFile::from_path(&entry?.path()) {
            traces.push(trace);
        }
    }
    traces.sort();
    Ok(traces)
}

/// Parse one trace.
///
/// Layout: an instrument line, `Segments,<s>,SegmentSize,<n>`, free-form
/// lines up to `Time,Ampl`, then `s * n` rows of `<time>,<amplitude>`.
pub fn read_trace(trace: &TraceFile) -> Result<ScopeSignal, ScopeError> {
    let path = &trace.path;
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines().enumerate();

    let malformed = |line: usize, content: &str| ScopeError::Malformed {
        path: path.clone(),
        line: line + 1,
        content: content.to_string(),
    };
    let missing = |expected| ScopeError::MissingHeader {
        path: path.clone(),
        expected,
    };

    lines.next().ok_or_else(|| missing("instrument"))?.1?;

    let (number, header) = lines.next().ok_or_else(|| missing("Segments"))?;
    let header = header?;
    let fields: Vec<&str> = header.split(',').map(str::trim).collect();
    let expected = match fields.as_slice() {
        ["Segments", segments, "SegmentSize", size, ..] => {
            let segments: usize = segments.parse().map_err(|_| malformed(number, &header))?;
            let size: usize = size.parse().map_err(|_| malformed(number, &header))?;
            segments * size
        }
        _ => return Err(missing("Segments")),
    };

    loop {
        let (_, line) = lines.next().ok_or_else(|| missing("Time,Ampl"))?;
        if line?.trim_start().starts_with("Time,Ampl") {
            break;
        }
    }

    let mut time = Vec::with_capacity(expected);
    let mut amplitude = Vec::with_capacity(expected);
    for (number, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (t, a) = line.split_once(',').ok_or_else(|| malformed(number, &line))?;
        time.push(t.trim().parse::<f64>().map_err(|_| malformed(number, &line))?);
        amplitude.push(a.trim().parse::<f64>().map_err(|_| malformed(number, &line))?);
    }

    if time.len() != expected {
        return Err(ScopeError::PointCount {
            path: path.clone(),
            expected,
            found: time.len(),
        });
    }

    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ScopeSignal::new(
        source,
        trace.channel,
        trace.time_window,
        time,
        amplitude,
    )?)
}

/// Reads a directory of oscilloscope traces into [`ScopeSignal`] records.
///
/// Events are time windows; the event range selects windows by position.
/// Channel `n` is attached to the `n`-th photomultiplier of the bank when one
/// is installed.
#[derive(Debug, Default)]
pub struct ScopeReaderTask {
    /// Parameter handle of the executor.
    params: ParamAccess,
    /// Traces of the selected time windows.
    traces: Vec<TraceFile>,
    /// Destination of the signal records.
    output: Option<PathBuf>,
    /// Number of signals written.
    written: usize,
}

impl ScopeReaderTask {
    pub const NAME: &'static str = "ScopeReader";

    pub fn new() -> Self {
        Self::default()
    }

    fn pm_for_channel(&self, channel: u32) -> Option<crate::params::ParamId> {
        let index = (channel as usize).checked_sub(1)?;
        self.params.bank()?.pms().keys().nth(index).copied()
    }
}

impl Task for ScopeReaderTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Reads oscilloscope ASCII traces into signal records"
    }

    fn attach_params(&mut self, params: ParamAccess) {
        self.params = params;
    }

    fn init(&mut self, options: &RunOptions) -> Result<(), TaskError> {
        let traces = list_traces(&options.input)?;

        let windows: BTreeSet<u64> = traces.iter().map(|t| t.time_window).collect();
        let selected: BTreeSet<u64> = windows
            .into_iter()
            .enumerate()
            .filter(|(position, _)| options.range.contains(*position as u64))
            .map(|(_, window)| window)
            .collect();

        self.traces = traces
            .into_iter()
            .filter(|t| selected.contains(&t.time_window))
            .collect();

        fs::create_dir_all(&options.output)?;
        self.output = Some(options.output.join(SIGNALS_FILE));

        tracing::debug!(
            input = %options.input.display(),
            traces = self.traces.len(),
            windows = selected.len(),
            "selected oscilloscope traces"
        );
        Ok(())
    }

    fn exec(&mut self) -> Result<(), TaskError> {
        let Some(output) = self.output.as_ref() else {
            return Err("exec called before init".into());
        };

        let mut signals = Vec::with_capacity(self.traces.len());
        for trace in &self.traces {
            let mut signal = read_trace(trace)?;
            signal.pm_id = self.pm_for_channel(trace.channel);
            signals.push(signal);
        }

        let mut writer = BufWriter::new(File::create(output)?);
        serde_json::to_writer(&mut writer, &signals)?;
        writer.flush()?;

        self.written = signals.len();
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), TaskError> {
        tracing::info!(signals = self.written, "oscilloscope traces converted");
        self.traces.clear();
        Ok(())
    }
}
