//! Per-input run options.

use crate::error::ConfigError;
use crate::params::{KindSet, ParamKind};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identifier of one experimental run's configuration snapshot.
pub type RunId = i64;

/// Format of an input dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Directory of oscilloscope ASCII traces.
    Scope,
    /// Raw hardware binary stream.
    Hld,
    /// Previously processed data records.
    Root,
    /// Anything else; passed to the chain as is.
    Other,
}

impl InputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            InputFormat::Scope => "scope",
            InputFormat::Hld => "hld",
            InputFormat::Root => "root",
            InputFormat::Other => "other",
        }
    }

    /// Whether a record-level adapter task must be prepended to the chain.
    pub fn needs_adapter(&self) -> bool {
        matches!(self, InputFormat::Scope)
    }

    /// Whether the input must be unpacked before any task runs.
    pub fn needs_unpacking(&self) -> bool {
        matches!(self, InputFormat::Hld)
    }

    /// Parameter kinds that the local store never holds for this format.
    pub fn expected_missing(&self) -> KindSet {
        match self {
            InputFormat::Scope => {
                KindSet::from_kinds([ParamKind::Setup, ParamKind::Layer, ParamKind::Channel])
            }
            _ => KindSet::EMPTY,
        }
    }
}

impl FromStr for InputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "scope" => InputFormat::Scope,
            "hld" => InputFormat::Hld,
            "root" => InputFormat::Root,
            _ => InputFormat::Other,
        })
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Half-open event range `[first, last)`. `last == None` means no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRange {
    pub first: u64,
    pub last: Option<u64>,
}

impl EventRange {
    pub const UNRESTRICTED: EventRange = EventRange {
        first: 0,
        last: None,
    };

    pub fn new(first: u64, last: Option<u64>) -> Result<Self, ConfigError> {
        if let Some(last) = last {
            if first > last {
                return Err(ConfigError::InvalidRange { first, last });
            }
        }
        Ok(Self { first, last })
    }

    #[inline]
    pub fn is_unrestricted(&self) -> bool {
        *self == Self::UNRESTRICTED
    }

    #[inline]
    pub fn contains(&self, index: u64) -> bool {
        index >= self.first && self.last.map_or(true, |last| index < last)
    }
}

impl Default for EventRange {
    fn default() -> Self {
        Self::UNRESTRICTED
    }
}

/// Parses `<first>:<last>`; either side may be empty.
impl FromStr for EventRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedRange(s.to_string());
        let (first, last) = s.split_once(':').ok_or_else(malformed)?;

        let first = match first.trim() {
            "" => 0,
            v => v.parse().map_err(|_| malformed())?,
        };
        let last = match last.trim() {
            "" => None,
            v => Some(v.parse().map_err(|_| malformed())?),
        };
        EventRange::new(first, last)
    }
}

/// Options for processing one input dataset. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Ordinal of the input among all inputs of the run.
    pub seq: usize,
    pub input: PathBuf,
    pub format: InputFormat,
    pub run_id: Option<RunId>,
    pub range: EventRange,
    /// Directory the chain writes its products to.
    pub output: PathBuf,
}

impl RunOptions {
    pub fn new(seq: usize, input: impl Into<PathBuf>, format: InputFormat) -> Self {
        let input = input.into();
        let output = input
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            seq,
            input,
            format,
            run_id: None,
            range: EventRange::UNRESTRICTED,
            output,
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
        self.output = output.into();
        self
    }

    /// Copy of these options whose event range selects every event.
    pub fn with_unrestricted_range(&self) -> Self {
        Self {
            range: EventRange::UNRESTRICTED,
            ..self.clone()
        }
    }

    /// The run id, if it can select a parameter snapshot.
    pub fn valid_run_id(&self) -> Option<RunId> {
        self.run_id.filter(|id| *id >= 0)
    }
}
