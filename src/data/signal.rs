//! Oscilloscope signal records produced by the scope adapter.

use crate::params::ParamId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One digitized oscilloscope trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScopeSignal {
    /// File the trace was read from.
    pub source: String,

    /// Oscilloscope channel number (the `<n>` in `C<n>_...`).
    pub channel: u32,

    /// Index of the acquisition time window.
    pub time_window: u64,

    /// Photomultiplier attached to the channel, if known.
    pub pm_id: Option<ParamId>,

    /// Sample times in seconds.
    pub time: Vec<f64>,

    /// Sampled amplitudes in volts.
    pub amplitude: Vec<f64>,
}

impl ScopeSignal {
    pub fn new(
        source: impl Into<String>,
        channel: u32,
        time_window: u64,
        time: Vec<f64>,
        amplitude: Vec<f64>,
    ) -> Result<Self, SignalError> {
        if time.len() != amplitude.len() {
            return Err(SignalError::LengthMismatch {
                time_len: time.len(),
                amplitude_len: amplitude.len(),
            });
        }

        Ok(Self {
            source: source.into(),
            channel,
            time_window,
            pm_id: None,
            time,
            amplitude,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Index and value of the smallest amplitude (PET pulses are negative).
    pub fn minimum(&self) -> Option<(usize, f64)> {
        self.amplitude
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn maximum(&self) -> Option<(usize, f64)> {
        self.amplitude
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("array length mismatch: time={time_len}, amplitude={amplitude_len}")]
    LengthMismatch {
        time_len: usize,
        amplitude_len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_creation() {
        let signal = ScopeSignal::new(
            "C1_00003.txt",
            1,
            3,
            vec![0.0, 1e-10, 2e-10],
            vec![0.0, -0.2, -0.05],
        )
        .unwrap();

        assert_eq!(signal.len(), 3);
        assert_eq!(signal.pm_id, None);
        assert_eq!(signal.minimum(), Some((1, -0.2)));
        assert_eq!(signal.maximum(), Some((0, 0.0)));
    }

    #[test]
    fn test_signal_length_mismatch() {
        let result = ScopeSignal::new("x", 1, 0, vec![0.0], vec![0.0, 1.0]);
        assert!(matches!(result, Err(SignalError::LengthMismatch { .. })));
    }
}
