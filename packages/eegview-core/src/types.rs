use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Decoder that produced a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingSource {
    /// Clinical container file (EDF/EDF+)
    Container,
    /// Delimited text table
    Tabular,
    /// Headerless little-endian 16-bit stream
    Binary,
}

impl RecordingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingSource::Container => "container",
            RecordingSource::Tabular => "tabular",
            RecordingSource::Binary => "binary",
        }
    }
}

/// A decoded multichannel recording, owned by a single request
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecording {
    source: RecordingSource,
    sample_rate: f64,
    channel_names: Vec<String>,
    signals: Vec<Vec<f64>>, // [channel][sample]
}

impl RawRecording {
    /// Build a recording, checking the matrix is rectangular and labelled
    pub fn new(
        source: RecordingSource,
        sample_rate: f64,
        channel_names: Vec<String>,
        signals: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PipelineError::UnsupportedFormat(format!(
                "Invalid sample rate {}",
                sample_rate
            )));
        }
        if channel_names.len() != signals.len() {
            return Err(PipelineError::UnsupportedFormat(format!(
                "{} channel labels for {} signal rows",
                channel_names.len(),
                signals.len()
            )));
        }
        if let Some(first) = signals.first() {
            let expected = first.len();
            if let Some((idx, row)) = signals
                .iter()
                .enumerate()
                .find(|(_, row)| row.len() != expected)
            {
                return Err(PipelineError::UnsupportedFormat(format!(
                    "Channel {} has {} samples, expected {}",
                    idx,
                    row.len(),
                    expected
                )));
            }
        }

        Ok(Self {
            source,
            sample_rate,
            channel_names,
            signals,
        })
    }

    pub fn source(&self) -> RecordingSource {
        self.source
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn signals(&self) -> &[Vec<f64>] {
        &self.signals
    }

    pub fn num_channels(&self) -> usize {
        self.channel_names.len()
    }

    pub fn num_samples(&self) -> usize {
        self.signals.first().map(|s| s.len()).unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate
    }

    /// Look up a channel by its exact raw label
    pub fn channel(&self, name: &str) -> Result<&[f64]> {
        self.channel_names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.signals[idx].as_slice())
            .ok_or_else(|| PipelineError::InvalidChannel(name.to_string()))
    }

    /// Copy of every channel truncated to at most `max_samples`
    pub fn truncated_signals(&self, max_samples: usize) -> Vec<Vec<f64>> {
        self.signals
            .iter()
            .map(|row| row[..row.len().min(max_samples)].to_vec())
            .collect()
    }
}

/// Channel category after canonicalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Eeg,
    Derived,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub raw_label: String,
    pub canonical_label: Option<String>,
    pub position: Option<[f64; 3]>,
    pub channel_type: ChannelType,
}

/// Welch estimate for a set of channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralResult {
    /// Ascending, unique frequency axis in Hz
    pub freqs: Vec<f64>,
    /// Power density, [channel][frequency]
    pub psd: Vec<Vec<f64>>,
}

impl SpectralResult {
    /// Index of the bin closest to `target`, ties resolved toward the lower frequency
    pub fn nearest_bin(&self, target: f64) -> Option<usize> {
        crate::spectral::nearest_bin(&self.freqs, target)
    }

    /// Power of every channel at one frequency bin
    pub fn power_at(&self, bin: usize) -> Vec<f64> {
        self.psd
            .iter()
            .map(|row| row.get(bin).copied().unwrap_or(0.0))
            .collect()
    }
}
