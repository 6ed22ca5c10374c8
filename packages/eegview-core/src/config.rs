use serde::{Deserialize, Serialize};

/// Frequency band in Hz, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub fmin: f64,
    pub fmax: f64,
}

impl FrequencyBand {
    pub const fn new(fmin: f64, fmax: f64) -> Self {
        Self { fmin, fmax }
    }

    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.fmin && freq <= self.fmax
    }
}

/// Fixed constants of the ingestion and analysis pipeline.
///
/// A single value is built at startup and shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Channel count assumed when decoding a headerless 16-bit stream
    pub binary_channel_count: usize,
    /// Sample rate used when no header line declares one (Hz)
    pub default_sample_rate: u32,
    /// Number of leading bytes scanned for header metadata
    pub header_scan_bytes: usize,
    /// Upper bound on the Welch segment length
    pub welch_window_cap: usize,
    /// Minimum number of positioned electrodes for a topographic map
    pub min_topomap_channels: usize,
    /// Samples per channel returned by the container preview
    pub container_preview_samples: usize,
    /// Seconds of signal returned by the tabular/binary preview
    pub text_preview_seconds: usize,
    /// Band reported by the PSD endpoint
    pub psd_band: FrequencyBand,
    /// Band used to estimate power for topographic maps
    pub topomap_band: FrequencyBand,
    /// Frequency mapped when the client does not request one (Hz)
    pub default_topomap_frequency: f64,
    /// Edge length of the rendered topomap image in pixels
    pub topomap_image_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            binary_channel_count: 8,
            default_sample_rate: 160,
            header_scan_bytes: 4096,
            welch_window_cap: 2048,
            min_topomap_channels: 3,
            container_preview_samples: 5000,
            text_preview_seconds: 10,
            psd_band: FrequencyBand::new(0.5, 50.0),
            topomap_band: FrequencyBand::new(1.0, 40.0),
            default_topomap_frequency: 10.0,
            topomap_image_size: 400,
        }
    }
}

impl PipelineConfig {
    /// Number of samples kept by the text preview at the given rate
    pub fn text_preview_samples(&self, sample_rate: f64) -> usize {
        (sample_rate * self.text_preview_seconds as f64).round() as usize
    }
}
