pub mod canonical;
pub mod catalog;
pub mod columns;
pub mod config;
pub mod edf;
pub mod error;
pub mod filters;
pub mod format;
pub mod header;
pub mod montage;
pub mod sanitize;
pub mod sniffer;
pub mod spectral;
pub mod tabular;
pub mod topomap;
pub mod types;

pub use canonical::{canonicalize, describe_channels, normalize_label, ChannelMapping, MatchRule};
pub use catalog::ElectrodeCatalog;
pub use config::{FrequencyBand, PipelineConfig};
pub use edf::decode_edf;
pub use error::{PipelineError, Result};
pub use filters::{apply_filter, FilterSpec, FrequencyList};
pub use format::{decode_upload, RecordingFormat};
pub use montage::{resolve_positions, PositionedChannel};
pub use sniffer::{sniff, SniffOutcome};
pub use spectral::{compute_psd, effective_window, nearest_bin, SpectralAnalyzer};
pub use topomap::{topomap_for_recording, TopomapImage};
pub use types::*;
