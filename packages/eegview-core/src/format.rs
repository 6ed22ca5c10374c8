use std::path::Path;

use crate::config::PipelineConfig;
use crate::edf::decode_edf;
use crate::error::{PipelineError, Result};
use crate::sniffer::sniff;
use crate::types::RawRecording;

/// Decoder chosen for an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingFormat {
    /// EDF, EDF+ or BDF container
    Container,
    /// Vendor export of unknown layout
    Sniffed,
}

impl RecordingFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "edf" | "bdf" | "rec" => RecordingFormat::Container,
            _ => RecordingFormat::Sniffed,
        }
    }

    pub fn from_file_name(name: &str) -> Self {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(RecordingFormat::Sniffed)
    }
}

/// Decode upload bytes with the decoder its file name calls for
pub fn decode_upload(
    file_name: Option<&str>,
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<RawRecording> {
    if bytes.is_empty() {
        return Err(PipelineError::MissingInput("Uploaded file is empty".to_string()));
    }

    let format = file_name
        .map(RecordingFormat::from_file_name)
        .unwrap_or(RecordingFormat::Sniffed);

    match format {
        RecordingFormat::Container => decode_edf(bytes),
        RecordingFormat::Sniffed => sniff(bytes, config).into_recording(),
    }
}
