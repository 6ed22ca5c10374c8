//! Two-tier decoding of vendor exports.
//!
//! Tier 1 reads the bytes as a delimited table. Only if that produces no
//! usable channel does tier 2 run, once, reading the bytes as interleaved
//! little-endian 16-bit samples. Each tier reports its outcome as a value;
//! the caller sees exactly one of [`SniffOutcome`]'s variants.

use byteorder::{ByteOrder, LittleEndian};

use crate::columns::select_signal_columns;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::header::extract_sample_rate;
use crate::sanitize::sanitize_in_place;
use crate::tabular::{parse_table, TableRejection};
use crate::types::{RawRecording, RecordingSource};

/// Why the tabular tier produced no recording
#[derive(Debug, Clone, PartialEq)]
pub enum TabularRejection {
    Table(TableRejection),
    NoSignalColumns,
    NonNumericColumn(String),
}

impl std::fmt::Display for TabularRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabularRejection::Table(reason) => write!(f, "{}", reason),
            TabularRejection::NoSignalColumns => write!(f, "no valid EEG signal columns found"),
            TabularRejection::NonNumericColumn(name) => {
                write!(f, "column '{}' is not numeric", name)
            }
        }
    }
}

/// Why the binary tier produced no recording
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryRejection {
    NoChannels,
    IncompleteFrame { bytes: usize, frame_bytes: usize },
}

impl std::fmt::Display for BinaryRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryRejection::NoChannels => write!(f, "binary channel count is zero"),
            BinaryRejection::IncompleteFrame { bytes, frame_bytes } => write!(
                f,
                "{} bytes do not fill one {}-byte sample frame",
                bytes, frame_bytes
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SniffOutcome {
    Tabular(RawRecording),
    Binary(RawRecording),
    Failure {
        tabular: TabularRejection,
        binary: BinaryRejection,
    },
}

impl SniffOutcome {
    /// Collapse the outcome, turning a double rejection into `UnsupportedFormat`
    pub fn into_recording(self) -> Result<RawRecording> {
        match self {
            SniffOutcome::Tabular(rec) | SniffOutcome::Binary(rec) => Ok(rec),
            SniffOutcome::Failure { tabular, binary } => Err(PipelineError::UnsupportedFormat(
                format!("not a table ({}) and not a binary stream ({})", tabular, binary),
            )),
        }
    }
}

/// Tier 1: delimited text.
pub fn decode_tabular(
    bytes: &[u8],
    sample_rate: u32,
) -> std::result::Result<RawRecording, TabularRejection> {
    let table = parse_table(bytes).map_err(TabularRejection::Table)?;

    let selected = select_signal_columns(&table).map_err(|_| TabularRejection::NoSignalColumns)?;

    let mut names = Vec::with_capacity(selected.len());
    let mut signals = Vec::with_capacity(selected.len());
    for idx in selected {
        let column = &table.columns[idx];
        let mut values = column
            .values
            .clone()
            .ok_or_else(|| TabularRejection::NonNumericColumn(column.name.clone()))?;
        sanitize_in_place(&mut values);
        names.push(column.name.clone());
        signals.push(values);
    }

    // Columns come from one table, so the matrix is rectangular by construction
    RawRecording::new(RecordingSource::Tabular, sample_rate as f64, names, signals)
        .map_err(|_| TabularRejection::NoSignalColumns)
}

/// Tier 2: interleaved little-endian i16 frames, `channels` samples per frame.
///
/// Trailing bytes that do not complete a frame are discarded.
pub fn decode_binary(
    bytes: &[u8],
    channels: usize,
    sample_rate: u32,
) -> std::result::Result<RawRecording, BinaryRejection> {
    if channels == 0 {
        return Err(BinaryRejection::NoChannels);
    }

    let frame_bytes = channels * 2;
    let num_samples = bytes.len() / frame_bytes;
    if num_samples == 0 {
        return Err(BinaryRejection::IncompleteFrame {
            bytes: bytes.len(),
            frame_bytes,
        });
    }

    let mut signals = vec![Vec::with_capacity(num_samples); channels];
    for frame in bytes[..num_samples * frame_bytes].chunks_exact(frame_bytes) {
        for (ch, sample) in frame.chunks_exact(2).enumerate() {
            signals[ch].push(LittleEndian::read_i16(sample) as f64);
        }
    }

    let names = (0..channels).map(|i| format!("Ch-{}", i + 1)).collect();

    RawRecording::new(RecordingSource::Binary, sample_rate as f64, names, signals).map_err(
        |_| BinaryRejection::IncompleteFrame {
            bytes: bytes.len(),
            frame_bytes,
        },
    )
}

/// Decode an arbitrary vendor export.
pub fn sniff(bytes: &[u8], config: &PipelineConfig) -> SniffOutcome {
    let sample_rate = extract_sample_rate(
        bytes,
        config.header_scan_bytes,
        config.default_sample_rate,
    );

    let tabular = match decode_tabular(bytes, sample_rate) {
        Ok(rec) => {
            log::debug!(
                "tier=tabular decoded {} channels x {} samples",
                rec.num_channels(),
                rec.num_samples()
            );
            return SniffOutcome::Tabular(rec);
        }
        Err(reason) => {
            log::debug!("tier=tabular rejected: {}", reason);
            reason
        }
    };

    // Raw streams always use the default rate, whatever a leading header says
    match decode_binary(bytes, config.binary_channel_count, config.default_sample_rate) {
        Ok(rec) => {
            log::debug!(
                "tier=binary decoded {} channels x {} samples",
                rec.num_channels(),
                rec.num_samples()
            );
            SniffOutcome::Binary(rec)
        }
        Err(binary) => {
            log::warn!(
                "tier=binary rejected after tabular failure: tabular={}, binary={}",
                tabular,
                binary
            );
            SniffOutcome::Failure { tabular, binary }
        }
    }
}
