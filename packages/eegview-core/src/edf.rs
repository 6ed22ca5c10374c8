// EDF / EDF+ / BDF container decoding from an in-memory upload
// Specification: https://www.edfplus.info/specs/edf.html
// BDF differs only in its 0xFF version byte and 24-bit samples

use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;
use std::io::{Cursor, Read};

use crate::error::{PipelineError, Result};
use crate::sanitize::sanitize_in_place;
use crate::types::{RawRecording, RecordingSource};

const FIXED_HEADER_BYTES: usize = 256;
const SIGNAL_HEADER_BYTES: usize = 256;

#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub header_bytes: usize,          // 8 bytes
    pub num_data_records: i64,        // 8 bytes: -1 if unknown
    pub duration_of_data_record: f64, // 8 bytes, seconds
    pub num_signals: usize,           // 4 bytes
}

#[derive(Debug, Clone)]
pub struct EdfSignalHeader {
    pub label: String,
    pub physical_dimension: String,
    pub physical_minimum: f64,
    pub physical_maximum: f64,
    pub digital_minimum: i64,
    pub digital_maximum: i64,
    pub num_samples_per_record: usize,
}

impl EdfSignalHeader {
    pub fn sample_frequency(&self, record_duration: f64) -> f64 {
        self.num_samples_per_record as f64 / record_duration
    }

    pub fn gain(&self) -> f64 {
        let digital_range = (self.digital_maximum - self.digital_minimum) as f64;
        if digital_range == 0.0 {
            return 1.0;
        }
        (self.physical_maximum - self.physical_minimum) / digital_range
    }

    pub fn offset(&self) -> f64 {
        self.physical_maximum - self.gain() * self.digital_maximum as f64
    }

    pub fn is_annotation(&self) -> bool {
        self.label == "EDF Annotations"
    }
}

/// Parsed container held entirely in memory
pub struct EdfFile<'a> {
    pub header: EdfHeader,
    pub signal_headers: Vec<EdfSignalHeader>,
    /// 2 for EDF, 3 for BDF
    sample_bytes: usize,
    data: &'a [u8],
}

fn malformed(msg: impl Into<String>) -> PipelineError {
    PipelineError::UnsupportedFormat(format!("Malformed EDF header: {}", msg.into()))
}

fn read_fixed_string<R: Read>(reader: &mut R, size: usize) -> Result<String> {
    let mut buffer = vec![0u8; size];
    reader
        .read_exact(&mut buffer)
        .map_err(|e| malformed(format!("truncated field: {}", e)))?;
    Ok(String::from_utf8_lossy(&buffer).trim().to_string())
}

fn skip_bytes<R: Read>(reader: &mut R, size: usize) -> Result<()> {
    let skipped = std::io::copy(&mut reader.by_ref().take(size as u64), &mut std::io::sink())
        .map_err(|e| malformed(format!("truncated field: {}", e)))?;
    if skipped < size as u64 {
        return Err(malformed("truncated field"));
    }
    Ok(())
}

fn read_number<R: Read, T: std::str::FromStr>(reader: &mut R, size: usize, field: &str) -> Result<T> {
    let s = read_fixed_string(reader, size)?;
    s.parse::<T>()
        .map_err(|_| malformed(format!("invalid {} '{}'", field, s)))
}

impl<'a> EdfFile<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < FIXED_HEADER_BYTES {
            return Err(malformed(format!(
                "{} bytes is shorter than the fixed header",
                bytes.len()
            )));
        }

        let sample_bytes = if bytes[0] == 0xFF { 3 } else { 2 };
        let mut reader = Cursor::new(bytes);
        let header = Self::read_header(&mut reader)?;

        let expected_header_bytes = FIXED_HEADER_BYTES + header.num_signals * SIGNAL_HEADER_BYTES;
        if header.header_bytes != expected_header_bytes || bytes.len() < expected_header_bytes {
            return Err(malformed(format!(
                "header declares {} bytes for {} signals",
                header.header_bytes, header.num_signals
            )));
        }

        let signal_headers = Self::read_signal_headers(&mut reader, header.num_signals)?;

        Ok(Self {
            header,
            signal_headers,
            sample_bytes,
            data: &bytes[expected_header_bytes..],
        })
    }

    fn read_header<R: Read>(reader: &mut R) -> Result<EdfHeader> {
        // version, patient, recording, start date, start time
        skip_bytes(reader, 8 + 80 + 80 + 8 + 8)?;
        let header_bytes = read_number::<_, usize>(reader, 8, "header bytes")?;
        // reserved ("EDF+C" / "EDF+D")
        skip_bytes(reader, 44)?;
        let num_data_records = read_number::<_, i64>(reader, 8, "number of data records")?;
        let duration_of_data_record = read_number::<_, f64>(reader, 8, "record duration")?;
        let num_signals = read_number::<_, usize>(reader, 4, "number of signals")?;

        if !(duration_of_data_record.is_finite() && duration_of_data_record > 0.0) {
            return Err(malformed(format!(
                "record duration {} is not positive",
                duration_of_data_record
            )));
        }
        if num_signals == 0 {
            return Err(malformed("no signals declared"));
        }

        log::debug!(
            "EDF header parsed: num_data_records={}, duration_of_data_record={}, num_signals={}",
            num_data_records,
            duration_of_data_record,
            num_signals
        );

        Ok(EdfHeader {
            header_bytes,
            num_data_records,
            duration_of_data_record,
            num_signals,
        })
    }

    // Signal header fields are stored column-wise: all labels, then all transducers, ...
    fn read_signal_headers<R: Read>(reader: &mut R, n: usize) -> Result<Vec<EdfSignalHeader>> {
        let mut read_strings = |size: usize| -> Result<Vec<String>> {
            (0..n).map(|_| read_fixed_string(reader, size)).collect()
        };

        let labels = read_strings(16)?;
        let _transducers = read_strings(80)?;
        let dimensions = read_strings(8)?;
        let physical_minimums = read_strings(8)?;
        let physical_maximums = read_strings(8)?;
        let digital_minimums = read_strings(8)?;
        let digital_maximums = read_strings(8)?;
        let _prefiltering = read_strings(80)?;
        let samples_per_record = read_strings(8)?;
        let _reserved = read_strings(32)?;

        fn parse<T: std::str::FromStr>(values: &[String], i: usize, field: &str) -> Result<T> {
            values[i]
                .parse::<T>()
                .map_err(|_| malformed(format!("invalid {} '{}' for signal {}", field, values[i], i)))
        }

        (0..n)
            .map(|i| {
                Ok(EdfSignalHeader {
                    label: labels[i].clone(),
                    physical_dimension: dimensions[i].clone(),
                    physical_minimum: parse(&physical_minimums, i, "physical minimum")?,
                    physical_maximum: parse(&physical_maximums, i, "physical maximum")?,
                    digital_minimum: parse(&digital_minimums, i, "digital minimum")?,
                    digital_maximum: parse(&digital_maximums, i, "digital maximum")?,
                    num_samples_per_record: parse(&samples_per_record, i, "samples per record")?,
                })
            })
            .collect()
    }

    /// Bytes occupied by one data record across all signals
    pub fn record_size(&self) -> usize {
        self.signal_headers
            .iter()
            .map(|sh| sh.num_samples_per_record * self.sample_bytes)
            .sum()
    }

    /// Number of complete data records present in the buffer.
    ///
    /// A declared count larger than what the buffer holds is clamped.
    pub fn available_records(&self) -> usize {
        let record_size = self.record_size();
        if record_size == 0 {
            return 0;
        }
        let present = self.data.len() / record_size;
        match usize::try_from(self.header.num_data_records) {
            Ok(declared) => declared.min(present),
            Err(_) => present,
        }
    }

    /// Rate of the first data signal; annotation channels carry no samples
    pub fn sample_rate(&self) -> f64 {
        self.signal_headers
            .iter()
            .find(|sh| !sh.is_annotation())
            .map(|sh| sh.sample_frequency(self.header.duration_of_data_record))
            .unwrap_or(0.0)
    }

    /// Indices of the signals sampled at the recording's rate
    pub fn uniform_signals(&self) -> Vec<usize> {
        let rate = self.sample_rate();
        let record_duration = self.header.duration_of_data_record;
        self.signal_headers
            .iter()
            .enumerate()
            .filter(|(idx, sh)| {
                let keep = !sh.is_annotation()
                    && (sh.sample_frequency(record_duration) - rate).abs() < 1e-9;
                if !keep {
                    log::debug!(
                        "Excluding EDF signal {} '{}' at {} Hz (recording rate {} Hz)",
                        idx,
                        sh.label,
                        sh.sample_frequency(record_duration),
                        rate
                    );
                }
                keep
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Physical samples of one signal across every complete record
    pub fn read_physical_signal(&self, signal_index: usize) -> Result<Vec<f64>> {
        let sh = self
            .signal_headers
            .get(signal_index)
            .ok_or_else(|| PipelineError::InvalidChannel(format!("signal {}", signal_index)))?;

        let record_size = self.record_size();
        let offset_in_record: usize = self.signal_headers[..signal_index]
            .iter()
            .map(|h| h.num_samples_per_record * self.sample_bytes)
            .sum();
        let n = sh.num_samples_per_record;
        let width = self.sample_bytes;
        let gain = sh.gain();
        let offset = sh.offset();

        let records = self.available_records();
        let mut out = Vec::with_capacity(records * n);
        for record_idx in 0..records {
            let start = record_idx * record_size + offset_in_record;
            let block = &self.data[start..start + n * width];
            out.extend(block.chunks_exact(width).map(|sample| {
                let digital = if width == 3 {
                    LittleEndian::read_i24(sample)
                } else {
                    LittleEndian::read_i16(sample) as i32
                };
                gain * digital as f64 + offset
            }));
        }

        sanitize_in_place(&mut out);
        Ok(out)
    }
}

/// Decode an EDF upload into a rectangular recording.
pub fn decode_edf(bytes: &[u8]) -> Result<RawRecording> {
    let edf = EdfFile::parse(bytes)?;

    let declared = edf.header.num_data_records;
    let available = edf.available_records();
    if declared >= 0 && (declared as usize) > available {
        log::debug!(
            "EDF declares {} records, {} complete records present",
            declared,
            available
        );
    }

    let kept = edf.uniform_signals();
    if kept.is_empty() {
        return Err(PipelineError::UnsupportedFormat(
            "EDF contains no data signals".to_string(),
        ));
    }

    // Parallel conversion of digital to physical values across channels
    let signals = kept
        .par_iter()
        .map(|&idx| edf.read_physical_signal(idx))
        .collect::<Result<Vec<_>>>()?;

    let names = kept
        .iter()
        .map(|&idx| edf.signal_headers[idx].label.clone())
        .collect();

    RawRecording::new(RecordingSource::Container, edf.sample_rate(), names, signals)
}


#[cfg(test)]
mod tests {
    use super::test_support::build_edf;
    use super::*;

    #[test]
    fn test_decode_two_signals() {
        let a: Vec<i16> = (0..20).collect();
        let b: Vec<i16> = (0..20).map(|x| -x).collect();
        let bytes = build_edf(1.0, &[("EEG Fp1-Ref", 10, a), ("EEG Cz-Ref", 10, b)]);

        let rec = decode_edf(&bytes).unwrap();
        assert_eq!(rec.source(), RecordingSource::Container);
        assert_eq!(rec.sample_rate(), 10.0);
        assert_eq!(rec.channel_names(), &["EEG Fp1-Ref", "EEG Cz-Ref"]);
        assert_eq!(rec.num_samples(), 20);
        // Identity scaling: physical range equals digital range
        assert!((rec.signals()[0][5] - 5.0).abs() < 1e-9);
        assert!((rec.signals()[1][19] + 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_signals_at_other_rates_excluded() {
        let bytes = build_edf(
            1.0,
            &[
                ("Fp1", 8, vec![1; 16]),
                ("Accel", 2, vec![0; 4]),
                ("O2", 8, vec![2; 16]),
            ],
        );
        let rec = decode_edf(&bytes).unwrap();
        assert_eq!(rec.channel_names(), &["Fp1", "O2"]);
        assert_eq!(rec.num_samples(), 16);
    }

    #[test]
    fn test_truncated_record_dropped() {
        let mut bytes = build_edf(0.5, &[("Fp1", 4, vec![7; 12])]);
        bytes.truncate(bytes.len() - 3);
        let rec = decode_edf(&bytes).unwrap();
        assert_eq!(rec.sample_rate(), 8.0);
        assert_eq!(rec.num_samples(), 8);
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            decode_edf(b"not an edf"),
            Err(PipelineError::UnsupportedFormat(_))
        ));

        let mut bytes = build_edf(1.0, &[("Fp1", 4, vec![0; 4])]);
        bytes[236..244].copy_from_slice(b"abc     ");
        assert!(matches!(
            decode_edf(&bytes),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_header_length_read_after_identification_fields() {
        // Free-text identification fields are skipped, the header length at 184 is checked
        let mut bytes = build_edf(1.0, &[("Fp1", 4, vec![3; 4])]);
        bytes[8..16].copy_from_slice(b"~patient");
        assert_eq!(decode_edf(&bytes).unwrap().num_samples(), 4);

        bytes[184..192].copy_from_slice(b"9999    ");
        assert!(matches!(
            decode_edf(&bytes),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }
}
