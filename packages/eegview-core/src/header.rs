//! Sample-rate recovery from free-text header bytes.

const SAMPLE_RATE_MARKER: &str = "sampling rate";

/// Decode the leading `scan_bytes` bytes as ASCII, dropping anything that is not.
pub fn header_text(bytes: &[u8], scan_bytes: usize) -> String {
    bytes[..bytes.len().min(scan_bytes)]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect()
}

/// Sample rate declared by a "sampling rate" line, if any.
///
/// All digits on the line are concatenated ("Sampling Rate: 2,048 Hz" reads
/// as 2048). The first line that yields a positive integer wins.
pub fn declared_sample_rate(bytes: &[u8], scan_bytes: usize) -> Option<u32> {
    let text = header_text(bytes, scan_bytes);

    text.split(['\n', '\r'])
        .filter(|line| line.to_lowercase().contains(SAMPLE_RATE_MARKER))
        .find_map(|line| {
            let digits: String = line.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok().filter(|&rate| rate > 0)
        })
}

/// Sample rate from the header, or `default_rate` when none is declared.
pub fn extract_sample_rate(bytes: &[u8], scan_bytes: usize, default_rate: u32) -> u32 {
    match declared_sample_rate(bytes, scan_bytes) {
        Some(rate) => rate,
        None => {
            log::debug!(
                "No sampling rate line in header, using default {} Hz",
                default_rate
            );
            default_rate
        }
    }
}
