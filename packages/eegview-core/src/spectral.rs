//! Welch power spectral density estimation.
//!
//! Segments of `nperseg` samples with no overlap are Hamming windowed,
//! mean-detrended and transformed; the one-sided periodograms are averaged.
//! `nperseg` is the configured cap clamped to the recording length, so short
//! recordings still produce a (coarser) spectrum.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::cell::RefCell;
use std::f64::consts::PI;

use crate::config::FrequencyBand;
use crate::error::{PipelineError, Result};
use crate::sanitize::{sanitize, sanitize_in_place};
use crate::types::SpectralResult;

// Thread-local FFT planner for reuse across parallel channel computations
thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Segment length actually used for `n_samples` under a `cap`
pub fn effective_window(n_samples: usize, cap: usize) -> usize {
    cap.min(n_samples)
}

/// Periodic Hamming window
fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// One-sided frequency axis for an `n_fft`-point transform
pub fn rfft_frequencies(n_fft: usize, sample_rate: f64) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate / n_fft as f64)
        .collect()
}

/// Welch density of one signal over the full one-sided axis.
pub fn welch(signal: &[f64], sample_rate: f64, nperseg: usize) -> Vec<f64> {
    let n_bins = nperseg / 2 + 1;
    let n_segments = if nperseg == 0 { 0 } else { signal.len() / nperseg };
    if n_segments == 0 {
        return vec![0.0; n_bins];
    }

    let window = hamming(nperseg);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sample_rate * window_power);

    let fft = FFT_PLANNER.with(|planner| planner.borrow_mut().plan_fft_forward(nperseg));

    let mut accum = vec![0.0; n_bins];
    let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];

    for segment in signal.chunks_exact(nperseg).take(n_segments) {
        let mean = segment.iter().sum::<f64>() / nperseg as f64;
        for ((slot, &x), &w) in buffer.iter_mut().zip(segment).zip(&window) {
            *slot = Complex::new((x - mean) * w, 0.0);
        }

        fft.process(&mut buffer);

        for (k, acc) in accum.iter_mut().enumerate() {
            let mut p = buffer[k].norm_sqr() * scale;
            // Fold negative frequencies; DC and Nyquist have no mirror
            let is_nyquist = nperseg % 2 == 0 && k == nperseg / 2;
            if k != 0 && !is_nyquist {
                p *= 2.0;
            }
            *acc += p;
        }
    }

    for acc in accum.iter_mut() {
        *acc /= n_segments as f64;
    }
    accum
}

/// Index of the frequency closest to `target`; ties go to the lower index.
pub fn nearest_bin(freqs: &[f64], target: f64) -> Option<usize> {
    if !target.is_finite() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (idx, &f) in freqs.iter().enumerate() {
        let dist = (f - target).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((idx, dist)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Band-limited PSD for every channel of a signal matrix.
pub fn compute_psd(
    signals: &[Vec<f64>],
    sample_rate: f64,
    band: FrequencyBand,
    window_cap: usize,
) -> Result<SpectralResult> {
    if signals.is_empty() {
        return Err(PipelineError::MissingInput(
            "No channels selected for PSD".to_string(),
        ));
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(PipelineError::UpstreamComputation(format!(
            "Invalid sample rate {} for spectral estimation",
            sample_rate
        )));
    }

    let n_samples = signals.iter().map(|s| s.len()).min().unwrap_or(0);
    let nperseg = effective_window(n_samples, window_cap);
    if nperseg < 2 {
        return Err(PipelineError::UpstreamComputation(format!(
            "{} samples are too few for spectral estimation",
            n_samples
        )));
    }

    let all_freqs = rfft_frequencies(nperseg, sample_rate);
    let keep: Vec<usize> = all_freqs
        .iter()
        .enumerate()
        .filter(|(_, f)| band.contains(**f))
        .map(|(i, _)| i)
        .collect();
    if keep.is_empty() {
        return Err(PipelineError::UpstreamComputation(format!(
            "No frequency bins between {} and {} Hz at {} Hz sampling with {}-sample windows",
            band.fmin, band.fmax, sample_rate, nperseg
        )));
    }

    log::debug!(
        "Welch PSD: channels={}, samples={}, nperseg={}, bins={}",
        signals.len(),
        n_samples,
        nperseg,
        keep.len()
    );

    let psd: Vec<Vec<f64>> = signals
        .par_iter()
        .map(|signal| {
            let clean = sanitize(&signal[..n_samples]);
            let full = welch(&clean, sample_rate, nperseg);
            let mut row: Vec<f64> = keep.iter().map(|&i| full[i]).collect();
            sanitize_in_place(&mut row);
            row
        })
        .collect();

    let freqs = keep.iter().map(|&i| all_freqs[i]).collect();

    Ok(SpectralResult { freqs, psd })
}

/// Spectral estimation with fixed window cap and default band.
#[derive(Debug, Clone, Copy)]
pub struct SpectralAnalyzer {
    pub window_cap: usize,
    pub band: FrequencyBand,
}

impl SpectralAnalyzer {
    pub fn new(window_cap: usize, band: FrequencyBand) -> Self {
        Self { window_cap, band }
    }

    pub fn psd(&self, signals: &[Vec<f64>], sample_rate: f64) -> Result<SpectralResult> {
        compute_psd(signals, sample_rate, self.band, self.window_cap)
    }

    /// Power of every channel at the bin nearest `target`, with that bin's frequency
    pub fn power_at(
        &self,
        signals: &[Vec<f64>],
        sample_rate: f64,
        target: f64,
    ) -> Result<(f64, Vec<f64>)> {
        let spectrum = self.psd(signals, sample_rate)?;
        let bin = spectrum.nearest_bin(target).ok_or_else(|| {
            PipelineError::UpstreamComputation(format!("No frequency bin near {} Hz", target))
        })?;
        Ok((spectrum.freqs[bin], spectrum.power_at(bin)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_effective_window_clamped() {
        assert_eq!(effective_window(500, 2048), 500);
        assert_eq!(effective_window(10_000, 2048), 2048);
    }

    #[test]
    fn test_short_recording_still_produces_spectrum() {
        let signals = vec![sine(10.0, 100.0, 500)];
        let result = compute_psd(&signals, 100.0, FrequencyBand::new(0.5, 50.0), 2048).unwrap();
        // 500-sample window at 100 Hz gives 0.2 Hz resolution
        assert!((result.freqs[1] - result.freqs[0] - 0.2).abs() < 1e-9);
        assert_eq!(result.psd.len(), 1);
        assert_eq!(result.psd[0].len(), result.freqs.len());
    }

    #[test]
    fn test_nearest_bin_tie_goes_low() {
        let freqs: Vec<f64> = (0..=25).map(|k| 2.0 * k as f64).collect();
        let idx = nearest_bin(&freqs, 11.0).unwrap();
        assert_eq!(freqs[idx], 10.0);
        assert_eq!(nearest_bin(&freqs, 11.5).map(|i| freqs[i]), Some(12.0));
        assert_eq!(nearest_bin(&[], 11.0), None);
        assert_eq!(nearest_bin(&freqs, f64::NAN), None);
    }

    #[test]
    fn test_peak_at_signal_frequency() {
        let fs = 256.0;
        let signals = vec![sine(10.0, fs, 4096), sine(20.0, fs, 4096)];
        let result = compute_psd(&signals, fs, FrequencyBand::new(1.0, 40.0), 2048).unwrap();

        for (row, expected) in result.psd.iter().zip([10.0, 20.0]) {
            let peak = row
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| result.freqs[i])
                .unwrap();
            assert!((peak - expected).abs() < 0.5, "peak at {}", peak);
        }
    }

    #[test]
    fn test_power_outside_band_excluded() {
        // Alternating +-1 puts all power at Nyquist; the band excludes it
        let signal: Vec<f64> = (0..1024).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let result =
            compute_psd(&[signal], 100.0, FrequencyBand::new(0.5, 40.0), 256).unwrap();
        assert!(result.psd[0].iter().all(|&p| p < 1e-3));
    }

    #[test]
    fn test_non_finite_input_sanitized() {
        let mut signal = sine(5.0, 50.0, 200);
        signal[3] = f64::NAN;
        signal[7] = f64::INFINITY;
        let result = compute_psd(&[signal], 50.0, FrequencyBand::new(0.5, 25.0), 2048).unwrap();
        assert!(result.psd[0].iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_empty_input() {
        let result = compute_psd(&[], 100.0, FrequencyBand::new(0.5, 50.0), 2048);
        assert!(matches!(result, Err(PipelineError::MissingInput(_))));
    }

    #[test]
    fn test_analyzer_power_at() {
        let analyzer = SpectralAnalyzer::new(2048, FrequencyBand::new(1.0, 40.0));
        let signals = vec![sine(10.0, 200.0, 2000), vec![0.0; 2000]];
        let (freq, power) = analyzer.power_at(&signals, 200.0, 10.0).unwrap();
        assert!((freq - 10.0).abs() < 1e-9);
        assert!(power[0] > power[1]);
        assert_eq!(power[1], 0.0);
    }
}
