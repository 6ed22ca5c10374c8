//! Zero-phase IIR filtering.
//!
//! Filters are cascades of second-order sections (biquads) designed by
//! bilinear transform. Every filter is applied forward and then backward so
//! the output has no phase shift, doubling the effective order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{PipelineError, Result};
use crate::sanitize::{sanitize, sanitize_in_place};

/// Butterworth order of each pass
pub const BUTTERWORTH_ORDER: usize = 4;

/// Quality factor of every notch
pub const NOTCH_Q: f64 = 30.0;

/// Biquad coefficients, normalized so a0 = 1.
/// H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Cascade of biquads with its own Direct Form II Transposed state
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<Biquad>,
    state: Vec<[f64; 2]>,
}

impl SosFilter {
    pub fn new(sections: Vec<Biquad>) -> Self {
        let state = vec![[0.0; 2]; sections.len()];
        Self { sections, state }
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Append another filter's sections after this one's
    pub fn chain(mut self, other: SosFilter) -> Self {
        self.sections.extend(other.sections);
        self.state = vec![[0.0; 2]; self.sections.len()];
        self
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut x = input;
        for (c, z) in self.sections.iter().zip(self.state.iter_mut()) {
            let y = c.b0 * x + z[0];
            z[0] = c.b1 * x - c.a1 * y + z[1];
            z[1] = c.b2 * x - c.a2 * y;
            x = y;
        }
        x
    }

    pub fn reset(&mut self) {
        for z in &mut self.state {
            *z = [0.0; 2];
        }
    }

    /// Single causal pass over `signal`, starting from rest
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        self.reset();
        signal.iter().map(|&s| self.process(s)).collect()
    }

    /// Forward-backward pass with odd reflection at both ends to absorb
    /// start-up transients.
    pub fn filtfilt(&mut self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = (3 * (2 * self.sections.len() + 1)).min(n - 1);

        let first = signal[0];
        let last = signal[n - 1];
        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        let mut forward = self.filter(&extended);
        forward.reverse();
        let mut backward = self.filter(&forward);
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }
}

// Bilinear-transform design on the prewarped cutoff
fn prewarp(freq: f64, sample_rate: f64) -> f64 {
    (PI * freq / sample_rate).tan()
}

/// Damping terms of the Butterworth pole pairs; odd orders add one real pole
fn butterworth_damping(order: usize) -> (Vec<f64>, bool) {
    let damping = (0..order / 2)
        .map(|k| 2.0 * (PI * (2 * k + 1) as f64 / (2 * order) as f64).sin())
        .collect();
    (damping, order % 2 == 1)
}

pub fn butterworth_lowpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
    let w = prewarp(cutoff, sample_rate);
    let w2 = w * w;
    let (damping, real_pole) = butterworth_damping(order);

    let mut sections: Vec<Biquad> = damping
        .into_iter()
        .map(|d| {
            let a0 = 1.0 + d * w + w2;
            Biquad {
                b0: w2 / a0,
                b1: 2.0 * w2 / a0,
                b2: w2 / a0,
                a1: 2.0 * (w2 - 1.0) / a0,
                a2: (1.0 - d * w + w2) / a0,
            }
        })
        .collect();
    if real_pole {
        let k = w / (1.0 + w);
        sections.push(Biquad {
            b0: k,
            b1: k,
            b2: 0.0,
            a1: (w - 1.0) / (w + 1.0),
            a2: 0.0,
        });
    }
    SosFilter::new(sections)
}

pub fn butterworth_highpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
    let w = prewarp(cutoff, sample_rate);
    let w2 = w * w;
    let (damping, real_pole) = butterworth_damping(order);

    let mut sections: Vec<Biquad> = damping
        .into_iter()
        .map(|d| {
            let a0 = 1.0 + d * w + w2;
            Biquad {
                b0: 1.0 / a0,
                b1: -2.0 / a0,
                b2: 1.0 / a0,
                a1: 2.0 * (w2 - 1.0) / a0,
                a2: (1.0 - d * w + w2) / a0,
            }
        })
        .collect();
    if real_pole {
        let k = 1.0 / (1.0 + w);
        sections.push(Biquad {
            b0: k,
            b1: -k,
            b2: 0.0,
            a1: (w - 1.0) / (w + 1.0),
            a2: 0.0,
        });
    }
    SosFilter::new(sections)
}

/// Highpass at `low` cascaded with lowpass at `high`
pub fn butterworth_bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> SosFilter {
    butterworth_highpass(low, sample_rate, order).chain(butterworth_lowpass(high, sample_rate, order))
}

/// Second-order band-reject at `center` Hz
pub fn notch(center: f64, sample_rate: f64, q: f64) -> SosFilter {
    let w0 = 2.0 * PI * center / sample_rate;
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    SosFilter::new(vec![Biquad {
        b0: 1.0 / a0,
        b1: -2.0 * w0.cos() / a0,
        b2: 1.0 / a0,
        a1: -2.0 * w0.cos() / a0,
        a2: (1.0 - alpha) / a0,
    }])
}

/// One frequency or several, as sent by clients for `low`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrequencyList {
    Single(f64),
    Many(Vec<f64>),
}

impl FrequencyList {
    pub fn values(&self) -> Vec<f64> {
        match self {
            FrequencyList::Single(f) => vec![*f],
            FrequencyList::Many(fs) => fs.clone(),
        }
    }

    /// The single cutoff, or the first of a list
    pub fn first(&self) -> Option<f64> {
        match self {
            FrequencyList::Single(f) => Some(*f),
            FrequencyList::Many(fs) => fs.first().copied(),
        }
    }
}

/// A fully specified filter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    Notch { freqs: Vec<f64> },
    Bandpass { low: f64, high: f64 },
    Highpass { cutoff: f64 },
    Lowpass { cutoff: f64 },
}

impl FilterSpec {
    /// Resolve a client's `filter_type` and optional bounds.
    ///
    /// `notch` removes every frequency listed in `low`. The pass filters pick
    /// their shape from which bounds are present.
    pub fn from_request(
        filter_type: &str,
        low: Option<&FrequencyList>,
        high: Option<f64>,
    ) -> Result<Self> {
        match filter_type.to_lowercase().as_str() {
            "notch" => {
                let freqs = low.map(|l| l.values()).unwrap_or_default();
                if freqs.is_empty() {
                    return Err(PipelineError::MissingInput(
                        "Notch filter requires at least one frequency in 'low'".to_string(),
                    ));
                }
                Ok(FilterSpec::Notch { freqs })
            }
            "bandpass" | "highpass" | "lowpass" => {
                match (low.and_then(FrequencyList::first), high) {
                    (Some(low), Some(high)) => Ok(FilterSpec::Bandpass { low, high }),
                    (Some(cutoff), None) => Ok(FilterSpec::Highpass { cutoff }),
                    (None, Some(cutoff)) => Ok(FilterSpec::Lowpass { cutoff }),
                    (None, None) => Err(PipelineError::MissingInput(
                        "Filter requires 'low' and/or 'high' cutoff".to_string(),
                    )),
                }
            }
            other => Err(PipelineError::MissingInput(format!(
                "Unknown filter_type '{}', expected 'notch' or 'bandpass'",
                other
            ))),
        }
    }

    /// Design the cascade for `sample_rate`, checking every edge is below Nyquist.
    pub fn design(&self, sample_rate: f64) -> Result<SosFilter> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PipelineError::UpstreamComputation(format!(
                "Invalid sample rate {}",
                sample_rate
            )));
        }
        let nyquist = sample_rate / 2.0;
        let check = |name: &str, f: f64| -> Result<f64> {
            if f.is_finite() && f > 0.0 && f < nyquist {
                Ok(f)
            } else {
                Err(PipelineError::UpstreamComputation(format!(
                    "{} frequency ({} Hz) must be between 0 and Nyquist ({} Hz)",
                    name, f, nyquist
                )))
            }
        };

        match self {
            FilterSpec::Notch { freqs } => {
                let mut sections = Vec::with_capacity(freqs.len());
                for &f in freqs {
                    let f = check("Notch", f)?;
                    sections.extend_from_slice(notch(f, sample_rate, NOTCH_Q).sections());
                }
                Ok(SosFilter::new(sections))
            }
            FilterSpec::Bandpass { low, high } => {
                let low = check("Low cutoff", *low)?;
                let high = check("High cutoff", *high)?;
                if low >= high {
                    return Err(PipelineError::UpstreamComputation(format!(
                        "Low cutoff ({} Hz) must be less than high cutoff ({} Hz)",
                        low, high
                    )));
                }
                Ok(butterworth_bandpass(low, high, sample_rate, BUTTERWORTH_ORDER))
            }
            FilterSpec::Highpass { cutoff } => Ok(butterworth_highpass(
                check("Cutoff", *cutoff)?,
                sample_rate,
                BUTTERWORTH_ORDER,
            )),
            FilterSpec::Lowpass { cutoff } => Ok(butterworth_lowpass(
                check("Cutoff", *cutoff)?,
                sample_rate,
                BUTTERWORTH_ORDER,
            )),
        }
    }
}

/// Zero-phase filter every channel; input and output are sanitized.
pub fn apply_filter(
    signals: &[Vec<f64>],
    sample_rate: f64,
    spec: &FilterSpec,
) -> Result<Vec<Vec<f64>>> {
    if signals.is_empty() {
        return Err(PipelineError::MissingInput("No signals provided".to_string()));
    }
    let design = spec.design(sample_rate)?;

    log::debug!(
        "Filtering {} channels at {} Hz with {:?} ({} sections)",
        signals.len(),
        sample_rate,
        spec,
        design.sections().len()
    );

    Ok(signals
        .par_iter()
        .map(|signal| {
            let mut filter = design.clone();
            let mut out = filter.filtfilt(&sanitize(signal));
            sanitize_in_place(&mut out);
            out
        })
        .collect())
}
