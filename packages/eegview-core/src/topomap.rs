//! Scalp power maps rendered to PNG.
//!
//! Electrode positions are flattened with an azimuthal equidistant
//! projection centred on the vertex (Cz at the centre, the equator on the
//! head outline). Values are spread over the disk by inverse distance
//! weighting and coloured with a viridis approximation.

use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use rayon::prelude::*;
use std::f64::consts::FRAC_PI_2;

use crate::canonical::canonicalize;
use crate::catalog::ElectrodeCatalog;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::montage::{resolve_positions, PositionedChannel};
use crate::sanitize::sanitize;
use crate::spectral::SpectralAnalyzer;
use crate::types::RawRecording;

/// Fraction of the image edge covered by the head radius
const HEAD_SCALE: f64 = 0.4;
const IDW_POWER: f64 = 2.0;
const MARKER_RADIUS: f64 = 3.0;
const OUTLINE_WIDTH: f64 = 1.5;

const BACKGROUND: [u8; 3] = [255, 255, 255];
const INK: [u8; 3] = [0, 0, 0];

/// Rendered map plus what it shows
#[derive(Debug, Clone)]
pub struct TopomapImage {
    pub png: Vec<u8>,
    /// Frequency of the spectral bin that was mapped (Hz)
    pub frequency: f64,
    /// Number of electrodes contributing values
    pub channels: usize,
}

/// Azimuthal equidistant projection of a head-centred position onto the unit disk.
///
/// +x is right, +y is toward the nose; points on the equator land on radius 1.
pub fn project(position: [f64; 3]) -> (f64, f64) {
    let [x, y, z] = position;
    let r = (x * x + y * y + z * z).sqrt();
    if r == 0.0 {
        return (0.0, 0.0);
    }
    let polar = (z / r).clamp(-1.0, 1.0).acos();
    let azimuth = y.atan2(x);
    let rho = polar / FRAC_PI_2;
    (rho * azimuth.cos(), rho * azimuth.sin())
}

/// Inverse distance weighted value at (x, y)
pub fn interpolate_idw(points: &[(f64, f64)], values: &[f64], x: f64, y: f64) -> f64 {
    let mut sum_weights = 0.0;
    let mut sum_values = 0.0;
    for (&(px, py), &v) in points.iter().zip(values) {
        let dist = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
        if dist < 1e-9 {
            return v;
        }
        let w = 1.0 / dist.powf(IDW_POWER);
        sum_weights += w;
        sum_values += w * v;
    }
    if sum_weights > 0.0 {
        sum_values / sum_weights
    } else {
        0.0
    }
}

/// Polynomial viridis approximation, `t` in [0, 1]
pub fn viridis(t: f64) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let r = (0.267 + t * (0.329 + t * (1.452 - t * 1.046))).clamp(0.0, 1.0);
    let g = t.sqrt();
    let b = (0.329 + t * (1.452 - t * 1.781)).clamp(0.0, 1.0);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Render `values` at `positions` into a `size` x `size` PNG.
pub fn render_topomap(positions: &[[f64; 3]], values: &[f64], size: u32) -> Result<Vec<u8>> {
    if positions.len() != values.len() || positions.is_empty() {
        return Err(PipelineError::UpstreamComputation(format!(
            "Topomap needs one value per electrode, got {} values for {} positions",
            values.len(),
            positions.len()
        )));
    }
    if size == 0 {
        return Err(PipelineError::UpstreamComputation(
            "Topomap image size must be positive".to_string(),
        ));
    }

    let values = sanitize(values);
    let points: Vec<(f64, f64)> = positions.iter().map(|&p| project(p)).collect();

    let vmin = values.iter().copied().fold(f64::INFINITY, f64::min);
    let vmax = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = vmax - vmin;

    let edge = size as f64;
    let centre = edge / 2.0;
    let radius = edge * HEAD_SCALE;

    // Pixel -> disk coordinates, nose up
    let to_disk = |px: f64, py: f64| ((px - centre) / radius, (centre - py) / radius);
    let to_pixel = |(x, y): (f64, f64)| (centre + x * radius, centre - y * radius);

    let nose_left = to_pixel((-0.1, 0.995));
    let nose_tip = to_pixel((0.0, 1.12));
    let nose_right = to_pixel((0.1, 0.995));
    let markers: Vec<(f64, f64)> = points.iter().map(|&p| to_pixel(p)).collect();

    let width = size as usize;
    let mut raw = vec![0u8; width * width * 3];

    raw.par_chunks_mut(width * 3)
        .enumerate()
        .for_each(|(row, pixels)| {
            let py = row as f64 + 0.5;
            for (col, pixel) in pixels.chunks_exact_mut(3).enumerate() {
                let px = col as f64 + 0.5;
                let (x, y) = to_disk(px, py);
                let d = (x * x + y * y).sqrt() * radius;

                let on_outline = (d - radius).abs() <= OUTLINE_WIDTH
                    || distance_to_segment((px, py), nose_left, nose_tip) <= OUTLINE_WIDTH / 2.0
                    || distance_to_segment((px, py), nose_tip, nose_right) <= OUTLINE_WIDTH / 2.0;
                let on_marker = markers.iter().any(|&(mx, my)| {
                    ((px - mx).powi(2) + (py - my).powi(2)).sqrt() <= MARKER_RADIUS
                });

                let color = if on_outline || on_marker {
                    INK
                } else if d < radius {
                    let v = interpolate_idw(&points, &values, x, y);
                    let t = if range > f64::EPSILON {
                        (v - vmin) / range
                    } else {
                        0.5
                    };
                    viridis(t)
                } else {
                    BACKGROUND
                };
                pixel.copy_from_slice(&color);
            }
        });

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&raw, size, size, ExtendedColorType::Rgb8)
        .map_err(|e| PipelineError::UpstreamComputation(format!("PNG encoding failed: {}", e)))?;

    Ok(png)
}

/// Map spectral power at `frequency` over the scalp for one recording.
pub fn topomap_for_recording(
    recording: &RawRecording,
    frequency: f64,
    config: &PipelineConfig,
    catalog: &ElectrodeCatalog,
) -> Result<TopomapImage> {
    let mapping = canonicalize(recording.channel_names(), catalog);
    let positioned: Vec<PositionedChannel> =
        resolve_positions(&mapping, catalog, config.min_topomap_channels)?;

    let signals: Vec<Vec<f64>> = positioned
        .iter()
        .map(|p| recording.signals()[p.index].clone())
        .collect();

    let analyzer = SpectralAnalyzer::new(config.welch_window_cap, config.topomap_band);
    let (selected, power) = analyzer.power_at(&signals, recording.sample_rate(), frequency)?;

    let positions: Vec<[f64; 3]> = positioned.iter().map(|p| p.position).collect();
    let png = render_topomap(&positions, &power, config.topomap_image_size)?;

    log::debug!(
        "Rendered topomap at {} Hz (requested {}) from {} electrodes",
        selected,
        frequency,
        positioned.len()
    );

    Ok(TopomapImage {
        png,
        frequency: selected,
        channels: positioned.len(),
    })
}
