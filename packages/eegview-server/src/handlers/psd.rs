use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use eegview_core::{compute_psd, FrequencyBand, PipelineError, SpectralResult};
use serde::Deserialize;
use std::sync::Arc;

use super::run_blocking;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PsdRequest {
    #[serde(default)]
    pub signals: Vec<Vec<f64>>,
    pub sample_rate: Option<f64>,
    pub fmin: Option<f64>,
    pub fmax: Option<f64>,
}

/// Welch PSD of every submitted channel, restricted to the requested band
pub async fn psd(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PsdRequest>, JsonRejection>,
) -> ApiResult<Json<SpectralResult>> {
    let Json(request) = payload?;

    if request.signals.is_empty() {
        return Err(PipelineError::MissingInput("No channels selected for PSD".to_string()).into());
    }
    let sample_rate = request
        .sample_rate
        .ok_or_else(|| PipelineError::MissingInput("No sample_rate provided".to_string()))?;

    let defaults = state.pipeline().psd_band;
    let band = FrequencyBand::new(
        request.fmin.unwrap_or(defaults.fmin),
        request.fmax.unwrap_or(defaults.fmax),
    );
    let window_cap = state.pipeline().welch_window_cap;

    tracing::info!(
        "PSD: {} channels at {} Hz, band {}-{} Hz",
        request.signals.len(),
        sample_rate,
        band.fmin,
        band.fmax
    );

    let signals = request.signals;
    let result = run_blocking(move || compute_psd(&signals, sample_rate, band, window_cap)).await?;

    Ok(Json(result))
}
