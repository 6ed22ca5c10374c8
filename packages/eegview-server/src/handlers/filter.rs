use axum::{extract::rejection::JsonRejection, Json};
use eegview_core::{apply_filter, FilterSpec, FrequencyList, PipelineError};
use serde::{Deserialize, Serialize};

use super::run_blocking;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub signals: Vec<Vec<f64>>,
    pub sample_rate: Option<f64>,
    pub filter_type: Option<String>,
    #[serde(default, alias = "l_freq")]
    pub low: Option<FrequencyList>,
    #[serde(default, alias = "h_freq")]
    pub high: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilterResponse {
    pub filtered: Vec<Vec<f64>>,
}

pub async fn filter_signal(
    payload: Result<Json<FilterRequest>, JsonRejection>,
) -> ApiResult<Json<FilterResponse>> {
    let Json(request) = payload?;

    let sample_rate = request
        .sample_rate
        .ok_or_else(|| PipelineError::MissingInput("No sample_rate provided".to_string()))?;
    let filter_type = request
        .filter_type
        .as_deref()
        .ok_or_else(|| PipelineError::MissingInput("No filter_type provided".to_string()))?;
    let spec = FilterSpec::from_request(filter_type, request.low.as_ref(), request.high)?;

    tracing::info!(
        "Filter: {} channels at {} Hz, {:?}",
        request.signals.len(),
        sample_rate,
        spec
    );

    let signals = request.signals;
    let filtered = run_blocking(move || apply_filter(&signals, sample_rate, &spec)).await?;

    Ok(Json(FilterResponse { filtered }))
}
