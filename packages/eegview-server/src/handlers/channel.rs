use axum::{extract::Multipart, Json};
use eegview_core::{decode_edf, sanitize::sanitize, PipelineError};
use serde::{Deserialize, Serialize};

use super::{run_blocking, UploadForm};
use crate::error::ApiResult;

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelDataResponse {
    pub channel: String,
    pub sample_rate: f64,
    pub signal: Vec<f64>,
}

/// Full series of one channel, looked up by exact raw label
pub async fn edf_channel_data(multipart: Multipart) -> ApiResult<Json<ChannelDataResponse>> {
    let mut form = UploadForm::read(multipart).await?;
    let bytes = form.take_file()?;
    let channel = form
        .field("channel")
        .map(str::to_string)
        .ok_or_else(|| PipelineError::MissingInput("No channel specified".to_string()))?;

    tracing::info!("Channel data: file={:?}, channel={}", form.file_name, channel);

    let response = run_blocking(move || {
        let recording = decode_edf(&bytes)?;
        let signal = sanitize(recording.channel(&channel)?);
        Ok(ChannelDataResponse {
            channel,
            sample_rate: recording.sample_rate(),
            signal,
        })
    })
    .await?;

    Ok(Json(response))
}
