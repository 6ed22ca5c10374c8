use axum::{
    extract::{Multipart, State},
    Json,
};
use eegview_core::{
    canonicalize, decode_edf, describe_channels, sanitize::sanitize_matrix_in_place, sniff,
    ChannelDescriptor,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{run_blocking, UploadForm};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct EdfPreviewResponse {
    pub sample_rate: f64,
    pub channel_names: Vec<String>,
    pub signals: Vec<Vec<f64>>,
    pub channels: Vec<ChannelDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextPreviewResponse {
    pub sample_rate: f64,
    pub channel_names: Vec<String>,
    pub duration: f64,
    pub signals: Vec<Vec<f64>>,
    pub source: String,
}

/// Decode an EDF/BDF upload and return its first samples per channel
pub async fn edf_preview(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<EdfPreviewResponse>> {
    let mut form = UploadForm::read(multipart).await?;
    let bytes = form.take_file()?;
    tracing::info!(
        "EDF preview: file={:?}, {} bytes",
        form.file_name,
        bytes.len()
    );

    let response = run_blocking(move || {
        let recording = decode_edf(&bytes)?;
        let mapping = canonicalize(recording.channel_names(), &state.catalog);
        let channels = describe_channels(recording.channel_names(), &mapping, &state.catalog);

        let mut signals = recording.truncated_signals(state.pipeline().container_preview_samples);
        sanitize_matrix_in_place(&mut signals);

        Ok(EdfPreviewResponse {
            sample_rate: recording.sample_rate(),
            channel_names: recording.channel_names().to_vec(),
            signals,
            channels,
        })
    })
    .await?;

    Ok(Json(response))
}

/// Decode a text export or headerless binary stream through the sniffer
pub async fn txt_preview(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<TextPreviewResponse>> {
    let mut form = UploadForm::read(multipart).await?;
    let bytes = form.take_file()?;
    tracing::info!(
        "Text preview: file={:?}, {} bytes",
        form.file_name,
        bytes.len()
    );

    let response = run_blocking(move || {
        let recording = sniff(&bytes, state.pipeline()).into_recording()?;
        let preview_len = state
            .pipeline()
            .text_preview_samples(recording.sample_rate())
            .min(recording.num_samples());

        let mut signals = recording.truncated_signals(preview_len);
        sanitize_matrix_in_place(&mut signals);

        Ok(TextPreviewResponse {
            sample_rate: recording.sample_rate(),
            channel_names: recording.channel_names().to_vec(),
            duration: preview_len as f64 / recording.sample_rate(),
            signals,
            source: recording.source().as_str().to_string(),
        })
    })
    .await?;

    Ok(Json(response))
}
