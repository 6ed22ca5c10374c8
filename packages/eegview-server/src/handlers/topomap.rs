use axum::{
    extract::{Multipart, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use eegview_core::{decode_upload, topomap_for_recording};
use std::sync::Arc;

use super::{run_blocking, UploadForm};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const TOPOMAP_FREQUENCY_HEADER: HeaderName = HeaderName::from_static("x-topomap-frequency");
pub const TOPOMAP_CHANNELS_HEADER: HeaderName = HeaderName::from_static("x-topomap-channels");

/// Scalp map of spectral power at one frequency, as PNG
pub async fn topomap(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let mut form = UploadForm::read(multipart).await?;
    let bytes = form.take_file()?;

    let frequency = match form.field("frequency") {
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid frequency '{}'", raw)))?,
        None => state.pipeline().default_topomap_frequency,
    };

    tracing::info!(
        "Topomap: file={:?}, {} bytes, frequency={} Hz",
        form.file_name,
        bytes.len(),
        frequency
    );

    let file_name = form.file_name.take();
    let image = run_blocking(move || {
        let recording = decode_upload(file_name.as_deref(), &bytes, state.pipeline())?;
        topomap_for_recording(&recording, frequency, state.pipeline(), &state.catalog)
    })
    .await?;

    let frequency_value = HeaderValue::from_str(&image.frequency.to_string())
        .map_err(|e| ApiError::InternalError(format!("Invalid frequency header: {}", e)))?;
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
        (TOPOMAP_FREQUENCY_HEADER, frequency_value),
        (TOPOMAP_CHANNELS_HEADER, HeaderValue::from(image.channels)),
    ];

    Ok((headers, image.png).into_response())
}
