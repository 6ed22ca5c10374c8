pub mod channel;
pub mod filter;
pub mod health;
pub mod preview;
pub mod psd;
pub mod topomap;

pub use channel::edf_channel_data;
pub use filter::filter_signal;
pub use health::{health_check, ping, root};
pub use preview::{edf_preview, txt_preview};
pub use psd::psd;
pub use topomap::topomap;

use axum::{body::Bytes, extract::Multipart};
use eegview_core::PipelineError;
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};

/// A multipart upload: the `file` part plus any text fields
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file_name: Option<String>,
    pub file: Option<Bytes>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(|s| s.to_string());
                    form.file = Some(field.bytes().await?);
                }
                _ => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// The uploaded bytes; absent or empty uploads are `MissingInput`
    pub fn take_file(&mut self) -> ApiResult<Bytes> {
        match self.file.take() {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(PipelineError::MissingInput("No file uploaded".to_string()).into()),
        }
    }

    /// A text field, trimmed; blank counts as absent
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Run CPU-bound pipeline work off the async executor.
pub(crate) async fn run_blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(work).await?;
    result.map_err(ApiError::from)
}
