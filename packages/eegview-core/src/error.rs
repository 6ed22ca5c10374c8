use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No valid EEG signal columns found")]
    NoSignalColumns,

    #[error("Invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("Insufficient channels with known positions: found {found}, need at least {required}")]
    InsufficientChannels { found: usize, required: usize },

    #[error("Computation failed: {0}")]
    UpstreamComputation(String),
}

impl PipelineError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::MissingInput(_) => "MISSING_INPUT",
            PipelineError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            PipelineError::NoSignalColumns => "NO_SIGNAL_COLUMNS",
            PipelineError::InvalidChannel(_) => "INVALID_CHANNEL",
            PipelineError::InsufficientChannels { .. } => "INSUFFICIENT_CHANNELS",
            PipelineError::UpstreamComputation(_) => "UPSTREAM_COMPUTATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
