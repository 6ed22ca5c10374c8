use clap::{Parser, Subcommand};
use eegview_core::{
    canonicalize, decode_upload, describe_channels, sanitize::sanitize, ChannelDescriptor,
    ElectrodeCatalog, PipelineConfig,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// EEGView Server - EEG upload preview and spectral analysis service
#[derive(Parser)]
#[command(name = "eegview-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve {
        /// Port to listen on, overriding PORT
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address, overriding BIND_ADDR
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Decode a local recording and print a JSON summary
    Inspect {
        /// Recording to decode (EDF/BDF, delimited text, or raw 16-bit stream)
        file: PathBuf,

        /// Also print the full series of this channel
        #[arg(short, long)]
        channel: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub file: String,
    pub source: String,
    pub sample_rate: f64,
    pub num_channels: usize,
    pub num_samples: usize,
    pub duration_seconds: f64,
    pub channels: Vec<ChannelDescriptor>,
    pub positioned_channels: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<InspectChannel>,
}

#[derive(Debug, Serialize)]
pub struct InspectChannel {
    pub channel: String,
    pub signal: Vec<f64>,
}

/// Run the ingestion and canonicalization stages on a file on disk
pub fn inspect(
    path: &Path,
    channel: Option<&str>,
    config: &PipelineConfig,
) -> anyhow::Result<InspectReport> {
    let bytes = std::fs::read(path)?;
    let file_name = path.file_name().and_then(|n| n.to_str());
    let recording = decode_upload(file_name, &bytes, config)?;

    let catalog = ElectrodeCatalog::standard_1020();
    let mapping = canonicalize(recording.channel_names(), &catalog);
    let channels = describe_channels(recording.channel_names(), &mapping, &catalog);

    let channel_data = match channel {
        Some(name) => Some(InspectChannel {
            channel: name.to_string(),
            signal: sanitize(recording.channel(name)?),
        }),
        None => None,
    };

    Ok(InspectReport {
        file: path.display().to_string(),
        source: recording.source().as_str().to_string(),
        sample_rate: recording.sample_rate(),
        num_channels: recording.num_channels(),
        num_samples: recording.num_samples(),
        duration_seconds: recording.duration_seconds(),
        positioned_channels: channels.iter().filter(|c| c.position.is_some()).count(),
        channels,
        channel_data,
    })
}
