use clap::Parser;
use eegview_server::{
    cli::{inspect, Cli, Commands},
    config::ServerConfig,
    create_router,
    state::AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "eegview_server=info,eegview_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = ServerConfig::from_env()?;

    match cli.command {
        Some(Commands::Inspect { file, channel }) => {
            let report = inspect(&file, channel.as_deref(), &config.pipeline)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        Some(Commands::Serve { port, bind }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
        }
        None => {}
    }

    info!("Starting EEGView Server v{}", VERSION);
    info!("Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   CORS origins: {:?}", config.cors_origins);
    info!("   Max upload size: {} bytes", config.max_upload_size);
    info!("   Max JSON body size: {} bytes", config.max_json_body_size);
    info!(
        "   Binary channels: {}, default sample rate: {} Hz",
        config.pipeline.binary_channel_count, config.pipeline.default_sample_rate
    );

    let addr: SocketAddr = config.bind_address().parse()?;
    let state = Arc::new(AppState::new(config));
    let app = create_router(state);

    info!("Listening on http://{}", addr);
    info!("Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
