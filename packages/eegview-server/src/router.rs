use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, Uri},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handlers::{
    edf_channel_data, edf_preview, filter_signal, health_check, ping, psd, root, topomap,
    txt_preview,
};
use crate::handlers::topomap::{TOPOMAP_CHANNELS_HEADER, TOPOMAP_FREQUENCY_HEADER};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let config = &state.config;

    let public_routes: Router<Arc<AppState>> = Router::new()
        .route("/", get(root))
        .route("/ping", get(ping))
        .route("/health", get(health_check));

    // Multipart uploads get the larger body limit
    let upload_routes: Router<Arc<AppState>> = Router::new()
        .route("/edf-preview", post(edf_preview))
        .route("/txt-preview", post(txt_preview))
        .route("/edf-channel-data", post(edf_channel_data))
        .route("/topomap", post(topomap))
        .layer(DefaultBodyLimit::max(config.max_upload_size));

    let json_routes: Router<Arc<AppState>> = Router::new()
        .route("/filter-signal", post(filter_signal))
        .route("/psd", post(psd))
        .layer(DefaultBodyLimit::max(config.max_json_body_size));

    let hard_limit = config.max_upload_size.max(config.max_json_body_size);
    let cors = cors_layer(config);

    Router::new()
        .merge(public_routes)
        .merge(upload_routes)
        .merge(json_routes)
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(hard_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .expose_headers([TOPOMAP_FREQUENCY_HEADER, TOPOMAP_CHANNELS_HEADER]);

    if config.allows_any_origin() {
        return cors.allow_origin(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(origins)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
