pub mod appresult;
pub mod config;
pub mod message;
pub mod relay;
pub mod store;
pub mod upload;
pub mod ws;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{cors::{AllowOrigin, Any, CorsLayer}, services::ServeDir};

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use message::{Message, MessageDraft};
pub use relay::{Relay, RelayHandle};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub relay: RelayHandle,
    pub uploads: Arc<upload::Uploads>,
}

/// `/ws` for the chat socket, `/upload` and the uploaded files under `/uploads`.
pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.uploads.max_bytes);

    Router::new()
        .route("/ws", get(ws::chat_ws))
        .route("/upload", post(upload::upload).layer(upload_limit))
        .nest_service("/uploads", ServeDir::new(&state.uploads.dir))
        .with_state(state)
}

pub fn cors(allowed_origin: &str) -> anyhow::Result<CorsLayer> {
    let origin = if allowed_origin == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::exact(HeaderValue::from_str(allowed_origin)?)
    };

    Ok(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    )
}
