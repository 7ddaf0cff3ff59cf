use std::sync::Arc;

use chatrelay::{cors, router, store, upload::Uploads, AppState, Config, Relay};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatrelay=info,tower_http=info"))
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = store::open(config.database_url.as_deref()).await;
    let relay = Relay::spawn(store, config.history_limit);

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let app_state = AppState {
        relay,
        uploads: Arc::new(Uploads::from(&config)),
    };

    let app = router(app_state)
        .layer(cors(&config.allowed_origin)?)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, history_limit = ?config.history_limit, "chat relay listening");
    axum::serve(listener, app).await?;

    Ok(())
}
