use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opschat_signaling::auth::JwtTokenVerifier;
use opschat_signaling::shared::AppState;
use opschat_signaling::store::{ChatStore, InMemoryChatStore, PostgresChatStore};
use opschat_signaling::websockets::{
    start_heartbeat_task, start_typing_sweep, websocket_handler, HeartbeatConfig, TypingConfig,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opschat_signaling=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting opschat signaling server");

    // The chat store is owned by the back-office REST stack; this process only reads it
    let store: Arc<dyn ChatStore + Send + Sync> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = sqlx::PgPool::connect(&database_url)
                .await
                .expect("Failed to connect to database");
            Arc::new(PostgresChatStore::new(pool))
        }
        Err(_) => {
            warn!("DATABASE_URL not set, using in-memory chat store");
            Arc::new(InMemoryChatStore::new())
        }
    };

    let verifier = Arc::new(JwtTokenVerifier::new());
    let typing_config = TypingConfig::from_env();
    let heartbeat_config = HeartbeatConfig::from_env();

    let app_state = AppState::new(store, verifier, &typing_config);

    tokio::spawn(start_heartbeat_task(
        Arc::clone(&app_state.registry),
        Arc::clone(&app_state.membership),
        Arc::clone(&app_state.typing),
        Arc::clone(&app_state.notifier),
        heartbeat_config,
    ));
    tokio::spawn(start_typing_sweep(
        Arc::clone(&app_state.typing),
        Arc::clone(&app_state.broadcaster),
        typing_config,
    ));

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    info!(addr = %bind_addr, "Signaling server listening");
    axum::serve(listener, app).await.unwrap();
}
