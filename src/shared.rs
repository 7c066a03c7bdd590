use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::TokenVerifier;
use crate::store::ChatStore;
use crate::websockets::{
    ConnectionRegistry, InMemoryConnectionRegistry, Notifier, RoomBroadcaster, RoomMembership,
    TypingConfig, TypingTracker,
};

/// Shared application state containing all dependencies
///
/// Every registry the signaling core mutates lives here and is passed into
/// handlers explicitly, so tests can assemble the same graph from mocks.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore + Send + Sync>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub registry: Arc<dyn ConnectionRegistry>,
    pub membership: Arc<RoomMembership>,
    pub typing: Arc<TypingTracker>,
    pub broadcaster: Arc<RoomBroadcaster>,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ChatStore + Send + Sync>,
        verifier: Arc<dyn TokenVerifier>,
        typing_config: &TypingConfig,
    ) -> Self {
        let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());
        Self::with_registry(store, verifier, registry, typing_config)
    }

    /// Wires the state graph around a caller-provided connection registry
    pub fn with_registry(
        store: Arc<dyn ChatStore + Send + Sync>,
        verifier: Arc<dyn TokenVerifier>,
        registry: Arc<dyn ConnectionRegistry>,
        typing_config: &TypingConfig,
    ) -> Self {
        let membership = Arc::new(RoomMembership::new());
        let typing = Arc::new(TypingTracker::new(typing_config.expiry_window));
        let broadcaster = Arc::new(RoomBroadcaster::new(
            Arc::clone(&registry),
            Arc::clone(&membership),
        ));
        let notifier = Arc::new(Notifier::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&membership),
        ));

        Self {
            store,
            verifier,
            registry,
            membership,
            typing,
            broadcaster,
            notifier,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Authorization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
