//! # vulnscan server
//!
//! HTTP backend for the vulnscan web application.
//!
//! - **Accounts**: registration, email verification and login with
//!   Argon2id-hashed passwords.
//! - **Sessions**: stateless HS256 tokens in an HTTP-only `auth-token`
//!   cookie.
//! - **Scans**: each scan request becomes a row that is handed to the
//!   external scanning engine; results and PDF reports come back from it.
//!
//! The binary in `main.rs` loads configuration, connects to PostgreSQL and
//! serves [`create_app`]. Integration tests build the same router over
//! in-memory repositories.

pub mod infra;
pub mod routes;
pub mod scans;
pub mod users;

pub use infra::app_state::AppState;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use vulnscan_model::api_routes;

/// The full application router with middleware applied.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route(api_routes::HEALTH, get(health_handler))
        .merge(routes::create_api_router(state.clone()))
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive in dev mode; otherwise only the configured origins, with
/// credentials so the session cookie is sent.
fn cors_layer(state: &AppState) -> CorsLayer {
    if state.config().dev_mode {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = state
        .config()
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
