use axum::{
    Router, middleware,
    routing::{get, post},
};
use vulnscan_model::api_routes::{auth as auth_routes, scans as scan_routes};

use crate::{
    infra::app_state::AppState,
    scans::handlers as scan_handlers,
    users::auth::{self, handlers as auth_handlers},
};

/// Every `/api` route.
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        // Public authentication endpoints
        .route(auth_routes::REGISTER, post(auth_handlers::register))
        .route(auth_routes::LOGIN, post(auth_handlers::login))
        .route(auth_routes::VERIFY_EMAIL, get(auth_handlers::verify_email))
        .route(auth_routes::LOGOUT, post(auth_handlers::logout))
        .merge(create_protected_routes(state))
}

/// Routes that require a session cookie.
fn create_protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(auth_routes::ME, get(auth_handlers::me))
        .route(scan_routes::COLLECTION, get(scan_handlers::list_scans))
        .route(scan_routes::START, post(scan_handlers::start_scan))
        .route(scan_routes::ITEM, get(scan_handlers::get_scan))
        .route(scan_routes::PDF, get(scan_handlers::scan_pdf))
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
