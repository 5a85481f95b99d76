use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use vulnscan_core::domain::users::auth::session_token_from_cookie_header;

use crate::infra::{app_state::AppState, errors::AppError};

/// Resolve the session cookie and insert the [`User`] into request
/// extensions. Requests without a valid session get 401.
///
/// [`User`]: vulnscan_core::domain::users::User
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers());
    let user = state
        .sessions
        .resolve_token(token.as_deref())
        .await
        .ok_or_else(|| AppError::unauthorized("Unauthorized"))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// The session token from any `Cookie` header on the request.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_token_from_cookie_header)
        .map(str::to_string)
}
