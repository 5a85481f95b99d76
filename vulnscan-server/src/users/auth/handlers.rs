use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use vulnscan_core::{
    application::RegistrationRequest,
    domain::users::{
        User,
        auth::{clear_session_cookie, session_cookie},
    },
};

use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let registration = state
        .accounts
        .register(RegistrationRequest {
            email: request.email,
            password: request.password,
            name: request.name,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Registration successful! Please check your email to verify your account.",
        "verificationUrl": registration.verification_url,
        "user": registration.user.profile(),
    })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload?;
    let outcome = state
        .accounts
        .login(&request.email, &request.password)
        .await?;

    let cookie = session_cookie(&outcome.session_token, state.cookie_secure());
    let body = Json(json!({
        "success": true,
        "user": outcome.user.profile(),
    }));
    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> AppResult<Json<Value>> {
    let token = query.token.unwrap_or_default();
    state.accounts.confirm_email(&token).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Email verified successfully! You can now log in.",
    })))
}

/// Sessions are stateless, so logging out only clears the cookie. The
/// token itself stays valid until it expires.
pub async fn logout(State(state): State<AppState>) -> Response {
    info!("clearing session cookie");
    let cookie = clear_session_cookie(state.cookie_secure());
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "message": "Logged out successfully",
        })),
    )
        .into_response()
}

pub async fn me(Extension(user): Extension<User>) -> Json<Value> {
    Json(json!({ "user": user.profile() }))
}
