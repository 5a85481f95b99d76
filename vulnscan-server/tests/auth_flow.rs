#[path = "support/mod.rs"]
mod support;

use anyhow::Result;
use axum::http::{StatusCode, header};
use serde_json::{Value, json};
use support::{PASSWORD, StartBehavior, build_test_app, cookie_from, register, signed_in};
use vulnscan_model::api_routes::{self, auth};

#[tokio::test]
async fn register_verify_login_and_me() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;
    let server = &app.server;

    let response = server
        .post(auth::REGISTER)
        .json(&json!({
            "email": "Alice@Example.com",
            "password": PASSWORD,
            "name": "Alice",
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["name"], "Alice");
    let link = body["verificationUrl"].as_str().expect("verification link");
    assert!(link.starts_with("http://localhost:3000/verify-email?token="));
    let token = support::token_from_link(link);

    // Not verified yet.
    let early = server
        .post(auth::LOGIN)
        .json(&json!({ "email": "alice@example.com", "password": PASSWORD }))
        .await;
    early.assert_status(StatusCode::FORBIDDEN);
    let early: Value = early.json();
    assert_eq!(early["error"], "Please verify your email before logging in");

    let verified = server
        .get(auth::VERIFY_EMAIL)
        .add_query_param("token", &token)
        .await;
    verified.assert_status_ok();
    let verified: Value = verified.json();
    assert_eq!(verified["success"], true);

    let login = server
        .post(auth::LOGIN)
        .json(&json!({ "email": "ALICE@example.com", "password": PASSWORD }))
        .await;
    login.assert_status_ok();
    let set_cookie = login.header(header::SET_COOKIE);
    let set_cookie = set_cookie.to_str()?;
    assert!(set_cookie.starts_with("auth-token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Max-Age=604800"));
    // dev mode serves plain http
    assert!(!set_cookie.contains("Secure"));
    let login_body: Value = login.json();
    assert_eq!(login_body["user"]["email"], "alice@example.com");

    let me = server
        .get(auth::ME)
        .add_header("Cookie", cookie_from(&login))
        .await;
    me.assert_status_ok();
    let me: Value = me.json();
    assert_eq!(me["user"]["email"], "alice@example.com");
    assert_eq!(me["user"]["id"], login_body["user"]["id"]);
    Ok(())
}

#[tokio::test]
async fn verification_token_is_single_use() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;
    let token = register(&app.server, "bob@example.com", "Bob").await;

    app.server
        .get(auth::VERIFY_EMAIL)
        .add_query_param("token", &token)
        .await
        .assert_status_ok();

    let again = app
        .server
        .get(auth::VERIFY_EMAIL)
        .add_query_param("token", &token)
        .await;
    again.assert_status(StatusCode::BAD_REQUEST);
    let again: Value = again.json();
    assert_eq!(again["error"], "Token already used");
    Ok(())
}

#[tokio::test]
async fn verify_email_rejects_missing_and_unknown_tokens() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;

    let missing = app.server.get(auth::VERIFY_EMAIL).await;
    missing.assert_status(StatusCode::BAD_REQUEST);
    let missing: Value = missing.json();
    assert_eq!(missing["error"], "Token is required");

    let unknown = app
        .server
        .get(auth::VERIFY_EMAIL)
        .add_query_param("token", "verify_not-a-real-token")
        .await;
    unknown.assert_status(StatusCode::BAD_REQUEST);
    let unknown: Value = unknown.json();
    assert_eq!(unknown["error"], "Invalid token");
    Ok(())
}

#[tokio::test]
async fn registration_validation() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;
    let server = &app.server;

    let missing = server
        .post(auth::REGISTER)
        .json(&json!({ "email": "carol@example.com", "password": PASSWORD }))
        .await;
    missing.assert_status(StatusCode::BAD_REQUEST);
    let missing: Value = missing.json();
    assert_eq!(missing["error"], "Email, password, and name are required");

    let short = server
        .post(auth::REGISTER)
        .json(&json!({ "email": "carol@example.com", "password": "short", "name": "Carol" }))
        .await;
    short.assert_status(StatusCode::BAD_REQUEST);
    let short: Value = short.json();
    assert_eq!(short["error"], "Password must be at least 8 characters long");

    register(server, "carol@example.com", "Carol").await;
    let duplicate = server
        .post(auth::REGISTER)
        .json(&json!({ "email": "CAROL@example.com", "password": PASSWORD, "name": "Carol" }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    let duplicate: Value = duplicate.json();
    assert_eq!(duplicate["error"], "User already exists, please login");
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;

    let response = app
        .server
        .post(auth::REGISTER)
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid request body");
    Ok(())
}

#[tokio::test]
async fn login_failures() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;
    let server = &app.server;
    signed_in(server, "dave@example.com", "Dave").await;

    let unknown = server
        .post(auth::LOGIN)
        .json(&json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .await;
    unknown.assert_status(StatusCode::NOT_FOUND);
    let unknown: Value = unknown.json();
    assert_eq!(unknown["error"], "User not found");

    let wrong = server
        .post(auth::LOGIN)
        .json(&json!({ "email": "dave@example.com", "password": "not-the-password" }))
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
    let wrong: Value = wrong.json();
    assert_eq!(wrong["error"], "Invalid credentials");

    let missing = server
        .post(auth::LOGIN)
        .json(&json!({ "email": "dave@example.com" }))
        .await;
    missing.assert_status(StatusCode::BAD_REQUEST);
    let missing: Value = missing.json();
    assert_eq!(missing["error"], "Email and password are required");
    Ok(())
}

#[tokio::test]
async fn logout_expires_the_cookie() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;

    // Works with or without a session.
    let response = app.server.post(auth::LOGOUT).await;
    response.assert_status_ok();
    let set_cookie = response.header(header::SET_COOKIE);
    let set_cookie = set_cookie.to_str()?;
    assert!(set_cookie.starts_with("auth-token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    let body: Value = response.json();
    assert_eq!(body["message"], "Logged out successfully");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_session() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;

    for path in [auth::ME, api_routes::scans::COLLECTION] {
        let response = app.server.get(path).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body, json!({ "error": "Unauthorized" }));
    }

    let forged = app
        .server
        .get(auth::ME)
        .add_header("Cookie", "auth-token=eyJhbGciOiJIUzI1NiJ9.e30.bad")
        .await;
    forged.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    let app = build_test_app(StartBehavior::Accept).await?;

    let response = app.server.get(api_routes::HEALTH).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    Ok(())
}
