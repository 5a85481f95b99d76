#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_test::TestServer;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use url::Url;
use vulnscan_core::{
    application::AppUnitOfWork,
    domain::scans::{EngineSettings, HttpScanEngine},
    testing::{
        InMemoryScanRepository, InMemoryUsersRepository,
        InMemoryVerificationTokenRepository, test_crypto,
    },
};
use vulnscan_model::api_routes::auth;
use vulnscan_server::{
    AppState, create_app,
    infra::config::{ConfigMetadata, compose_config, sources::{EnvConfig, FileConfig}},
};

pub const PASSWORD: &str = "correct-horse-battery";

/// How the stand-in engine answers `scan/start`.
#[derive(Debug, Clone)]
pub enum StartBehavior {
    Accept,
    Reject { status: StatusCode, error: String },
    /// Nothing listens on the engine port.
    Offline,
}

#[derive(Debug, Clone, Default)]
pub struct EngineCalls {
    pub starts: Arc<Mutex<Vec<Value>>>,
    pub reports: Arc<Mutex<Vec<Value>>>,
}

#[derive(Clone)]
struct EngineState {
    start: StartBehavior,
    pdf_fails: bool,
    calls: EngineCalls,
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub scans: Arc<InMemoryScanRepository>,
    pub engine_calls: EngineCalls,
}

pub async fn build_test_app(start: StartBehavior) -> Result<TestApp> {
    build_test_app_with(start, false).await
}

pub async fn build_test_app_with(start: StartBehavior, pdf_fails: bool) -> Result<TestApp> {
    let calls = EngineCalls::default();
    let engine_url = match &start {
        StartBehavior::Offline => closed_port_url()?,
        _ => {
            spawn_engine(EngineState {
                start: start.clone(),
                pdf_fails,
                calls: calls.clone(),
            })
            .await?
        }
    };

    let env = EnvConfig {
        jwt_secret: Some("integration-test-secret-0123456789abcdef".into()),
        auth_password_pepper: Some("integration-pepper".into()),
        engine_base_url: Some(engine_url.to_string()),
        dev_mode: Some(true),
        ..EnvConfig::default()
    };
    let (config, _warnings) =
        compose_config(FileConfig::default(), env, ConfigMetadata::default())?;

    let scans = Arc::new(InMemoryScanRepository::default());
    let unit_of_work = AppUnitOfWork {
        users: Arc::new(InMemoryUsersRepository::default()),
        verification_tokens: Arc::new(InMemoryVerificationTokenRepository::default()),
        scans: scans.clone(),
    };

    let engine = HttpScanEngine::new(EngineSettings {
        base_url: engine_url,
        timeout: Duration::from_secs(5),
        pdf_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
    })?;

    let state = AppState::new(
        Arc::new(config),
        Arc::new(unit_of_work),
        Arc::new(test_crypto()),
        Arc::new(engine),
    )?;

    let server = TestServer::builder()
        .build(create_app(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(TestApp {
        server,
        state,
        scans,
        engine_calls: calls,
    })
}

async fn spawn_engine(state: EngineState) -> Result<Url> {
    let router = Router::new()
        .route("/api/scan/start", post(engine_start))
        .route("/api/generate-pdf", post(engine_pdf))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind fake engine")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(Url::parse(&format!("http://{addr}/api"))?)
}

fn closed_port_url() -> Result<Url> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(Url::parse(&format!("http://{addr}/api"))?)
}

async fn engine_start(State(state): State<EngineState>, Json(body): Json<Value>) -> Response {
    state.calls.starts.lock().await.push(body.clone());
    match state.start {
        StartBehavior::Accept => Json(json!({
            "status": "accepted",
            "engineJobId": format!("job-{}", body["scanId"]),
        }))
        .into_response(),
        StartBehavior::Reject { status, error } => {
            (status, Json(json!({ "error": error }))).into_response()
        }
        StartBehavior::Offline => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn engine_pdf(State(state): State<EngineState>, Json(body): Json<Value>) -> Response {
    state.calls.reports.lock().await.push(body);
    if state.pdf_fails {
        return (StatusCode::INTERNAL_SERVER_ERROR, "renderer crashed").into_response();
    }
    ([(header::CONTENT_TYPE, "application/pdf")], b"%PDF-1.4 test".to_vec()).into_response()
}

/// Register an account and return the plaintext verification token.
pub async fn register(server: &TestServer, email: &str, name: &str) -> String {
    let response = server
        .post(auth::REGISTER)
        .json(&json!({ "email": email, "password": PASSWORD, "name": name }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let link = body["verificationUrl"]
        .as_str()
        .expect("verificationUrl present");
    token_from_link(link)
}

pub fn token_from_link(link: &str) -> String {
    Url::parse(link)
        .expect("verification link is a URL")
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .expect("token query parameter")
}

/// Register, verify and log in. Returns a `Cookie` header value.
pub async fn signed_in(server: &TestServer, email: &str, name: &str) -> String {
    let token = register(server, email, name).await;
    server
        .get(auth::VERIFY_EMAIL)
        .add_query_param("token", &token)
        .await
        .assert_status_ok();

    let login = server
        .post(auth::LOGIN)
        .json(&json!({ "email": email, "password": PASSWORD }))
        .await;
    login.assert_status_ok();
    cookie_from(&login)
}

/// Turn a login response's `Set-Cookie` into a request `Cookie` value.
pub fn cookie_from(response: &axum_test::TestResponse) -> String {
    let set_cookie = response.header(header::SET_COOKIE);
    let set_cookie = set_cookie.to_str().expect("ascii cookie");
    set_cookie
        .split(';')
        .next()
        .expect("name=value pair")
        .trim()
        .to_string()
}
