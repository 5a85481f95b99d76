use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use vulnscan_core::domain::{scans::parse_scan_id, users::User};
use vulnscan_model::ScanDetails;

use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Default, Deserialize)]
pub struct StartScanRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// The caller's 50 most recent scans, newest first.
pub async fn list_scans(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Value>> {
    let scans = state.queries.list_scans(&user).await?;
    Ok(Json(json!({ "scans": scans })))
}

pub async fn start_scan(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<StartScanRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let target = request.url.unwrap_or_default();
    let started = state.orchestrator.start_scan(&user, &target).await?;
    Ok(Json(started.into_body()))
}

pub async fn get_scan(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> AppResult<Json<ScanDetails>> {
    let scan_id = parse_scan_id(&id)?;
    let details = state.queries.get_scan(&user, scan_id).await?;
    Ok(Json(details))
}

pub async fn scan_pdf(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let scan_id = parse_scan_id(&id)?;
    let pdf = state
        .orchestrator
        .generate_report_pdf(&user, scan_id)
        .await?;

    let disposition =
        format!("attachment; filename=\"vulnerability-report-{scan_id}.pdf\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}
