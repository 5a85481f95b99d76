//! Scan lifecycle: create the row, hand the work to the engine, and mark
//! the row failed when the hand-off does not happen.
//!
//! The row is always written before the engine is called. A crash between
//! the two leaves a scan stuck in `running`; nothing reconciles that.

use std::{any::type_name_of_val, fmt, sync::Arc};

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};
use url::Url;
use vulnscan_model::{ReportScan, ScanId, ScanReport};

use crate::{
    database::ports::scans::ScanRepository,
    domain::{
        scans::{
            ScanError,
            engine::{EngineError, ScanEngine},
        },
        users::User,
    },
};

pub const DEFAULT_MAX_URL_LENGTH: usize = 2048;
pub const DEFAULT_MAX_CONCURRENT_SCANS: usize = 5;

/// Warning returned with the soft-success response when the engine is down.
pub const ENGINE_UNAVAILABLE_WARNING: &str =
    "Backend service is not available. Scan will start when backend is online.";

/// Configured scan limits.
///
/// `max_concurrent_scans` is declared but not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    pub max_url_length: usize,
    pub max_concurrent_scans: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_url_length: DEFAULT_MAX_URL_LENGTH,
            max_concurrent_scans: DEFAULT_MAX_CONCURRENT_SCANS,
        }
    }
}

/// Outcome of a start request that produced a scan row.
#[derive(Debug, Clone, PartialEq)]
pub enum StartedScan {
    /// The engine accepted the scan. `payload` is the response body:
    /// `{success, scanId, message}` merged with the engine's own fields.
    Accepted { scan_id: ScanId, payload: Map<String, Value> },
    /// The engine could not be reached. The row is already `failed`, but the
    /// caller still gets a scan id to navigate to.
    Queued { scan_id: ScanId, warning: String },
}

impl StartedScan {
    pub fn scan_id(&self) -> ScanId {
        match self {
            StartedScan::Accepted { scan_id, .. }
            | StartedScan::Queued { scan_id, .. } => *scan_id,
        }
    }

    /// JSON body for the start endpoint.
    pub fn into_body(self) -> Value {
        match self {
            StartedScan::Accepted { payload, .. } => Value::Object(payload),
            StartedScan::Queued { scan_id, warning } => json!({
                "success": true,
                "scanId": scan_id,
                "message": "Scan queued (engine unavailable)",
                "warning": warning,
            }),
        }
    }
}

#[derive(Clone)]
pub struct ScanOrchestrator {
    scans: Arc<dyn ScanRepository>,
    engine: Arc<dyn ScanEngine>,
    limits: ScanLimits,
}

impl fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("scans", &type_name_of_val(self.scans.as_ref()))
            .field("engine", &type_name_of_val(self.engine.as_ref()))
            .field("limits", &self.limits)
            .finish()
    }
}

impl ScanOrchestrator {
    pub fn new(scans: Arc<dyn ScanRepository>, engine: Arc<dyn ScanEngine>) -> Self {
        Self {
            scans,
            engine,
            limits: ScanLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Check that `raw` is an absolute http(s) URL within the length limit.
    /// Returns the trimmed input.
    pub fn validate_target<'a>(&self, raw: &'a str) -> Result<&'a str, ScanError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScanError::InvalidInput("URL is required".into()));
        }
        if trimmed.chars().count() > self.limits.max_url_length {
            return Err(ScanError::InvalidInput(format!(
                "URL must be at most {} characters",
                self.limits.max_url_length
            )));
        }

        let parsed = Url::parse(trimmed)
            .map_err(|_| ScanError::InvalidInput("Invalid URL format".into()))?;
        let supported = matches!(parsed.scheme(), "http" | "https");
        if !supported || parsed.host_str().is_none_or(str::is_empty) {
            return Err(ScanError::InvalidInput("Invalid URL format".into()));
        }

        Ok(trimmed)
    }

    /// Create a `running` scan for `user` and delegate it to the engine.
    ///
    /// Engine rejections and timeouts mark the row `failed` and are returned
    /// as errors. An unreachable engine also marks the row `failed` but
    /// yields [`StartedScan::Queued`].
    pub async fn start_scan(
        &self,
        user: &User,
        target_url: &str,
    ) -> Result<StartedScan, ScanError> {
        let target_url = self.validate_target(target_url)?;

        let scan = self
            .scans
            .create_running(user.id, target_url, Utc::now())
            .await?;
        info!(scan_id = scan.id, user_id = %user.id, "scan created");

        match self.engine.start_scan(scan.id, target_url).await {
            Ok(engine_payload) => {
                info!(scan_id = scan.id, "engine accepted scan");
                let mut payload = Map::new();
                payload.insert("success".into(), Value::Bool(true));
                payload.insert("message".into(), "Scan started successfully".into());
                payload.extend(engine_payload);
                payload.insert("scanId".into(), scan.id.into());
                Ok(StartedScan::Accepted {
                    scan_id: scan.id,
                    payload,
                })
            }
            Err(EngineError::Unreachable(reason)) => {
                warn!(scan_id = scan.id, "engine unreachable, scan not started: {reason}");
                self.fail_scan(scan.id).await;
                Ok(StartedScan::Queued {
                    scan_id: scan.id,
                    warning: ENGINE_UNAVAILABLE_WARNING.to_string(),
                })
            }
            Err(EngineError::Timeout) => {
                error!(scan_id = scan.id, "engine timed out starting scan");
                self.fail_scan(scan.id).await;
                Err(ScanError::EngineTimeout)
            }
            Err(err) => {
                error!(scan_id = scan.id, "engine refused scan: {err}");
                self.fail_scan(scan.id).await;
                Err(ScanError::Upstream(match err {
                    EngineError::Rejected { message, .. } => message,
                    other => other.to_string(),
                }))
            }
        }
    }

    /// Best effort: a failure here is logged, not surfaced, so the caller
    /// still sees the engine outcome.
    async fn fail_scan(&self, scan_id: ScanId) {
        match self.scans.mark_failed(scan_id, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => warn!(scan_id, "scan was no longer running; status left unchanged"),
            Err(err) => error!(scan_id, "failed to mark scan as failed: {err}"),
        }
    }

    /// Render the PDF report for one of `user`'s scans.
    pub async fn generate_report_pdf(
        &self,
        user: &User,
        scan_id: ScanId,
    ) -> Result<Vec<u8>, ScanError> {
        let scan = self
            .scans
            .get_for_user(user.id, scan_id)
            .await?
            .ok_or(ScanError::NotFound)?;
        let vulnerabilities = self.scans.list_vulnerabilities(scan.id).await?;

        let report = ScanReport {
            scan: ReportScan {
                scan,
                user_name: user.name.clone(),
                user_email: user.email.clone(),
            },
            vulnerabilities,
        };

        self.engine.generate_pdf(&report).await.map_err(|err| {
            error!(scan_id, "engine failed to render report: {err}");
            ScanError::ReportGeneration(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryScanRepository, ScriptedEngine, ScriptedStart};
    use vulnscan_model::ScanStatus;

    fn orchestrator(
        engine: ScriptedEngine,
    ) -> (ScanOrchestrator, Arc<InMemoryScanRepository>, Arc<ScriptedEngine>) {
        let scans = Arc::new(InMemoryScanRepository::default());
        let engine = Arc::new(engine);
        (
            ScanOrchestrator::new(scans.clone(), engine.clone()),
            scans,
            engine,
        )
    }

    fn alice() -> User {
        User::new("alice@example.com", "Alice")
    }

    #[tokio::test]
    async fn accepted_scans_stay_running_and_merge_engine_payload() {
        let mut extra = Map::new();
        extra.insert("vulnerabilities_found".into(), 3.into());
        extra.insert("scanId".into(), 999.into());
        let (orchestrator, scans, engine) =
            orchestrator(ScriptedEngine::new(ScriptedStart::Accept(extra)));
        let user = alice();

        let started = orchestrator
            .start_scan(&user, "  https://example.com/login ")
            .await
            .unwrap();
        let scan_id = started.scan_id();
        let body = started.into_body();

        assert_eq!(body["success"], true);
        assert_eq!(body["scanId"], scan_id);
        assert_eq!(body["message"], "Scan started successfully");
        assert_eq!(body["vulnerabilities_found"], 3);

        let scan = scans.get_for_user(user.id, scan_id).await.unwrap().unwrap();
        assert_eq!(scan.scan_status, ScanStatus::Running);
        assert_eq!(scan.target_url, "https://example.com/login");
        assert_eq!(
            engine.started().await,
            vec![(scan_id, "https://example.com/login".to_string())]
        );
    }

    #[tokio::test]
    async fn unreachable_engine_gives_soft_success_with_failed_row() {
        let (orchestrator, scans, _) =
            orchestrator(ScriptedEngine::new(ScriptedStart::Unreachable));
        let user = alice();

        let started = orchestrator
            .start_scan(&user, "https://example.com")
            .await
            .unwrap();
        assert!(matches!(started, StartedScan::Queued { .. }));

        let scan_id = started.scan_id();
        let body = started.into_body();
        assert_eq!(body["success"], true);
        assert_eq!(body["scanId"], scan_id);
        assert_eq!(body["warning"], ENGINE_UNAVAILABLE_WARNING);

        let scan = scans.get_for_user(user.id, scan_id).await.unwrap().unwrap();
        assert_eq!(scan.scan_status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn rejected_scans_fail_and_surface_engine_message() {
        let (orchestrator, scans, _) = orchestrator(ScriptedEngine::new(
            ScriptedStart::Reject {
                status: 500,
                message: "target refused connection".into(),
            },
        ));
        let user = alice();

        let err = orchestrator
            .start_scan(&user, "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(&err, ScanError::Upstream(msg) if msg == "target refused connection"));

        let listed = scans.list_for_user(user.id, 50).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].scan_status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn engine_timeouts_fail_the_scan() {
        let (orchestrator, scans, _) =
            orchestrator(ScriptedEngine::new(ScriptedStart::Timeout));
        let user = alice();

        assert!(matches!(
            orchestrator.start_scan(&user, "https://example.com").await,
            Err(ScanError::EngineTimeout)
        ));
        let listed = scans.list_for_user(user.id, 50).await.unwrap();
        assert_eq!(listed[0].scan_status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn invalid_urls_never_create_rows() {
        let (orchestrator, scans, engine) =
            orchestrator(ScriptedEngine::new(ScriptedStart::Accept(Map::new())));
        let user = alice();
        let too_long = format!("https://example.com/{}", "a".repeat(2048));

        for bad in [
            "",
            "   ",
            "not a url",
            "example.com",
            "ftp://example.com/file",
            "javascript:alert(1)",
            too_long.as_str(),
        ] {
            assert!(
                matches!(
                    orchestrator.start_scan(&user, bad).await,
                    Err(ScanError::InvalidInput(_))
                ),
                "{bad:?}"
            );
        }

        assert!(scans.list_for_user(user.id, 50).await.unwrap().is_empty());
        assert!(engine.started().await.is_empty());
    }

    #[tokio::test]
    async fn same_target_can_be_scanned_repeatedly() {
        let (orchestrator, scans, _) =
            orchestrator(ScriptedEngine::new(ScriptedStart::Accept(Map::new())));
        let user = alice();

        for _ in 0..3 {
            orchestrator
                .start_scan(&user, "https://example.com")
                .await
                .unwrap();
        }
        assert_eq!(scans.list_for_user(user.id, 50).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn report_requires_ownership() {
        let (orchestrator, _, engine) =
            orchestrator(ScriptedEngine::new(ScriptedStart::Accept(Map::new())));
        let owner = alice();
        let stranger = User::new("mallory@example.com", "Mallory");

        let scan_id = orchestrator
            .start_scan(&owner, "https://example.com")
            .await
            .unwrap()
            .scan_id();

        assert!(matches!(
            orchestrator.generate_report_pdf(&stranger, scan_id).await,
            Err(ScanError::NotFound)
        ));

        let pdf = orchestrator.generate_report_pdf(&owner, scan_id).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let reports = engine.reports().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].scan.user_email, "alice@example.com");
        assert_eq!(reports[0].scan.scan.id, scan_id);
    }

    #[tokio::test]
    async fn report_failures_are_reported() {
        let (orchestrator, _, _) = orchestrator(
            ScriptedEngine::new(ScriptedStart::Accept(Map::new())).failing_pdf(),
        );
        let user = alice();
        let scan_id = orchestrator
            .start_scan(&user, "https://example.com")
            .await
            .unwrap()
            .scan_id();

        assert!(matches!(
            orchestrator.generate_report_pdf(&user, scan_id).await,
            Err(ScanError::ReportGeneration(_))
        ));
    }
}
