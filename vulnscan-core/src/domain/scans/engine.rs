use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use vulnscan_model::{ScanId, ScanReport};

/// Message used when the engine rejects a scan without saying why.
pub const DEFAULT_REJECTION_MESSAGE: &str = "Backend scan failed";

/// Port for the external scanning engine.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Ask the engine to scan `url` on behalf of scan `scan_id`. Returns the
    /// engine's acceptance payload.
    async fn start_scan(
        &self,
        scan_id: ScanId,
        url: &str,
    ) -> Result<Map<String, Value>, EngineError>;

    /// Render a PDF report for a scan and its findings.
    async fn generate_pdf(&self, report: &ScanReport) -> Result<Vec<u8>, EngineError>;
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be reached at all (connection refused, DNS).
    #[error("scanning engine is unreachable: {0}")]
    Unreachable(String),
    #[error("scanning engine did not answer in time")]
    Timeout,
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("invalid response from scanning engine: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        // A connect timeout reports both `is_connect` and `is_timeout`; it is
        // still a connection failure.
        if err.is_connect() {
            EngineError::Unreachable(err.to_string())
        } else if err.is_timeout() {
            EngineError::Timeout
        } else if err.is_request() {
            EngineError::Unreachable(err.to_string())
        } else {
            EngineError::InvalidResponse(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Base URL of the engine API, e.g. `http://localhost:5000/api`.
    pub base_url: Url,
    /// Bound on the start call. The engine scans synchronously, so this is
    /// long.
    pub timeout: Duration,
    pub pdf_timeout: Duration,
    /// Bound on establishing the TCP connection. Hitting it counts as
    /// unreachable, not as a timeout.
    pub connect_timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartScanRequest<'a> {
    scan_id: ScanId,
    url: &'a str,
}

#[derive(Deserialize)]
struct EngineErrorBody {
    error: Option<String>,
}

/// `reqwest` implementation of [`ScanEngine`].
#[derive(Debug, Clone)]
pub struct HttpScanEngine {
    client: Client,
    settings: EngineSettings,
}

impl HttpScanEngine {
    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| EngineError::InvalidResponse(err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    async fn rejection(response: reqwest::Response) -> EngineError {
        let status = response.status();
        let message = response
            .json::<EngineErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string());
        EngineError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl ScanEngine for HttpScanEngine {
    async fn start_scan(
        &self,
        scan_id: ScanId,
        url: &str,
    ) -> Result<Map<String, Value>, EngineError> {
        let endpoint = self.endpoint("scan/start");
        debug!(scan_id, %endpoint, "dispatching scan to engine");

        let response = self
            .client
            .post(&endpoint)
            .timeout(self.settings.timeout)
            .json(&StartScanRequest { scan_id, url })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.bytes().await?;
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(payload)) => Ok(payload),
            Ok(_) | Err(_) => {
                warn!(scan_id, "engine accepted scan with a non-object body");
                Ok(Map::new())
            }
        }
    }

    async fn generate_pdf(&self, report: &ScanReport) -> Result<Vec<u8>, EngineError> {
        let response = self
            .client
            .post(self.endpoint("generate-pdf"))
            .timeout(self.settings.pdf_timeout)
            .json(report)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }
}
