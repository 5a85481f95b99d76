//! Scan orchestration and read-side queries.

pub mod engine;
pub mod orchestrator;
pub mod query;

use thiserror::Error;

use crate::error::StoreError;

pub use engine::{EngineError, EngineSettings, HttpScanEngine, ScanEngine};
pub use orchestrator::{ScanLimits, ScanOrchestrator, StartedScan};
pub use query::{SCAN_LIST_LIMIT, ScanQueryService, parse_scan_id};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{0}")]
    InvalidInput(String),
    /// Missing, or owned by someone else. The two are deliberately
    /// indistinguishable.
    #[error("Scan not found")]
    NotFound,
    #[error("{0}")]
    Upstream(String),
    #[error("Scanning engine timed out")]
    EngineTimeout,
    #[error("Failed to generate PDF report: {0}")]
    ReportGeneration(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}
