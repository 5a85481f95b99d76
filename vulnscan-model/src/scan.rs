use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ModelError;
use crate::vulnerability::Vulnerability;

pub type ScanId = i64;

/// Lifecycle of a scan row.
///
/// Rows are created `Running`. The orchestrator only ever moves them to
/// `Failed`; the engine moves them to `Completed` out of band. `Pending` is
/// accepted from storage but never written by this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    /// Whether the orchestrator may move a scan from `self` to `next`.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::Running)
                | (ScanStatus::Running, ScanStatus::Failed)
                | (ScanStatus::Running, ScanStatus::Completed)
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            other => Err(ModelError::InvalidScanStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scan {
    pub id: ScanId,
    pub user_id: Uuid,
    pub target_url: String,
    pub scan_status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_vulnerabilities: i32,
    pub critical_count: i32,
    pub high_count: i32,
    pub medium_count: i32,
    pub low_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Scan with its findings, as returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanDetails {
    pub scan: Scan,
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Payload posted to the engine's PDF endpoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanReport {
    pub scan: ReportScan,
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Scan row enriched with the owner's contact details.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportScan {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub scan: Scan,
    pub user_name: String,
    pub user_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ScanStatus::Pending,
            ScanStatus::Running,
            ScanStatus::Completed,
            ScanStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ScanStatus>(), Ok(status));
        }
        assert!("cancelled".parse::<ScanStatus>().is_err());
    }

    #[test]
    fn only_running_scans_can_fail() {
        assert!(ScanStatus::Running.can_transition_to(ScanStatus::Failed));
        assert!(!ScanStatus::Completed.can_transition_to(ScanStatus::Failed));
        assert!(!ScanStatus::Failed.can_transition_to(ScanStatus::Running));
    }
}
