use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vulnscan_model::{Scan, ScanId, Vulnerability};

use crate::error::Result;

#[async_trait]
pub trait ScanRepository: Send + Sync {
    /// Insert a scan in the `running` state.
    async fn create_running(
        &self,
        user_id: Uuid,
        target_url: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Scan>;

    /// Move a `running` scan to `failed`. Scans in any other state are left
    /// alone; returns whether the row changed.
    async fn mark_failed(&self, id: ScanId, now: DateTime<Utc>) -> Result<bool>;

    /// The user's scans, newest first.
    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Scan>>;

    /// A scan, only if it belongs to `user_id`.
    async fn get_for_user(
        &self,
        user_id: Uuid,
        id: ScanId,
    ) -> Result<Option<Scan>>;

    /// Findings for a scan with their CVE mappings attached, most severe
    /// first.
    async fn list_vulnerabilities(&self, scan_id: ScanId) -> Result<Vec<Vulnerability>>;
}
