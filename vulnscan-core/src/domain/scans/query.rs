use std::{any::type_name_of_val, fmt, sync::Arc};

use vulnscan_model::{Scan, ScanDetails, ScanId};

use crate::{
    database::ports::scans::ScanRepository,
    domain::{scans::ScanError, users::User},
};

/// Most scans returned by a listing.
pub const SCAN_LIST_LIMIT: i64 = 50;

/// Read-only access to a user's scans. Every read is scoped to the owner.
#[derive(Clone)]
pub struct ScanQueryService {
    scans: Arc<dyn ScanRepository>,
}

impl fmt::Debug for ScanQueryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanQueryService")
            .field("scans", &type_name_of_val(self.scans.as_ref()))
            .finish()
    }
}

impl ScanQueryService {
    pub fn new(scans: Arc<dyn ScanRepository>) -> Self {
        Self { scans }
    }

    /// The user's most recent scans, newest first.
    pub async fn list_scans(&self, user: &User) -> Result<Vec<Scan>, ScanError> {
        Ok(self.scans.list_for_user(user.id, SCAN_LIST_LIMIT).await?)
    }

    pub async fn get_scan(
        &self,
        user: &User,
        scan_id: ScanId,
    ) -> Result<ScanDetails, ScanError> {
        let scan = self
            .scans
            .get_for_user(user.id, scan_id)
            .await?
            .ok_or(ScanError::NotFound)?;
        let vulnerabilities = self.scans.list_vulnerabilities(scan.id).await?;
        Ok(ScanDetails {
            scan,
            vulnerabilities,
        })
    }
}

/// Parse a scan id taken from a URL path. Anything that is not a positive
/// integer cannot name a scan.
pub fn parse_scan_id(raw: &str) -> Result<ScanId, ScanError> {
    raw.trim()
        .parse::<ScanId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(ScanError::NotFound)
}
