//! Core data model definitions shared by the vulnscan crates.
//!
//! Everything here is plain data: scans and their status, vulnerability
//! findings with CVE mappings, the public view of a user account and the
//! HTTP route table. Persistence and business rules live in
//! `vulnscan-core`.
#![allow(missing_docs)]

pub mod api_routes;
pub mod error;
pub mod scan;
pub mod user;
pub mod vulnerability;

pub use error::{ModelError, Result};
pub use scan::{ReportScan, Scan, ScanDetails, ScanId, ScanReport, ScanStatus};
pub use user::UserProfile;
pub use vulnerability::{Cve, Severity, Vulnerability};

pub mod prelude {
    pub use crate::scan::{ReportScan, Scan, ScanDetails, ScanId, ScanReport, ScanStatus};
    pub use crate::user::UserProfile;
    pub use crate::vulnerability::{Cve, Severity, Vulnerability};
}
