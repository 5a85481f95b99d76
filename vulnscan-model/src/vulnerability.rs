use chrono::{DateTime, Utc};
use std::fmt;

/// Severity bucket assigned by the scanning engine.
///
/// The engine writes these as lowercase strings. Anything it writes outside
/// the four known buckets is kept as [`Severity::Unknown`] and sorts last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    #[default]
    #[cfg_attr(feature = "serde", serde(other))]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }

    /// Display order used by result listings: critical first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 1,
            Severity::High => 2,
            Severity::Medium => 3,
            Severity::Low => 4,
            Severity::Unknown => 5,
        }
    }

    /// Lenient parse; unrecognised values map to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CVE record associated with a finding.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cve {
    pub cve_id: String,
    pub cve_description: Option<String>,
    pub cvss_v3_score: Option<f64>,
    pub published_date: Option<DateTime<Utc>>,
}

/// A single finding produced by the engine for a scan.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vulnerability {
    pub id: i64,
    pub scan_id: i64,
    pub vulnerability_name: String,
    pub vulnerability_type: Option<String>,
    pub description: Option<String>,
    pub cwe_id: Option<String>,
    pub cwe_name: Option<String>,
    pub cvss_score: Option<f64>,
    pub severity: Severity,
    pub ai_predicted_severity: Option<Severity>,
    pub ai_confidence: Option<f64>,
    pub remediation: Option<String>,
    pub affected_url: Option<String>,
    pub evidence: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub cves: Vec<Cve>,
}
