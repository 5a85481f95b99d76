use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgRow};
use uuid::Uuid;
use vulnscan_model::{Cve, Scan, ScanId, ScanStatus, Severity, Vulnerability};

use super::{column, db_error};
use crate::{
    database::ports::scans::ScanRepository,
    error::{Result, StoreError},
};

const SCAN_COLUMNS: &str = r#"
    id, user_id, target_url, scan_status, started_at, completed_at,
    total_vulnerabilities, critical_count, high_count, medium_count,
    low_count, created_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresScanRepository {
    pool: PgPool,
}

impl PostgresScanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_scan(row: &PgRow) -> Result<Scan> {
        let status: String = column(row, "scan_status")?;
        let scan_status = status
            .parse::<ScanStatus>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Scan {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            target_url: column(row, "target_url")?,
            scan_status,
            started_at: column(row, "started_at")?,
            completed_at: column(row, "completed_at")?,
            total_vulnerabilities: column(row, "total_vulnerabilities")?,
            critical_count: column(row, "critical_count")?,
            high_count: column(row, "high_count")?,
            medium_count: column(row, "medium_count")?,
            low_count: column(row, "low_count")?,
            created_at: column(row, "created_at")?,
        })
    }

    fn map_vulnerability(row: &PgRow) -> Result<Vulnerability> {
        let severity: String = column(row, "severity")?;
        let predicted: Option<String> = column(row, "ai_predicted_severity")?;

        Ok(Vulnerability {
            id: column(row, "id")?,
            scan_id: column(row, "scan_id")?,
            vulnerability_name: column(row, "vulnerability_name")?,
            vulnerability_type: column(row, "vulnerability_type")?,
            description: column(row, "description")?,
            cwe_id: column(row, "cwe_id")?,
            cwe_name: column(row, "cwe_name")?,
            cvss_score: column(row, "cvss_score")?,
            severity: Severity::parse(&severity),
            ai_predicted_severity: predicted.as_deref().map(Severity::parse),
            ai_confidence: column(row, "ai_confidence")?,
            remediation: column(row, "remediation")?,
            affected_url: column(row, "affected_url")?,
            evidence: column(row, "evidence")?,
            cves: Vec::new(),
        })
    }

    fn map_cve(row: &PgRow) -> Result<(i64, Cve)> {
        Ok((
            column(row, "vulnerability_id")?,
            Cve {
                cve_id: column(row, "cve_id")?,
                cve_description: column(row, "cve_description")?,
                cvss_v3_score: column(row, "cvss_v3_score")?,
                published_date: column(row, "published_date")?,
            },
        ))
    }
}

#[async_trait]
impl ScanRepository for PostgresScanRepository {
    async fn create_running(
        &self,
        user_id: Uuid,
        target_url: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Scan> {
        let query = format!(
            r#"
            INSERT INTO scans (user_id, target_url, scan_status, started_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {SCAN_COLUMNS}
            "#
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(target_url)
            .bind(ScanStatus::Running.as_str())
            .bind(started_at)
            .fetch_one(self.pool())
            .await
            .map_err(db_error("Failed to create scan"))?;

        Self::map_scan(&row)
    }

    async fn mark_failed(&self, id: ScanId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scans
            SET scan_status = $2, updated_at = $3
            WHERE id = $1 AND scan_status = $4
            "#,
        )
        .bind(id)
        .bind(ScanStatus::Failed.as_str())
        .bind(now)
        .bind(ScanStatus::Running.as_str())
        .execute(self.pool())
        .await
        .map_err(db_error("Failed to mark scan failed"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Scan>> {
        let query = format!(
            r#"
            SELECT {SCAN_COLUMNS}
            FROM scans
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await
            .map_err(db_error("Failed to list scans"))?;

        rows.iter().map(Self::map_scan).collect()
    }

    async fn get_for_user(&self, user_id: Uuid, id: ScanId) -> Result<Option<Scan>> {
        let query = format!(
            r#"
            SELECT {SCAN_COLUMNS}
            FROM scans
            WHERE id = $1 AND user_id = $2
            "#
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_error("Failed to load scan"))?;

        row.as_ref().map(Self::map_scan).transpose()
    }

    async fn list_vulnerabilities(&self, scan_id: ScanId) -> Result<Vec<Vulnerability>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, scan_id, vulnerability_name, vulnerability_type, description,
                cwe_id, cwe_name, cvss_score, severity, ai_predicted_severity,
                ai_confidence, remediation, affected_url, evidence
            FROM vulnerabilities
            WHERE scan_id = $1
            ORDER BY
                CASE lower(severity)
                    WHEN 'critical' THEN 1
                    WHEN 'high' THEN 2
                    WHEN 'medium' THEN 3
                    WHEN 'low' THEN 4
                    ELSE 5
                END,
                id
            "#,
        )
        .bind(scan_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Failed to list vulnerabilities"))?;

        let mut vulnerabilities = rows
            .iter()
            .map(Self::map_vulnerability)
            .collect::<Result<Vec<_>>>()?;
        if vulnerabilities.is_empty() {
            return Ok(vulnerabilities);
        }

        let ids: Vec<i64> = vulnerabilities.iter().map(|v| v.id).collect();
        let cve_rows = sqlx::query(
            r#"
            SELECT vulnerability_id, cve_id, cve_description, cvss_v3_score, published_date
            FROM cve_mappings
            WHERE vulnerability_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Failed to load CVE mappings"))?;

        let mut by_vulnerability: HashMap<i64, Vec<Cve>> = HashMap::new();
        for row in &cve_rows {
            let (vulnerability_id, cve) = Self::map_cve(row)?;
            by_vulnerability.entry(vulnerability_id).or_default().push(cve);
        }
        for vulnerability in &mut vulnerabilities {
            if let Some(cves) = by_vulnerability.remove(&vulnerability.id) {
                vulnerability.cves = cves;
            }
        }

        Ok(vulnerabilities)
    }
}
