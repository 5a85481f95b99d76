//! In-memory repositories and a scripted engine.
//!
//! Available to this crate's tests and, behind the `test-utils` feature, to
//! downstream crates that want to exercise services without PostgreSQL.

use std::collections::HashMap;

use argon2::Params;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;
use vulnscan_model::{Scan, ScanId, ScanReport, ScanStatus, Severity, Vulnerability};

use crate::{
    database::ports::{
        scans::ScanRepository,
        users::UsersRepository,
        verification_tokens::{
            NewVerificationToken, VerificationTokenRecord,
            VerificationTokenRepository,
        },
    },
    domain::{
        scans::engine::{EngineError, ScanEngine},
        users::{User, auth::AuthCrypto},
    },
    error::{Result, StoreError},
};

/// [`AuthCrypto`] with Argon2 parameters cheap enough for tests.
pub fn test_crypto() -> AuthCrypto {
    let params = Params::new(1024, 1, 1, Some(32))
        .expect("static argon2 parameters are valid");
    AuthCrypto::with_params("pepper", "token-key", params)
        .expect("non-empty pepper and token key")
}

#[derive(Debug, Default)]
pub struct InMemoryUsersRepository {
    users: Mutex<HashMap<Uuid, (User, String)>>,
}

#[async_trait]
impl UsersRepository for InMemoryUsersRepository {
    async fn create_user_with_password(
        &self,
        user: &User,
        password_hash: &str,
    ) -> Result<()> {
        let mut users = self.users.lock().await;
        let email = user.email.to_lowercase();
        if users.values().any(|(u, _)| u.email.to_lowercase() == email) {
            return Err(StoreError::Conflict("Email already exists".into()));
        }
        users.insert(user.id, (user.clone(), password_hash.to_string()));
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(&id).map(|(u, _)| u.clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|(u, _)| u.email.to_lowercase() == email)
            .map(|(u, _)| u.clone()))
    }

    async fn get_user_password_hash(&self, id: Uuid) -> Result<Option<String>> {
        Ok(self.users.lock().await.get(&id).map(|(_, h)| h.clone()))
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut users = self.users.lock().await;
        let (_, hash) = users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        *hash = password_hash.to_string();
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> Result<bool> {
        let mut users = self.users.lock().await;
        let Some((user, _)) = users.get_mut(&id) else {
            return Ok(false);
        };
        let changed = !user.is_verified;
        user.is_verified = true;
        Ok(changed)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryVerificationTokenRepository {
    tokens: Mutex<Vec<VerificationTokenRecord>>,
}

impl InMemoryVerificationTokenRepository {
    /// Snapshot of every stored token, in insertion order.
    pub async fn records(&self) -> Vec<VerificationTokenRecord> {
        self.tokens.lock().await.clone()
    }
}

#[async_trait]
impl VerificationTokenRepository for InMemoryVerificationTokenRepository {
    async fn insert(&self, token: NewVerificationToken) -> Result<VerificationTokenRecord> {
        let record = VerificationTokenRecord {
            id: Uuid::now_v7(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        self.tokens.lock().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<VerificationTokenRecord>> {
        Ok(self
            .tokens
            .lock()
            .await
            .iter()
            .find(|record| record.token_hash == token_hash)
            .cloned())
    }

    async fn mark_used(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut tokens = self.tokens.lock().await;
        match tokens
            .iter_mut()
            .find(|record| record.token_hash == token_hash && record.used_at.is_none())
        {
            Some(record) => {
                record.used_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_stale(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|record| {
            let spent = record.used_at.is_some_and(|used| used < older_than);
            let expired = record.expires_at < older_than;
            !(spent || expired)
        });
        Ok((before - tokens.len()) as u64)
    }
}

#[derive(Debug, Default)]
struct ScanTables {
    next_scan_id: ScanId,
    next_vulnerability_id: i64,
    scans: Vec<Scan>,
    vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Default)]
pub struct InMemoryScanRepository {
    tables: Mutex<ScanTables>,
}

impl InMemoryScanRepository {
    /// Store a finding the way the engine would. Ids are assigned here.
    pub async fn insert_vulnerability(&self, mut vulnerability: Vulnerability) -> i64 {
        let mut tables = self.tables.lock().await;
        tables.next_vulnerability_id += 1;
        vulnerability.id = tables.next_vulnerability_id;
        let id = vulnerability.id;
        tables.vulnerabilities.push(vulnerability);
        id
    }

    /// Overwrite a scan's status the way the engine would.
    pub async fn set_status(&self, id: ScanId, status: ScanStatus) {
        let mut tables = self.tables.lock().await;
        if let Some(scan) = tables.scans.iter_mut().find(|scan| scan.id == id) {
            scan.scan_status = status;
            if status == ScanStatus::Completed {
                scan.completed_at = Some(Utc::now());
            }
        }
    }

    /// Every scan regardless of owner, in insertion order.
    pub async fn all_scans(&self) -> Vec<Scan> {
        self.tables.lock().await.scans.clone()
    }
}

#[async_trait]
impl ScanRepository for InMemoryScanRepository {
    async fn create_running(
        &self,
        user_id: Uuid,
        target_url: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Scan> {
        let mut tables = self.tables.lock().await;
        tables.next_scan_id += 1;
        let scan = Scan {
            id: tables.next_scan_id,
            user_id,
            target_url: target_url.to_string(),
            scan_status: ScanStatus::Running,
            started_at,
            completed_at: None,
            total_vulnerabilities: 0,
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            created_at: Utc::now(),
        };
        tables.scans.push(scan.clone());
        Ok(scan)
    }

    async fn mark_failed(&self, id: ScanId, _now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.scans.iter_mut().find(|scan| scan.id == id) {
            Some(scan) if scan.scan_status.can_transition_to(ScanStatus::Failed) => {
                scan.scan_status = ScanStatus::Failed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Scan>> {
        let tables = self.tables.lock().await;
        let mut scans: Vec<Scan> = tables
            .scans
            .iter()
            .filter(|scan| scan.user_id == user_id)
            .cloned()
            .collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        scans.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(scans)
    }

    async fn get_for_user(&self, user_id: Uuid, id: ScanId) -> Result<Option<Scan>> {
        Ok(self
            .tables
            .lock()
            .await
            .scans
            .iter()
            .find(|scan| scan.id == id && scan.user_id == user_id)
            .cloned())
    }

    async fn list_vulnerabilities(&self, scan_id: ScanId) -> Result<Vec<Vulnerability>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Vulnerability> = tables
            .vulnerabilities
            .iter()
            .filter(|vuln| vuln.scan_id == scan_id)
            .cloned()
            .collect();
        found.sort_by_key(|vuln| (vuln.severity.rank(), vuln.id));
        Ok(found)
    }
}

/// A finding with plausible defaults, for seeding repositories.
pub fn sample_vulnerability(scan_id: ScanId, severity: Severity) -> Vulnerability {
    Vulnerability {
        id: 0,
        scan_id,
        vulnerability_name: format!("{severity} finding"),
        vulnerability_type: Some("sql_injection".into()),
        description: Some("User input reaches a SQL query unescaped".into()),
        cwe_id: Some("CWE-89".into()),
        cwe_name: Some("SQL Injection".into()),
        cvss_score: Some(7.5),
        severity,
        ai_predicted_severity: Some(severity),
        ai_confidence: Some(0.87),
        remediation: Some("Use parameterized queries".into()),
        affected_url: Some("https://example.com/search?q=".into()),
        evidence: Some("syntax error at or near".into()),
        cves: Vec::new(),
    }
}

/// How a [`ScriptedEngine`] answers start requests.
#[derive(Debug, Clone)]
pub enum ScriptedStart {
    Accept(Map<String, Value>),
    Reject { status: u16, message: String },
    Unreachable,
    Timeout,
}

/// In-process [`ScanEngine`] that answers from a script and records calls.
#[derive(Debug)]
pub struct ScriptedEngine {
    start: ScriptedStart,
    pdf_fails: bool,
    started: Mutex<Vec<(ScanId, String)>>,
    reports: Mutex<Vec<ScanReport>>,
}

impl ScriptedEngine {
    pub fn new(start: ScriptedStart) -> Self {
        Self {
            start,
            pdf_fails: false,
            started: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
        }
    }

    /// Make PDF generation fail.
    pub fn failing_pdf(mut self) -> Self {
        self.pdf_fails = true;
        self
    }

    pub async fn started(&self) -> Vec<(ScanId, String)> {
        self.started.lock().await.clone()
    }

    pub async fn reports(&self) -> Vec<ScanReport> {
        self.reports.lock().await.clone()
    }
}

#[async_trait]
impl ScanEngine for ScriptedEngine {
    async fn start_scan(
        &self,
        scan_id: ScanId,
        url: &str,
    ) -> std::result::Result<Map<String, Value>, EngineError> {
        self.started.lock().await.push((scan_id, url.to_string()));
        match &self.start {
            ScriptedStart::Accept(payload) => Ok(payload.clone()),
            ScriptedStart::Reject { status, message } => Err(EngineError::Rejected {
                status: *status,
                message: message.clone(),
            }),
            ScriptedStart::Unreachable => {
                Err(EngineError::Unreachable("connection refused".into()))
            }
            ScriptedStart::Timeout => Err(EngineError::Timeout),
        }
    }

    async fn generate_pdf(
        &self,
        report: &ScanReport,
    ) -> std::result::Result<Vec<u8>, EngineError> {
        self.reports.lock().await.push(report.clone());
        if self.pdf_fails {
            return Err(EngineError::Rejected {
                status: 500,
                message: "renderer crashed".into(),
            });
        }
        Ok(format!("%PDF-1.4 report {}", report.scan.scan.id).into_bytes())
    }
}
