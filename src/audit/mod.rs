//! Decision audit log
//!
//! Every terminal decision is appended with a SHA-256 hash of the facts and
//! outcome it was made on, so a stored record can be checked for tampering.

use crate::models::{
    ApplicantFacts, ArtifactReference, Phase, UnderwritingDecision, VerificationResult,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DecisionOutcome {
    Verification(VerificationResult),
    Underwriting(UnderwritingDecision),
    Sanction(ArtifactReference),
}

impl DecisionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionOutcome::Verification(_) => "verification",
            DecisionOutcome::Underwriting(_) => "underwriting",
            DecisionOutcome::Sanction(_) => "sanction",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub audit_id: Uuid,
    pub session_id: String,
    pub phase: Phase,
    pub facts: ApplicantFacts,
    pub outcome: DecisionOutcome,
    pub context_hash: String,
    pub created_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(
        session_id: impl Into<String>,
        phase: Phase,
        facts: ApplicantFacts,
        outcome: DecisionOutcome,
    ) -> Self {
        let session_id = session_id.into();
        let context_hash = compute_decision_hash(&session_id, &facts, &outcome);

        Self {
            audit_id: Uuid::new_v4(),
            session_id,
            phase,
            facts,
            outcome,
            context_hash,
            created_at: Utc::now(),
        }
    }
}

/// Audit trail storage
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, DecisionRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Append a decision record
    pub async fn record(&self, record: DecisionRecord) -> Result<Uuid> {
        let audit_id = record.audit_id;
        let mut records = self.records.write().await;
        records.insert(audit_id, record);
        Ok(audit_id)
    }

    pub async fn get(&self, audit_id: Uuid) -> Result<Option<DecisionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&audit_id).cloned())
    }

    /// Decision records for a session, oldest first
    pub async fn list_for_session(&self, session_id: &str) -> Result<Vec<DecisionRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<DecisionRecord> = records
            .values()
            .filter(|record| record.session_id == session_id)
            .cloned()
            .collect();

        items.sort_by_key(|record| record.created_at);

        Ok(items)
    }

    /// Recompute the hash of a stored record and compare
    pub async fn verify_integrity(&self, audit_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        if let Some(record) = records.get(&audit_id) {
            let current_hash =
                compute_decision_hash(&record.session_id, &record.facts, &record.outcome);
            Ok(current_hash == record.context_hash)
        } else {
            Ok(false)
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct HashedContent<'a> {
    session_id: &'a str,
    facts: &'a ApplicantFacts,
    outcome: &'a DecisionOutcome,
}

/// SHA-256 over the JSON of session id, facts and outcome, hex encoded.
/// Streams the serialization into the hasher.
pub fn compute_decision_hash(
    session_id: &str,
    facts: &ApplicantFacts,
    outcome: &DecisionOutcome,
) -> String {
    let mut hasher = Sha256::new();
    let content = HashedContent {
        session_id,
        facts,
        outcome,
    };

    if serde_json::to_writer(&mut HashWriter(&mut hasher), &content).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verification(verified: bool) -> DecisionOutcome {
        DecisionOutcome::Verification(VerificationResult {
            verified,
            reason: "Name mismatch".to_string(),
            checks: vec![],
            matched_customer: None,
            verified_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_record_and_verify_integrity() {
        let log = AuditLog::new();
        let facts = ApplicantFacts {
            name: Some("Rajesh Kumar".into()),
            ..Default::default()
        };

        let id = log
            .record(DecisionRecord::new("s-1", Phase::Verifying, facts, verification(false)))
            .await
            .unwrap();

        assert!(log.verify_integrity(id).await.unwrap());
        assert!(!log.verify_integrity(Uuid::new_v4()).await.unwrap());

        let stored = log.get(id).await.unwrap().unwrap();
        assert_eq!(stored.context_hash.len(), 64);
        assert_eq!(stored.outcome.label(), "verification");
    }

    #[tokio::test]
    async fn test_tampered_record_fails_integrity() {
        let log = AuditLog::new();
        let mut record =
            DecisionRecord::new("s-1", Phase::Verifying, ApplicantFacts::default(), verification(false));
        record.outcome = verification(true);

        let id = log.record(record).await.unwrap();
        assert!(!log.verify_integrity(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_for_session_filters_by_id() {
        let log = AuditLog::new();
        for session in ["a", "b", "a"] {
            log.record(DecisionRecord::new(
                session,
                Phase::Verifying,
                ApplicantFacts::default(),
                verification(true),
            ))
            .await
            .unwrap();
        }

        assert_eq!(log.list_for_session("a").await.unwrap().len(), 2);
        assert!(log.list_for_session("c").await.unwrap().is_empty());
    }
}
