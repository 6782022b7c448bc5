//! Identity verification against the CRM
//!
//! Rules-based cross-check of declared facts against the authoritative record.
//! Deterministic given the same facts and records.

use crate::lookups::IdentityLookup;
use crate::models::{ApplicantFacts, ComplianceCheck, CustomerRecord, VerificationResult};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info};

pub const REASON_PHONE_REQUIRED: &str = "Phone number required";
pub const REASON_NOT_FOUND: &str = "Customer not found in our records";
pub const REASON_KYC_PENDING: &str = "KYC verification pending. Please complete KYC first";
pub const REASON_VERIFIED: &str = "Customer verification successful";

/// A single cross-check between declared facts and the CRM record
pub trait IdentityRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Human-readable reason reported when the rule fails
    fn failure_reason(&self) -> &'static str;

    fn check(&self, facts: &ApplicantFacts, record: &CustomerRecord) -> VerificationCheckResult;
}

pub struct VerificationCheckResult {
    pub passed: bool,
    pub details: String,
}

/// Verification engine that enforces identity rules
pub struct VerificationEngine {
    rules: Vec<Box<dyn IdentityRule>>,
}

impl VerificationEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn IdentityRule>) {
        self.rules.push(rule);
    }

    /// Verify declared facts. All rules must pass.
    pub fn verify(&self, facts: &ApplicantFacts, identity: &dyn IdentityLookup) -> VerificationResult {
        let Some(phone) = facts.phone.as_deref().map(normalize_phone) else {
            return failure(REASON_PHONE_REQUIRED, Vec::new(), None);
        };

        let record = identity.by_phone(&phone).or_else(|| {
            debug!("No CRM record for phone, falling back to name search");
            facts.name.as_deref().and_then(|name| identity.by_name(name))
        });

        let Some(record) = record else {
            return failure(REASON_NOT_FOUND, Vec::new(), None);
        };

        if !record.kyc_verified {
            return failure(REASON_KYC_PENDING, Vec::new(), Some(record.phone));
        }

        let mut checks = Vec::with_capacity(self.rules.len());
        let mut reasons = Vec::new();

        for rule in &self.rules {
            let result = rule.check(facts, &record);
            if !result.passed {
                reasons.push(rule.failure_reason());
            }
            checks.push(ComplianceCheck {
                rule_name: rule.name().to_string(),
                passed: result.passed,
                details: result.details,
            });
        }

        let verified = reasons.is_empty();

        info!(
            rule_count = self.rules.len(),
            verified = verified,
            "Identity verification completed"
        );

        if verified {
            VerificationResult {
                verified: true,
                reason: REASON_VERIFIED.to_string(),
                checks,
                matched_customer: Some(record.phone),
                verified_at: Utc::now(),
            }
        } else {
            failure(&reasons.join("; "), checks, Some(record.phone))
        }
    }
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn failure(
    reason: &str,
    checks: Vec<ComplianceCheck>,
    matched_customer: Option<String>,
) -> VerificationResult {
    VerificationResult {
        verified: false,
        reason: reason.to_string(),
        checks,
        matched_customer,
        verified_at: Utc::now(),
    }
}

/// Digits only, with a leading 91 country code dropped from 12-digit numbers.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.strip_prefix("91") {
        Some(local) if digits.len() == 12 => local.to_string(),
        _ => digits,
    }
}

fn name_tokens(name: &str) -> HashSet<String> {
    name.split_whitespace().map(str::to_lowercase).collect()
}

//
// ========== Identity Rules ==========
//

/// Rule: declared name shares at least one token with the CRM name.
/// Deliberately loose: "Raj Kumar" matches "Rajesh Kumar".
pub struct NameMatchRule;

impl IdentityRule for NameMatchRule {
    fn name(&self) -> &'static str {
        "name_match"
    }

    fn failure_reason(&self) -> &'static str {
        "Name mismatch"
    }

    fn check(&self, facts: &ApplicantFacts, record: &CustomerRecord) -> VerificationCheckResult {
        let declared = name_tokens(facts.name.as_deref().unwrap_or_default());
        let on_file = name_tokens(&record.name);
        let shared = declared.intersection(&on_file).count();

        VerificationCheckResult {
            passed: shared >= 1,
            details: format!("{} shared name token(s)", shared),
        }
    }
}

/// Rule: normalized phone numbers are identical
pub struct PhoneMatchRule;

impl IdentityRule for PhoneMatchRule {
    fn name(&self) -> &'static str {
        "phone_match"
    }

    fn failure_reason(&self) -> &'static str {
        "Phone number mismatch"
    }

    fn check(&self, facts: &ApplicantFacts, record: &CustomerRecord) -> VerificationCheckResult {
        let declared = facts.phone.as_deref().map(normalize_phone).unwrap_or_default();
        let passed = !declared.is_empty() && declared == normalize_phone(&record.phone);

        VerificationCheckResult {
            passed,
            details: if passed {
                "Phone number matches record".to_string()
            } else {
                "Phone number differs from record".to_string()
            },
        }
    }
}

/// Rule: CRM marks KYC as complete
pub struct KycStatusRule;

impl IdentityRule for KycStatusRule {
    fn name(&self) -> &'static str {
        "kyc_status"
    }

    fn failure_reason(&self) -> &'static str {
        "KYC not completed"
    }

    fn check(&self, _facts: &ApplicantFacts, record: &CustomerRecord) -> VerificationCheckResult {
        VerificationCheckResult {
            passed: record.kyc_verified,
            details: format!("kyc_verified={}", record.kyc_verified),
        }
    }
}

/// Create a verification engine with the standard identity rules
pub fn create_default_verification_engine() -> VerificationEngine {
    let mut engine = VerificationEngine::new();
    engine.add_rule(Box::new(NameMatchRule));
    engine.add_rule(Box::new(PhoneMatchRule));
    engine.add_rule(Box::new(KycStatusRule));
    engine
}

//
// ================= Tests =================
//
