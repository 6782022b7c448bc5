//! Core data models for the loan origination flow

use crate::error::OriginationError;
use crate::memory::Transcript;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Enums =================
//

/// Conversation phase. Variants are declared in flow order, so the derived
/// `Ord` is the forward order of the state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initial,
    Collecting,
    Verifying,
    Underwriting,
    Sanctioning,
    Completed,
    /// Anything a store hands back that this build does not recognise.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Number,
    Phone,
}

/// Required applicant fields, in the order they are collected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Name,
    Phone,
    LoanAmount,
    TenureMonths,
    EmploymentType,
    MonthlyIncome,
}

impl Slot {
    pub const ORDER: [Slot; 6] = [
        Slot::Name,
        Slot::Phone,
        Slot::LoanAmount,
        Slot::TenureMonths,
        Slot::EmploymentType,
        Slot::MonthlyIncome,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Slot::Name => "name",
            Slot::Phone => "phone",
            Slot::LoanAmount => "loan_amount",
            Slot::TenureMonths => "tenure_months",
            Slot::EmploymentType => "employment_type",
            Slot::MonthlyIncome => "monthly_income",
        }
    }

    pub fn input_type(&self) -> InputType {
        match self {
            Slot::Name | Slot::EmploymentType => InputType::Text,
            Slot::Phone => InputType::Phone,
            Slot::LoanAmount | Slot::TenureMonths | Slot::MonthlyIncome => InputType::Number,
        }
    }
}

/// A typed value produced by the field extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(u64),
}

//
// ================= Applicant =================
//

/// Applicant facts as they are collected, one slot per turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantFacts {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub loan_amount: Option<u64>,
    pub tenure_months: Option<u32>,
    pub employment_type: Option<String>,
    pub monthly_income: Option<u64>,
}

impl ApplicantFacts {
    pub fn is_filled(&self, slot: Slot) -> bool {
        match slot {
            Slot::Name => self.name.is_some(),
            Slot::Phone => self.phone.is_some(),
            Slot::LoanAmount => self.loan_amount.is_some(),
            Slot::TenureMonths => self.tenure_months.is_some(),
            Slot::EmploymentType => self.employment_type.is_some(),
            Slot::MonthlyIncome => self.monthly_income.is_some(),
        }
    }

    /// First unfilled slot in collection order.
    pub fn next_missing(&self) -> Option<Slot> {
        Slot::ORDER.into_iter().find(|slot| !self.is_filled(*slot))
    }

    pub fn is_complete(&self) -> bool {
        self.next_missing().is_none()
    }

    /// Set a slot. A slot, once set, keeps its value for the whole session.
    pub fn fill(&mut self, slot: Slot, value: FieldValue) -> Result<()> {
        if self.is_filled(slot) {
            return Err(OriginationError::SlotAlreadyFilled(slot.name().to_string()));
        }

        match (slot, value) {
            (Slot::Name, FieldValue::Text(v)) => self.name = Some(v),
            (Slot::Phone, FieldValue::Text(v)) => self.phone = Some(v),
            (Slot::EmploymentType, FieldValue::Text(v)) => self.employment_type = Some(v),
            (Slot::LoanAmount, FieldValue::Number(v)) => self.loan_amount = Some(v),
            (Slot::MonthlyIncome, FieldValue::Number(v)) => self.monthly_income = Some(v),
            (Slot::TenureMonths, FieldValue::Number(v)) => {
                let months = u32::try_from(v).map_err(|_| {
                    OriginationError::IncompleteApplication(format!("tenure out of range: {}", v))
                })?;
                self.tenure_months = Some(months);
            }
            (slot, value) => {
                return Err(OriginationError::IncompleteApplication(format!(
                    "value {:?} does not fit slot {}",
                    value,
                    slot.name()
                )))
            }
        }

        Ok(())
    }

    /// Promote to a complete application, or report the missing slots.
    pub fn complete(&self) -> Result<LoanApplication> {
        match (
            &self.name,
            &self.phone,
            self.loan_amount,
            self.tenure_months,
            &self.employment_type,
            self.monthly_income,
        ) {
            (
                Some(name),
                Some(phone),
                Some(loan_amount),
                Some(tenure_months),
                Some(employment_type),
                Some(monthly_income),
            ) => Ok(LoanApplication {
                name: name.clone(),
                phone: phone.clone(),
                employment_type: employment_type.clone(),
                monthly_income,
                loan_amount,
                tenure_months,
            }),
            _ => {
                let missing: Vec<&str> = Slot::ORDER
                    .iter()
                    .filter(|slot| !self.is_filled(**slot))
                    .map(|slot| slot.name())
                    .collect();
                Err(OriginationError::IncompleteApplication(format!(
                    "missing slots: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// All six applicant facts present. Underwriting only accepts this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub name: String,
    pub phone: String,
    pub employment_type: String,
    pub monthly_income: u64,
    pub loan_amount: u64,
    pub tenure_months: u32,
}

impl LoanApplication {
    pub fn loan_request(&self) -> LoanRequest {
        LoanRequest {
            amount: self.loan_amount,
            tenure_months: self.tenure_months,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub amount: u64,
    pub tenure_months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

//
// ================= External Records =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub age: u32,
    pub kyc_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditProfile {
    /// Bureau score, 300–900.
    pub score: u32,
    pub credit_history: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreApprovedOffer {
    pub limit: u64,
    pub annual_rate_pct: f64,
    pub valid_until: DateTime<Utc>,
}

impl PreApprovedOffer {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}

//
// ================= Verification =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub rule_name: String,
    pub passed: bool,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub reason: String,
    pub checks: Vec<ComplianceCheck>,
    /// Phone of the CRM record the facts were matched against, if any.
    pub matched_customer: Option<String>,
    pub verified_at: DateTime<Utc>,
}

//
// ================= Underwriting =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionTerms {
    pub approved_amount: f64,
    pub annual_rate_pct: f64,
    pub tenure_months: u32,
    pub emi: f64,
    pub total_payable: f64,
    pub total_interest: f64,
    pub processing_fee: f64,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclineDetails {
    pub reason: String,
    /// Machine-readable names of the checks that failed.
    pub failed_checks: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum UnderwritingVerdict {
    Approved(SanctionTerms),
    Declined(DeclineDetails),
}

impl UnderwritingVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, UnderwritingVerdict::Approved(_))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            UnderwritingVerdict::Approved(_) => "approved",
            UnderwritingVerdict::Declined(_) => "declined",
        }
    }
}

/// Verdict plus the evidence it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingDecision {
    pub verdict: UnderwritingVerdict,
    pub credit_score: u32,
    pub pre_approved_limit: u64,
    pub checks: Vec<ComplianceCheck>,
    pub notes: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

//
// ================= Sanction =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub reference_id: String,
    pub location: String,
    pub generated_at: DateTime<Utc>,
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub session_id: String,
    pub phase: Phase,
    pub facts: ApplicantFacts,
    #[serde(default)]
    pub income_proof: Option<DocumentUpload>,
    #[serde(default)]
    pub verification: Option<VerificationResult>,
    #[serde(default)]
    pub underwriting: Option<UnderwritingDecision>,
    #[serde(default)]
    pub artifact: Option<ArtifactReference>,
    #[serde(default)]
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            phase: Phase::Initial,
            facts: ApplicantFacts::default(),
            income_proof: None,
            verification: None,
            underwriting: None,
            artifact: None,
            transcript: Transcript::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn loan_request(&self) -> Option<LoanRequest> {
        Some(LoanRequest {
            amount: self.facts.loan_amount?,
            tenure_months: self.facts.tenure_months?,
        })
    }

    pub fn income_proof_submitted(&self) -> bool {
        self.income_proof.is_some()
    }

    /// Move forward to `next`. Backward moves are ignored and reported as `false`.
    pub fn advance_to(&mut self, next: Phase) -> bool {
        if next <= self.phase {
            return false;
        }
        self.phase = next;
        self.updated_at = Utc::now();
        true
    }

    /// Attach the verification result. The first result wins.
    pub fn record_verification(&mut self, result: VerificationResult) -> &VerificationResult {
        self.updated_at = Utc::now();
        self.verification.get_or_insert(result)
    }

    /// Attach the underwriting decision. The first decision wins.
    pub fn record_underwriting(&mut self, decision: UnderwritingDecision) -> &UnderwritingDecision {
        self.updated_at = Utc::now();
        self.underwriting.get_or_insert(decision)
    }
}

//
// ================= Turn I/O =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub message: String,
    pub requires_input: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
    pub phase: Phase,
}

impl TurnResponse {
    pub fn prompt(message: impl Into<String>, input_type: Option<InputType>) -> Self {
        Self {
            message: message.into(),
            requires_input: true,
            input_type,
            phase: Phase::Initial,
        }
    }

    /// A reply that does not wait for user input (the client sends a follow-up turn).
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requires_input: false,
            input_type: None,
            phase: Phase::Initial,
        }
    }

    pub fn in_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Initial => "initial",
            Phase::Collecting => "collecting",
            Phase::Verifying => "verifying",
            Phase::Underwriting => "underwriting",
            Phase::Sanctioning => "sanctioning",
            Phase::Completed => "completed",
            Phase::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_fill_in_order_and_are_immutable() {
        let mut facts = ApplicantFacts::default();
        assert_eq!(facts.next_missing(), Some(Slot::Name));

        facts
            .fill(Slot::Name, FieldValue::Text("Rajesh Kumar".into()))
            .unwrap();
        assert_eq!(facts.next_missing(), Some(Slot::Phone));

        let again = facts.fill(Slot::Name, FieldValue::Text("Someone Else".into()));
        assert!(matches!(again, Err(OriginationError::SlotAlreadyFilled(_))));
        assert_eq!(facts.name.as_deref(), Some("Rajesh Kumar"));
    }

    #[test]
    fn test_complete_reports_missing_slots() {
        let facts = ApplicantFacts {
            name: Some("Rajesh Kumar".into()),
            phone: Some("9876543210".into()),
            ..Default::default()
        };

        let err = facts.complete().unwrap_err().to_string();
        assert!(err.contains("loan_amount"));
        assert!(err.contains("monthly_income"));
        assert!(!err.contains("phone"));
    }

    #[test]
    fn test_phase_only_moves_forward() {
        let mut record = ConversationRecord::new("s-1");
        assert!(record.advance_to(Phase::Collecting));
        assert!(record.advance_to(Phase::Verifying));
        assert!(!record.advance_to(Phase::Collecting));
        assert_eq!(record.phase, Phase::Verifying);
    }

    #[test]
    fn test_unknown_phase_deserializes() {
        let phase: Phase = serde_json::from_str("\"negotiating\"").unwrap();
        assert_eq!(phase, Phase::Unknown);
    }

    #[test]
    fn test_verdict_serializes_with_tag() {
        let verdict = UnderwritingVerdict::Declined(DeclineDetails {
            reason: "r".into(),
            failed_checks: vec!["credit_score_check".into()],
            suggestions: vec![],
        });
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["decision"], "declined");
        assert_eq!(json["failed_checks"][0], "credit_score_check");
    }
}
