//! Conversation orchestrator - the loan origination state machine
//!
//! INITIAL → COLLECTING → VERIFYING → UNDERWRITING → SANCTIONING → COMPLETED
//!
//! Phases only move forward. A failed verification or a declined underwriting
//! verdict ends the flow in the phase where it happened.

use crate::audit::{AuditLog, DecisionOutcome, DecisionRecord};
use crate::classifier::{UtteranceClassifier, UtteranceKind};
use crate::error::OriginationError;
use crate::extraction::FieldExtractor;
use crate::gemini::FreeTextGenerator;
use crate::lookups::{
    CreditLookup, IdentityLookup, MockCreditBureau, MockCrm, MockOfferMart, OfferLookup,
};
use crate::memory::MessageRole;
use crate::models::{
    ApplicantFacts, ArtifactReference, ConversationRecord, CustomerRecord, DocumentUpload, Phase,
    SanctionTerms, Slot, TurnResponse, UnderwritingVerdict,
};
use crate::pricing::{format_inr, format_rupees};
use crate::sanction::ArtifactGenerator;
use crate::state::{SessionLocks, SessionPolicy, SessionStore};
use crate::underwriting::UnderwritingEngine;
use crate::verification::VerificationEngine;
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const WELCOME: &str = "Hello! Welcome to our Personal Loan Assistant. I can help you with loan \
    amounts up to ₹40 lakhs with interest rates starting from 10.99% per annum. Shall we start \
    with your full name?";

const INTRODUCTION: &str = "Hello! I'm your Personal Loan Assistant. I can help you with personal \
    loans up to ₹40 lakhs. Say hi or tell me you need a loan to get started.";

const LOAN_INTEREST: &str = "Great! I'd be happy to help you with a personal loan. Let me gather \
    some information to find you the best offer. What's your full name?";

const ARTIFACT_UNAVAILABLE: &str = "Your loan is approved, but we could not generate your \
    sanction letter just now. Please send any message to try again.";

const CLOSING: &str = "You're welcome! If you have any questions about your loan in the future, \
    feel free to contact us. Have a great day!";

const ANYTHING_ELSE: &str = "Is there anything else I can help you with regarding your loan?";

const NOT_UNDERSTOOD: &str = "I'm sorry, I didn't understand. Could you please rephrase?";

/// Read-only collaborators shared by every session
#[derive(Clone)]
pub struct Lookups {
    pub credit: Arc<dyn CreditLookup>,
    pub offers: Arc<dyn OfferLookup>,
    pub identity: Arc<dyn IdentityLookup>,
}

impl Lookups {
    /// Demo bureau, offer mart and CRM
    pub fn seeded() -> Self {
        Self {
            credit: Arc::new(MockCreditBureau::seeded()),
            offers: Arc::new(MockOfferMart::seeded()),
            identity: Arc::new(MockCrm::seeded()),
        }
    }
}

/// Main orchestrator that drives one turn at a time per session
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    session_policy: SessionPolicy,
    verification_engine: VerificationEngine,
    underwriting_engine: UnderwritingEngine,
    lookups: Lookups,
    artifacts: Arc<dyn ArtifactGenerator>,
    free_text: Option<Arc<dyn FreeTextGenerator>>,
    audit_log: Arc<AuditLog>,
    /// Letters generated but not yet persisted with their session
    issued_artifacts: RwLock<HashMap<String, ArtifactReference>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        verification_engine: VerificationEngine,
        underwriting_engine: UnderwritingEngine,
        lookups: Lookups,
        artifacts: Arc<dyn ArtifactGenerator>,
        audit_log: Arc<AuditLog>,
    ) -> Self {
        Self {
            store,
            locks: SessionLocks::new(),
            session_policy: SessionPolicy::default(),
            verification_engine,
            underwriting_engine,
            lookups,
            artifacts,
            free_text: None,
            audit_log,
            issued_artifacts: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_free_text(mut self, generator: Arc<dyn FreeTextGenerator>) -> Self {
        self.free_text = Some(generator);
        self
    }

    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// Customer records known to the identity lookup
    pub fn customers(&self) -> Vec<CustomerRecord> {
        self.lookups.identity.all()
    }

    /// Process one inbound message for a session
    pub async fn handle_turn(&self, session_id: &str, message: &str) -> Result<TurnResponse> {
        let _guard = self.locks.acquire(session_id).await;

        let mut record = self.load_or_start(session_id).await?;
        let phase_before = record.phase;

        record.transcript.push(MessageRole::User, message);

        let response = self.dispatch(&mut record, message).await?;

        record.transcript.push(MessageRole::Agent, response.message.clone());
        record.updated_at = Utc::now();
        if let Err(e) = self.store.save(&record).await {
            if let Some(artifact) = &record.artifact {
                warn!(
                    session_id = %session_id,
                    reference_id = %artifact.reference_id,
                    "Session save failed after sanction letter was issued"
                );
            }
            return Err(e);
        }

        if phase_before == Phase::Sanctioning && record.artifact.is_some() {
            self.issued_artifacts.write().await.remove(session_id);
        }

        info!(
            session_id = %session_id,
            from = %phase_before,
            to = %record.phase,
            requires_input = response.requires_input,
            "Turn handled"
        );

        Ok(response.in_phase(record.phase))
    }

    /// Mark the income-proof document as submitted for a session
    pub async fn record_income_proof(
        &self,
        session_id: &str,
        filename: &str,
    ) -> Result<DocumentUpload> {
        let _guard = self.locks.acquire(session_id).await;

        let mut record = self
            .store
            .load(session_id)
            .await?
            .filter(|record| !self.session_policy.is_expired(record, Utc::now()))
            .ok_or_else(|| OriginationError::SessionNotFound(session_id.to_string()))?;

        let upload = DocumentUpload {
            filename: filename.to_string(),
            uploaded_at: Utc::now(),
        };

        record.income_proof = Some(upload.clone());
        record.updated_at = upload.uploaded_at;
        self.store.save(&record).await?;

        info!(session_id = %session_id, "Income proof recorded");

        Ok(upload)
    }

    /// Current record for a session, if any
    pub async fn snapshot(&self, session_id: &str) -> Result<Option<ConversationRecord>> {
        self.store.load(session_id).await
    }

    /// Drop sessions idle past the policy TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let Some(cutoff) = self.session_policy.cutoff(Utc::now()) else {
            return Ok(0);
        };

        let purged = self.store.purge_idle_before(cutoff).await?;
        self.locks.forget(&purged).await;

        let mut issued = self.issued_artifacts.write().await;
        for id in &purged {
            issued.remove(id);
        }
        drop(issued);

        if !purged.is_empty() {
            info!(count = purged.len(), "Purged idle sessions");
        }

        Ok(purged.len())
    }

    async fn load_or_start(&self, session_id: &str) -> Result<ConversationRecord> {
        match self.store.load(session_id).await? {
            Some(record) if self.session_policy.is_expired(&record, Utc::now()) => {
                info!(session_id = %session_id, "Session idle past TTL, starting over");
                self.store.remove(session_id).await?;
                Ok(ConversationRecord::new(session_id))
            }
            Some(record) => Ok(record),
            None => {
                debug!(session_id = %session_id, "Starting new session");
                Ok(ConversationRecord::new(session_id))
            }
        }
    }

    async fn dispatch(&self, record: &mut ConversationRecord, message: &str) -> Result<TurnResponse> {
        match record.phase {
            Phase::Initial => Ok(self.handle_initial(record, message)),
            Phase::Collecting => self.handle_collecting(record, message),
            Phase::Verifying => self.handle_verifying(record).await,
            Phase::Underwriting => self.handle_underwriting(record).await,
            Phase::Sanctioning => self.handle_sanctioning(record).await,
            Phase::Completed => Ok(handle_completed(message)),
            Phase::Unknown => Ok(self.handle_unknown(record, message).await),
        }
    }

    //
    // ========== Phase Handlers ==========
    //

    fn handle_initial(&self, record: &mut ConversationRecord, message: &str) -> TurnResponse {
        match UtteranceClassifier::classify(message) {
            UtteranceKind::Greeting => {
                record.advance_to(Phase::Collecting);
                TurnResponse::prompt(WELCOME, Some(Slot::Name.input_type()))
            }
            UtteranceKind::LoanInterest => {
                record.advance_to(Phase::Collecting);
                TurnResponse::prompt(LOAN_INTEREST, Some(Slot::Name.input_type()))
            }
            UtteranceKind::Gratitude | UtteranceKind::Other => {
                TurnResponse::prompt(INTRODUCTION, None)
            }
        }
    }

    fn handle_collecting(
        &self,
        record: &mut ConversationRecord,
        message: &str,
    ) -> Result<TurnResponse> {
        let Some(slot) = record.facts.next_missing() else {
            record.advance_to(Phase::Verifying);
            return Ok(details_complete(&record.facts));
        };

        let Some(value) = FieldExtractor::extract(slot, message) else {
            debug!(slot = slot.name(), "Extraction miss, re-prompting");
            return Ok(slot_prompt(slot, &record.facts));
        };

        record.facts.fill(slot, value)?;
        debug!(slot = slot.name(), "Slot filled");

        match record.facts.next_missing() {
            Some(next) => Ok(slot_prompt(next, &record.facts)),
            None => {
                record.advance_to(Phase::Verifying);
                Ok(details_complete(&record.facts))
            }
        }
    }

    async fn handle_verifying(&self, record: &mut ConversationRecord) -> Result<TurnResponse> {
        if record.verification.is_none() {
            record.facts.complete()?;

            let result = self
                .verification_engine
                .verify(&record.facts, self.lookups.identity.as_ref());

            self.audit(record, DecisionOutcome::Verification(result.clone()))
                .await?;
            record.record_verification(result);
        }

        let verified = record
            .verification
            .as_ref()
            .map(|result| (result.verified, result.reason.clone()));

        match verified {
            Some((true, _)) => {
                record.advance_to(Phase::Underwriting);
                Ok(TurnResponse::notice(
                    "Verification successful! Your details have been confirmed. Now I'll check \
                     your credit score and loan eligibility.",
                ))
            }
            Some((false, reason)) => {
                warn!(session_id = %record.session_id, "Verification failed");
                Ok(TurnResponse::notice(format!(
                    "Verification failed: {}. Please contact our customer service for assistance.",
                    reason
                )))
            }
            None => Err(OriginationError::IncompleteApplication(
                "verification result missing after evaluation".to_string(),
            )),
        }
    }

    async fn handle_underwriting(&self, record: &mut ConversationRecord) -> Result<TurnResponse> {
        if record.underwriting.is_none() {
            let application = record.facts.complete()?;

            let decision = self.underwriting_engine.evaluate(
                &application,
                record.income_proof_submitted(),
                self.lookups.credit.as_ref(),
                self.lookups.offers.as_ref(),
            );

            self.audit(record, DecisionOutcome::Underwriting(decision.clone()))
                .await?;
            record.record_underwriting(decision);
        }

        let verdict = record
            .underwriting
            .as_ref()
            .map(|decision| decision.verdict.clone())
            .ok_or_else(|| {
                OriginationError::IncompleteApplication(
                    "underwriting decision missing after evaluation".to_string(),
                )
            })?;

        match verdict {
            UnderwritingVerdict::Approved(terms) => {
                record.advance_to(Phase::Sanctioning);
                Ok(TurnResponse::notice(approval_message(&terms)))
            }
            UnderwritingVerdict::Declined(details) => {
                info!(
                    session_id = %record.session_id,
                    failed_checks = ?details.failed_checks,
                    "Application declined"
                );

                let mut message = format!(
                    "Unfortunately, your loan application has been declined. Reason: {}.",
                    details.reason
                );
                if !details.suggestions.is_empty() {
                    message.push_str(" Suggestions: ");
                    message.push_str(&details.suggestions.join("; "));
                    message.push('.');
                }
                Ok(TurnResponse::notice(message))
            }
        }
    }

    async fn handle_sanctioning(&self, record: &mut ConversationRecord) -> Result<TurnResponse> {
        if record.artifact.is_none() {
            let unsaved = self
                .issued_artifacts
                .read()
                .await
                .get(&record.session_id)
                .cloned();

            if let Some(artifact) = unsaved {
                info!(
                    session_id = %record.session_id,
                    reference_id = %artifact.reference_id,
                    "Reusing sanction letter from an unsaved turn"
                );
                record.artifact = Some(artifact);
            }
        }

        if let Some(artifact) = &record.artifact {
            let reference_id = artifact.reference_id.clone();
            record.advance_to(Phase::Completed);
            return Ok(TurnResponse::notice(sanction_message(&reference_id)));
        }

        let application = record.facts.complete()?;
        let terms = approved_terms(record)?;

        let artifact = match self
            .artifacts
            .generate(&application, &application.loan_request(), &terms)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(
                    session_id = %record.session_id,
                    error = %e,
                    "Sanction letter generation failed"
                );
                return Ok(TurnResponse::notice(ARTIFACT_UNAVAILABLE));
            }
        };

        self.issued_artifacts
            .write()
            .await
            .insert(record.session_id.clone(), artifact.clone());

        self.audit(record, DecisionOutcome::Sanction(artifact.clone()))
            .await?;

        let reference_id = artifact.reference_id.clone();
        record.artifact = Some(artifact);
        record.advance_to(Phase::Completed);

        Ok(TurnResponse::notice(sanction_message(&reference_id)))
    }

    async fn handle_unknown(&self, record: &ConversationRecord, message: &str) -> TurnResponse {
        let Some(generator) = &self.free_text else {
            return TurnResponse::prompt(NOT_UNDERSTOOD, None);
        };

        match generator.generate(message, record).await {
            Ok(text) => TurnResponse::prompt(text, None),
            Err(e) => {
                warn!(session_id = %record.session_id, error = %e, "Free-text fallback failed");
                TurnResponse::prompt(NOT_UNDERSTOOD, None)
            }
        }
    }

    async fn audit(&self, record: &ConversationRecord, outcome: DecisionOutcome) -> Result<()> {
        let entry = DecisionRecord::new(
            record.session_id.clone(),
            record.phase,
            record.facts.clone(),
            outcome,
        );
        let audit_id = self.audit_log.record(entry).await?;
        debug!(session_id = %record.session_id, audit_id = %audit_id, "Decision audited");
        Ok(())
    }
}

fn handle_completed(message: &str) -> TurnResponse {
    if UtteranceClassifier::is_gratitude(message) {
        TurnResponse::notice(CLOSING)
    } else {
        TurnResponse::prompt(ANYTHING_ELSE, None)
    }
}

fn approved_terms(record: &ConversationRecord) -> Result<SanctionTerms> {
    match record.underwriting.as_ref().map(|decision| &decision.verdict) {
        Some(UnderwritingVerdict::Approved(terms)) => Ok(terms.clone()),
        _ => Err(OriginationError::IncompleteApplication(
            "sanction requested without an approved verdict".to_string(),
        )),
    }
}

//
// ========== Prompts ==========
//

/// Prompt for `slot`. Depends only on facts already collected, so a re-prompt
/// after a miss repeats the previous prompt exactly.
fn slot_prompt(slot: Slot, facts: &ApplicantFacts) -> TurnResponse {
    let name = facts.name.as_deref().unwrap_or("there");

    let message = match slot {
        Slot::Name => "What is your full name, please?".to_string(),
        Slot::Phone => format!(
            "Thank you, {}. Please provide your 10-digit mobile number for verification.",
            name
        ),
        Slot::LoanAmount => "What loan amount are you looking for? (Please enter the amount in \
            rupees, e.g., 500000 for ₹5 lakhs)"
            .to_string(),
        Slot::TenureMonths => match facts.loan_amount {
            Some(amount) => format!(
                "For a loan of {}, what tenure would you prefer? (Please enter months between \
                 6 and 60, e.g., 24 for 2 years)",
                format_inr(amount)
            ),
            None => "What loan tenure would you prefer? (Please enter months between 6 and 60)"
                .to_string(),
        },
        Slot::EmploymentType => {
            "What is your employment type? (e.g., Salaried, Self-employed, Business owner)"
                .to_string()
        }
        Slot::MonthlyIncome => "Please enter your monthly income in rupees (e.g., 50000)".to_string(),
    };

    TurnResponse::prompt(message, Some(slot.input_type()))
}

fn details_complete(facts: &ApplicantFacts) -> TurnResponse {
    TurnResponse::notice(format!(
        "Perfect! Thank you for providing your details, {}. Now I'll verify your information \
         and check your eligibility.",
        facts.name.as_deref().unwrap_or("there")
    ))
}

fn approval_message(terms: &SanctionTerms) -> String {
    format!(
        "Congratulations! Your loan application has been approved! Loan Amount: {}, Interest \
         Rate: {:.2}% p.a., EMI: {} for {} months, Processing Fee: {}. I'll now generate your \
         sanction letter.",
        format_rupees(terms.approved_amount),
        terms.annual_rate_pct,
        format_rupees(terms.emi),
        terms.tenure_months,
        format_rupees(terms.processing_fee)
    )
}

fn sanction_message(reference_id: &str) -> String {
    format!(
        "Your sanction letter {} has been generated successfully! You can download it now. \
         Your loan will be disbursed within 24-48 hours after document verification.",
        reference_id
    )
}

//
// ================= Tests =================
//
