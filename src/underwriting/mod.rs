//! Eligibility and underwriting engine
//!
//! Turns a complete application plus bureau and offer-mart lookups into an
//! approve/decline verdict. Order of evaluation:
//!
//! 1. fetch credit score and pre-approved limit (expired offer counts as none)
//! 2. run the four critical checks, recording each with a note
//! 3. pre-approved tier, which may approve or decline before the checks count
//! 4. aggregate: approve iff every critical check passed
//! 5. price every approval

use crate::config::UnderwritingPolicy;
use crate::lookups::{CreditLookup, OfferLookup};
use crate::models::{
    ComplianceCheck, DeclineDetails, LoanApplication, SanctionTerms, UnderwritingDecision,
    UnderwritingVerdict,
};
use crate::pricing::{emi, format_inr, max_principal_from_payment, round2};
use chrono::Utc;
use tracing::{debug, info};

pub const CREDIT_SCORE_CHECK: &str = "credit_score_check";
pub const LOAN_AMOUNT_CHECK: &str = "loan_amount_check";
pub const INCOME_CHECK: &str = "income_check";
pub const TENURE_CHECK: &str = "tenure_check";
pub const INCOME_PROOF_REQUIRED: &str = "income_proof_required";

pub const CONDITION_PRE_APPROVED: &str = "Standard approval based on pre-approved limit";
pub const CONDITION_PROOF_VERIFIED: &str = "Salary slip verification completed";
pub const CONDITION_PROOF_PENDING: &str = "Salary slip upload required";

const DOCUMENT_REQUIRED_REASON: &str =
    "Salary slip upload required for loan amount exceeding pre-approved limit";

/// How an approval was reached. Drives the sanction conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApprovalPath {
    WithinPreApprovedLimit,
    IncomeProofVerified,
    StandardChecks { proof_pending: bool },
}

pub struct UnderwritingEngine {
    policy: UnderwritingPolicy,
}

impl UnderwritingEngine {
    pub fn new(policy: UnderwritingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &UnderwritingPolicy {
        &self.policy
    }

    /// Evaluate a complete application.
    ///
    /// `income_proof_submitted` is the external precondition for amounts
    /// between the pre-approved limit and twice that limit.
    pub fn evaluate(
        &self,
        application: &LoanApplication,
        income_proof_submitted: bool,
        credit: &dyn CreditLookup,
        offers: &dyn OfferLookup,
    ) -> UnderwritingDecision {
        let now = Utc::now();
        let credit_score = credit.credit_profile(&application.phone).score;
        let pre_approved_limit = offers
            .pre_approved_offer(&application.phone)
            .filter(|offer| offer.is_valid_at(now))
            .map(|offer| offer.limit)
            .unwrap_or(0);

        let checks = self.critical_checks(application, credit_score);
        let mut notes: Vec<String> = checks.iter().map(|c| c.details.clone()).collect();

        let amount = application.loan_amount;
        let mut proof_pending = false;

        if pre_approved_limit > 0 {
            if amount <= pre_approved_limit {
                notes.push(format!(
                    "Loan amount within pre-approved limit of {}",
                    pre_approved_limit
                ));
                let verdict = self.approve(
                    application,
                    credit_score,
                    ApprovalPath::WithinPreApprovedLimit,
                );
                return self.decision(verdict, credit_score, pre_approved_limit, checks, notes);
            }

            if amount <= pre_approved_limit.saturating_mul(2) {
                notes.push(
                    "Loan amount exceeds pre-approved limit, income proof required".to_string(),
                );

                if !income_proof_submitted {
                    let verdict = UnderwritingVerdict::Declined(DeclineDetails {
                        reason: DOCUMENT_REQUIRED_REASON.to_string(),
                        failed_checks: vec![INCOME_PROOF_REQUIRED.to_string()],
                        suggestions: vec![
                            "Upload salary slip".to_string(),
                            "Reduce loan amount to pre-approved limit".to_string(),
                        ],
                    });
                    return self.decision(verdict, credit_score, pre_approved_limit, checks, notes);
                }

                let reference_emi = emi(
                    amount as f64,
                    self.policy.reference_rate_pct,
                    application.tenure_months,
                );
                let affordable = application.monthly_income as f64
                    * self.policy.max_emi_to_income_ratio;

                if reference_emi <= affordable {
                    notes.push("Income proof verified, EMI within 50% of income".to_string());
                    let verdict = self.approve(
                        application,
                        credit_score,
                        ApprovalPath::IncomeProofVerified,
                    );
                    return self.decision(verdict, credit_score, pre_approved_limit, checks, notes);
                }

                notes.push(format!(
                    "EMI {:.2} exceeds 50% of monthly income",
                    reference_emi
                ));
                proof_pending = true;
            } else {
                notes.push("Loan amount exceeds 2x pre-approved limit".to_string());
            }
        } else {
            notes.push("No pre-approved limit available".to_string());
        }

        let failed_checks: Vec<String> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.rule_name.clone())
            .collect();

        let verdict = if failed_checks.is_empty() {
            self.approve(
                application,
                credit_score,
                ApprovalPath::StandardChecks { proof_pending },
            )
        } else {
            UnderwritingVerdict::Declined(DeclineDetails {
                reason: format!("Underwriting failed: {}", failed_checks.join(", ")),
                suggestions: self.suggestions(&failed_checks, application),
                failed_checks,
            })
        };

        self.decision(verdict, credit_score, pre_approved_limit, checks, notes)
    }

    fn decision(
        &self,
        verdict: UnderwritingVerdict,
        credit_score: u32,
        pre_approved_limit: u64,
        checks: Vec<ComplianceCheck>,
        notes: Vec<String>,
    ) -> UnderwritingDecision {
        info!(
            verdict = verdict.tag(),
            credit_score = credit_score,
            pre_approved = pre_approved_limit > 0,
            "Underwriting decision reached"
        );

        UnderwritingDecision {
            verdict,
            credit_score,
            pre_approved_limit,
            checks,
            notes,
            evaluated_at: Utc::now(),
        }
    }

    //
    // ========== Critical Checks ==========
    //

    fn critical_checks(&self, application: &LoanApplication, credit_score: u32) -> Vec<ComplianceCheck> {
        let policy = &self.policy;
        let amount = application.loan_amount;
        let income = application.monthly_income;
        let tenure = application.tenure_months;

        let credit_ok = credit_score >= policy.min_credit_score;
        let credit = check(
            CREDIT_SCORE_CHECK,
            credit_ok,
            if credit_ok {
                format!("Credit score {} meets minimum requirement", credit_score)
            } else {
                format!(
                    "Credit score {} below minimum requirement of {}",
                    credit_score, policy.min_credit_score
                )
            },
        );

        let amount_ok = (policy.min_loan_amount..=policy.max_loan_amount).contains(&amount);
        let amount_check = check(
            LOAN_AMOUNT_CHECK,
            amount_ok,
            format!(
                "Loan amount {} {} acceptable range",
                amount,
                if amount_ok { "within" } else { "outside" }
            ),
        );

        let income_check = if income == 0 {
            check(INCOME_CHECK, false, "Monthly income not provided".to_string())
        } else {
            let ratio = amount as f64 / income as f64;
            let ok = ratio <= policy.max_loan_to_income_ratio;
            check(
                INCOME_CHECK,
                ok,
                format!(
                    "Loan to income ratio {:.1} {}",
                    ratio,
                    if ok { "is acceptable" } else { "too high" }
                ),
            )
        };

        let tenure_ok = (policy.min_tenure_months..=policy.max_tenure_months).contains(&tenure);
        let tenure_check = check(
            TENURE_CHECK,
            tenure_ok,
            format!(
                "Tenure {} months {}",
                tenure,
                if tenure_ok { "is acceptable" } else { "outside acceptable range" }
            ),
        );

        vec![credit, amount_check, income_check, tenure_check]
    }

    fn suggestions(&self, failed_checks: &[String], application: &LoanApplication) -> Vec<String> {
        let mut suggestions = Vec::new();

        for failed in failed_checks {
            match failed.as_str() {
                CREDIT_SCORE_CHECK => suggestions.extend([
                    "Improve credit score by paying existing loans on time".to_string(),
                    "Reduce credit card utilization".to_string(),
                    "Avoid new credit applications for 6 months".to_string(),
                ]),
                LOAN_AMOUNT_CHECK => {
                    if application.loan_amount > self.policy.max_loan_amount {
                        suggestions.push(format!(
                            "Reduce loan amount to maximum {}",
                            format_inr(self.policy.max_loan_amount)
                        ));
                    } else if application.loan_amount < self.policy.min_loan_amount {
                        suggestions.push(format!(
                            "Increase loan amount to minimum {}",
                            format_inr(self.policy.min_loan_amount)
                        ));
                    }
                }
                INCOME_CHECK => suggestions.extend([
                    "Provide additional income proof".to_string(),
                    "Consider a co-applicant with higher income".to_string(),
                    "Reduce loan amount to match income capacity".to_string(),
                ]),
                TENURE_CHECK => suggestions.extend([
                    format!(
                        "Choose tenure between {} to {} months",
                        self.policy.min_tenure_months, self.policy.max_tenure_months
                    ),
                    "Consider longer tenure to reduce EMI".to_string(),
                ]),
                _ => {}
            }
        }

        suggestions
    }

    //
    // ========== Pricing Step ==========
    //

    fn approve(
        &self,
        application: &LoanApplication,
        credit_score: u32,
        path: ApprovalPath,
    ) -> UnderwritingVerdict {
        let rate = self.risk_adjusted_rate(application);

        let capacity = self.capacity_estimate(application.monthly_income, credit_score);

        let approved_amount = round2((application.loan_amount as f64).min(capacity));
        let tenure = application.tenure_months;
        let monthly = emi(approved_amount, rate, tenure);
        let total_payable = round2(monthly * tenure as f64);
        let total_interest = round2(total_payable - approved_amount);
        let processing_fee = round2(
            (approved_amount * self.policy.processing_fee_ratio).min(self.policy.processing_fee_cap),
        );

        let conditions = match path {
            ApprovalPath::WithinPreApprovedLimit => vec![CONDITION_PRE_APPROVED.to_string()],
            ApprovalPath::IncomeProofVerified => vec![CONDITION_PROOF_VERIFIED.to_string()],
            ApprovalPath::StandardChecks { proof_pending: true } => {
                vec![CONDITION_PROOF_PENDING.to_string()]
            }
            ApprovalPath::StandardChecks { proof_pending: false } => Vec::new(),
        };

        debug!(
            rate = rate,
            capacity = capacity,
            approved_amount = approved_amount,
            "Priced approved loan"
        );

        UnderwritingVerdict::Approved(SanctionTerms {
            approved_amount,
            annual_rate_pct: rate,
            tenure_months: tenure,
            emi: monthly,
            total_payable,
            total_interest,
            processing_fee,
            conditions,
        })
    }

    /// Base rate plus employment, income and amount adjustments, never below base.
    pub fn risk_adjusted_rate(&self, application: &LoanApplication) -> f64 {
        let mut adjustment = 0.0;

        let employment = application.employment_type.to_lowercase();
        if employment.contains("salaried") || employment.contains("government") {
            adjustment -= 0.5;
        } else if employment.contains("business")
            || employment.contains("self-employed")
            || employment.contains("self employed")
        {
            adjustment += 0.5;
        }

        if application.monthly_income > 100_000 {
            adjustment -= 0.25;
        } else if application.monthly_income < 30_000 {
            adjustment += 0.5;
        }

        if application.loan_amount > 1_000_000 {
            adjustment -= 0.25;
        } else if application.loan_amount < 100_000 {
            adjustment += 0.25;
        }

        let base = self.policy.base_rate_pct;
        round2((base + adjustment).max(base))
    }

    /// Largest principal half the income can service at the reference rate,
    /// scaled by credit quality and capped at the product maximum.
    pub fn capacity_estimate(&self, monthly_income: u64, credit_score: u32) -> f64 {
        let payment = monthly_income as f64 * self.policy.max_emi_to_income_ratio;
        if payment <= 0.0 {
            return 0.0;
        }

        let principal = max_principal_from_payment(
            payment,
            self.policy.reference_rate_pct,
            self.policy.capacity_tenure_months,
        );

        round2((principal * credit_multiplier(credit_score)).min(self.policy.max_loan_amount as f64))
    }
}

impl Default for UnderwritingEngine {
    fn default() -> Self {
        Self::new(UnderwritingPolicy::default())
    }
}

fn check(rule_name: &str, passed: bool, details: String) -> ComplianceCheck {
    ComplianceCheck {
        rule_name: rule_name.to_string(),
        passed,
        details,
    }
}

pub fn credit_multiplier(credit_score: u32) -> f64 {
    match credit_score {
        s if s >= 750 => 1.0,
        s if s >= 700 => 0.8,
        s if s >= 650 => 0.6,
        _ => 0.4,
    }
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookups::{MockCreditBureau, MockOfferMart};
    use crate::models::{CreditProfile, PreApprovedOffer};
    use chrono::Duration;

    const PHONE: &str = "9876543210";

    fn application(amount: u64, tenure: u32, employment: &str, income: u64) -> LoanApplication {
        LoanApplication {
            name: "Rajesh Kumar".to_string(),
            phone: PHONE.to_string(),
            employment_type: employment.to_string(),
            monthly_income: income,
            loan_amount: amount,
            tenure_months: tenure,
        }
    }

    fn bureau(score: u32) -> MockCreditBureau {
        MockCreditBureau::from_profiles([(
            PHONE.to_string(),
            CreditProfile {
                score,
                credit_history: "Test".to_string(),
            },
        )])
    }

    fn offer_mart(limit: Option<u64>, valid_days: i64) -> MockOfferMart {
        MockOfferMart::from_offers(limit.map(|limit| {
            (
                PHONE.to_string(),
                PreApprovedOffer {
                    limit,
                    annual_rate_pct: 11.99,
                    valid_until: Utc::now() + Duration::days(valid_days),
                },
            )
        }))
    }

    fn terms(decision: &UnderwritingDecision) -> &SanctionTerms {
        match &decision.verdict {
            UnderwritingVerdict::Approved(terms) => terms,
            other => panic!("expected approval, got {:?}", other),
        }
    }

    fn declined(decision: &UnderwritingDecision) -> &DeclineDetails {
        match &decision.verdict {
            UnderwritingVerdict::Declined(details) => details,
            other => panic!("expected decline, got {:?}", other),
        }
    }

    #[test]
    fn test_pre_approved_salaried_applicant_gets_floor_rate() {
        let engine = UnderwritingEngine::default();
        let app = application(500_000, 24, "Salaried", 75_000);

        let decision = engine.evaluate(&app, false, &bureau(780), &offer_mart(Some(800_000), 30));

        assert_eq!(decision.verdict.tag(), "approved");
        assert_eq!(decision.credit_score, 780);
        assert_eq!(decision.pre_approved_limit, 800_000);

        let terms = terms(&decision);
        assert_eq!(terms.approved_amount, 500_000.0);
        assert_eq!(terms.annual_rate_pct, 10.99);
        assert_eq!(terms.tenure_months, 24);
        assert_eq!(terms.emi, emi(500_000.0, 10.99, 24));
        assert_eq!(terms.processing_fee, 10_000.0);
        assert_eq!(terms.total_payable, round2(terms.emi * 24.0));
        assert_eq!(terms.conditions, vec![CONDITION_PRE_APPROVED.to_string()]);
    }

    #[test]
    fn test_pre_approved_limit_bypasses_low_credit_score() {
        let engine = UnderwritingEngine::default();
        let app = application(300_000, 12, "Salaried", 40_000);

        let decision = engine.evaluate(&app, false, &bureau(580), &offer_mart(Some(400_000), 10));

        assert!(decision.verdict.is_approved());
        let credit = decision
            .checks
            .iter()
            .find(|c| c.rule_name == CREDIT_SCORE_CHECK)
            .unwrap();
        assert!(!credit.passed);
    }

    #[test]
    fn test_amount_above_limit_without_proof_requires_upload() {
        let engine = UnderwritingEngine::default();
        let app = application(500_000, 24, "Salaried", 75_000);

        let decision = engine.evaluate(&app, false, &bureau(780), &offer_mart(Some(300_000), 30));

        let details = declined(&decision);
        assert!(details.reason.to_lowercase().contains("upload"));
        assert_eq!(details.failed_checks, vec![INCOME_PROOF_REQUIRED.to_string()]);
        assert_eq!(
            details.suggestions,
            vec![
                "Upload salary slip".to_string(),
                "Reduce loan amount to pre-approved limit".to_string()
            ]
        );
    }

    #[test]
    fn test_income_proof_with_affordable_emi_approves() {
        let engine = UnderwritingEngine::default();
        let app = application(500_000, 24, "Salaried", 75_000);

        let decision = engine.evaluate(&app, true, &bureau(780), &offer_mart(Some(300_000), 30));

        assert_eq!(
            terms(&decision).conditions,
            vec![CONDITION_PROOF_VERIFIED.to_string()]
        );
    }

    #[test]
    fn test_unaffordable_proof_falls_through_to_critical_checks() {
        let engine = UnderwritingEngine::default();
        // 12% reference EMI over 6 months is far above half of 75000
        let app = application(500_000, 6, "Salaried", 75_000);

        let decision = engine.evaluate(&app, true, &bureau(780), &offer_mart(Some(300_000), 30));

        assert_eq!(
            terms(&decision).conditions,
            vec![CONDITION_PROOF_PENDING.to_string()]
        );
    }

    #[test]
    fn test_out_of_bounds_amount_and_low_score_decline() {
        let engine = UnderwritingEngine::default();
        let app = application(4_500_000, 24, "Salaried", 75_000);

        let decision = engine.evaluate(&app, false, &bureau(650), &offer_mart(None, 0));

        let details = declined(&decision);
        assert!(details.failed_checks.contains(&CREDIT_SCORE_CHECK.to_string()));
        assert!(details.failed_checks.contains(&LOAN_AMOUNT_CHECK.to_string()));
        assert!(details
            .suggestions
            .contains(&"Reduce loan amount to maximum ₹40,00,000".to_string()));
    }

    #[test]
    fn test_decline_lists_exactly_the_failed_checks() {
        let engine = UnderwritingEngine::default();
        // income high enough that the ratio check passes
        let app = application(4_500_000, 24, "Salaried", 300_000);

        let decision = engine.evaluate(&app, false, &bureau(650), &offer_mart(None, 0));

        let details = declined(&decision);
        assert_eq!(
            details.failed_checks,
            vec![CREDIT_SCORE_CHECK.to_string(), LOAN_AMOUNT_CHECK.to_string()]
        );
        assert_eq!(
            details.reason,
            "Underwriting failed: credit_score_check, loan_amount_check"
        );
    }

    #[test]
    fn test_expired_offer_is_treated_as_absent() {
        let engine = UnderwritingEngine::default();
        let app = application(300_000, 24, "Salaried", 75_000);

        let decision = engine.evaluate(&app, false, &bureau(650), &offer_mart(Some(800_000), -1));

        assert_eq!(decision.pre_approved_limit, 0);
        assert_eq!(
            declined(&decision).failed_checks,
            vec![CREDIT_SCORE_CHECK.to_string()]
        );
    }

    #[test]
    fn test_approved_amount_is_capped_by_capacity() {
        let engine = UnderwritingEngine::default();
        let app = application(400_000, 24, "Salaried", 20_000);

        let decision = engine.evaluate(&app, false, &bureau(720), &offer_mart(None, 0));

        let terms = terms(&decision);
        let capacity = engine.capacity_estimate(20_000, 720);
        assert!(capacity < 400_000.0);
        assert_eq!(terms.approved_amount, capacity);
        assert_eq!(terms.emi, emi(capacity, terms.annual_rate_pct, 24));
        assert!(terms.conditions.is_empty());
    }

    #[test]
    fn test_pre_approved_request_is_still_capped_by_capacity() {
        let engine = UnderwritingEngine::default();
        let app = application(600_000, 24, "Salaried", 15_000);

        let decision = engine.evaluate(&app, false, &bureau(780), &offer_mart(Some(800_000), 30));

        let terms = terms(&decision);
        let capacity = engine.capacity_estimate(15_000, 780);
        assert!(capacity < 600_000.0);
        assert_eq!(terms.approved_amount, capacity);
        assert_eq!(terms.conditions, vec![CONDITION_PRE_APPROVED.to_string()]);
    }

    #[test]
    fn test_pre_approved_tier_boundaries_are_inclusive() {
        let engine = UnderwritingEngine::default();
        let offers = offer_mart(Some(300_000), 30);

        let at_limit = engine.evaluate(
            &application(300_000, 24, "Salaried", 75_000),
            false,
            &bureau(780),
            &offers,
        );
        assert_eq!(
            terms(&at_limit).conditions,
            vec![CONDITION_PRE_APPROVED.to_string()]
        );

        let at_double = engine.evaluate(
            &application(600_000, 24, "Salaried", 75_000),
            false,
            &bureau(780),
            &offers,
        );
        assert_eq!(
            declined(&at_double).failed_checks,
            vec![INCOME_PROOF_REQUIRED.to_string()]
        );

        let past_double = engine.evaluate(
            &application(600_001, 24, "Salaried", 75_000),
            false,
            &bureau(780),
            &offers,
        );
        assert!(terms(&past_double).conditions.is_empty());
        assert!(past_double
            .notes
            .contains(&"Loan amount exceeds 2x pre-approved limit".to_string()));
    }

    #[test]
    fn test_tenure_out_of_range_declines() {
        let engine = UnderwritingEngine::default();
        let app = application(500_000, 72, "Salaried", 75_000);

        let decision = engine.evaluate(&app, false, &bureau(780), &offer_mart(None, 0));

        let details = declined(&decision);
        assert_eq!(details.failed_checks, vec![TENURE_CHECK.to_string()]);
        assert_eq!(
            details.suggestions,
            vec![
                "Choose tenure between 6 to 60 months".to_string(),
                "Consider longer tenure to reduce EMI".to_string()
            ]
        );
    }

    #[test]
    fn test_amount_below_minimum_suggests_increase() {
        let engine = UnderwritingEngine::default();
        let app = application(40_000, 12, "Salaried", 30_000);

        let decision = engine.evaluate(&app, false, &bureau(780), &offer_mart(None, 0));

        let details = declined(&decision);
        assert_eq!(details.failed_checks, vec![LOAN_AMOUNT_CHECK.to_string()]);
        assert_eq!(
            details.suggestions,
            vec!["Increase loan amount to minimum ₹50,000".to_string()]
        );
    }

    #[test]
    fn test_income_ratio_alone_declines() {
        let engine = UnderwritingEngine::default();
        let app = application(2_000_000, 24, "Salaried", 50_000);

        let decision = engine.evaluate(&app, false, &bureau(780), &offer_mart(None, 0));

        let details = declined(&decision);
        assert_eq!(details.failed_checks, vec![INCOME_CHECK.to_string()]);
        assert_eq!(
            details.suggestions,
            vec![
                "Provide additional income proof".to_string(),
                "Consider a co-applicant with higher income".to_string(),
                "Reduce loan amount to match income capacity".to_string()
            ]
        );
    }

    #[test]
    fn test_rate_adjustments_accumulate() {
        let engine = UnderwritingEngine::default();

        let risky = application(80_000, 12, "Self-Employed", 25_000);
        assert_eq!(engine.risk_adjusted_rate(&risky), 12.24);

        let business_large = application(1_500_000, 36, "Business owner", 150_000);
        assert_eq!(engine.risk_adjusted_rate(&business_large), 10.99);

        let government = application(500_000, 36, "Government", 50_000);
        assert_eq!(engine.risk_adjusted_rate(&government), 10.99);
    }

    #[test]
    fn test_processing_fee_is_capped() {
        let engine = UnderwritingEngine::default();
        let app = application(2_000_000, 60, "Salaried", 200_000);

        let decision = engine.evaluate(&app, false, &bureau(800), &offer_mart(None, 0));

        assert_eq!(terms(&decision).processing_fee, 20_000.0);
    }

    #[test]
    fn test_credit_multiplier_bands() {
        assert_eq!(credit_multiplier(800), 1.0);
        assert_eq!(credit_multiplier(700), 0.8);
        assert_eq!(credit_multiplier(650), 0.6);
        assert_eq!(credit_multiplier(649), 0.4);
    }
}
