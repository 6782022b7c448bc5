//! Sanction letter generation
//!
//! The orchestrator calls an [`ArtifactGenerator`] exactly once per approved
//! session. The default implementation writes a plain-text letter to disk.

use crate::error::OriginationError;
use crate::models::{ArtifactReference, LoanApplication, LoanRequest, SanctionTerms};
use crate::pricing::{format_inr, format_rupees};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(
        &self,
        application: &LoanApplication,
        request: &LoanRequest,
        terms: &SanctionTerms,
    ) -> crate::Result<ArtifactReference>;
}

/// Writes `<reference>.txt` sanction letters into a directory
pub struct SanctionLetterWriter {
    dir: PathBuf,
}

impl SanctionLetterWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl ArtifactGenerator for SanctionLetterWriter {
    async fn generate(
        &self,
        application: &LoanApplication,
        request: &LoanRequest,
        terms: &SanctionTerms,
    ) -> crate::Result<ArtifactReference> {
        let generated_at = Utc::now();
        let reference_id = reference_number(generated_at);

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            OriginationError::ArtifactGeneration(format!(
                "cannot create {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.dir.join(format!("{}.txt", reference_id.replace('/', "_")));
        let letter = render_letter(&reference_id, generated_at, application, request, terms);

        tokio::fs::write(&path, letter).await.map_err(|e| {
            OriginationError::ArtifactGeneration(format!("cannot write {}: {}", path.display(), e))
        })?;

        info!(reference_id = %reference_id, "Sanction letter written");

        Ok(ArtifactReference {
            reference_id,
            location: path.display().to_string(),
            generated_at,
        })
    }
}

/// `PL/<yyyymmdd>/<8 hex>`
pub fn reference_number(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("PL/{}/{}", at.format("%Y%m%d"), suffix)
}

fn render_letter(
    reference_id: &str,
    generated_at: DateTime<Utc>,
    application: &LoanApplication,
    request: &LoanRequest,
    terms: &SanctionTerms,
) -> String {
    let mut letter = String::new();

    letter.push_str("PERSONAL LOAN SANCTION LETTER\n\n");
    letter.push_str(&format!("Reference: {}\n", reference_id));
    letter.push_str(&format!("Date: {}\n\n", generated_at.format("%d %B %Y")));

    letter.push_str(&format!("Dear {},\n\n", application.name));
    letter.push_str(
        "We are pleased to inform you that your personal loan application has been approved \
         on the following terms.\n\n",
    );

    letter.push_str(&format!("Requested amount:  {}\n", format_inr(request.amount)));
    letter.push_str(&format!("Sanctioned amount: {}\n", format_rupees(terms.approved_amount)));
    letter.push_str(&format!("Interest rate:     {:.2}% per annum\n", terms.annual_rate_pct));
    letter.push_str(&format!("Tenure:            {} months\n", terms.tenure_months));
    letter.push_str(&format!("Monthly EMI:       {}\n", format_rupees(terms.emi)));
    letter.push_str(&format!("Total payable:     {}\n", format_rupees(terms.total_payable)));
    letter.push_str(&format!("Total interest:    {}\n", format_rupees(terms.total_interest)));
    letter.push_str(&format!("Processing fee:    {}\n", format_rupees(terms.processing_fee)));

    if !terms.conditions.is_empty() {
        letter.push_str("\nConditions:\n");
        for condition in &terms.conditions {
            letter.push_str(&format!("- {}\n", condition));
        }
    }

    letter.push_str(
        "\nThe loan will be disbursed to your registered bank account within 24-48 hours \
         of document verification.\n",
    );

    letter
}
