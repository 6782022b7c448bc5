//! Runtime configuration and underwriting policy constants

use crate::error::OriginationError;
use crate::Result;
use chrono::Duration;
use std::env;
use std::path::PathBuf;

/// Fixed underwriting policy.
#[derive(Debug, Clone, PartialEq)]
pub struct UnderwritingPolicy {
    pub min_credit_score: u32,
    /// Loan amount may not exceed this multiple of monthly income
    pub max_loan_to_income_ratio: f64,
    /// EMI may not exceed this share of monthly income
    pub max_emi_to_income_ratio: f64,
    pub min_tenure_months: u32,
    pub max_tenure_months: u32,
    pub min_loan_amount: u64,
    pub max_loan_amount: u64,
    /// Rate used for the income-proof affordability check and capacity estimate
    pub reference_rate_pct: f64,
    /// Tenure used for the capacity estimate
    pub capacity_tenure_months: u32,
    pub base_rate_pct: f64,
    pub processing_fee_ratio: f64,
    pub processing_fee_cap: f64,
}

impl Default for UnderwritingPolicy {
    fn default() -> Self {
        Self {
            min_credit_score: 700,
            max_loan_to_income_ratio: 20.0,
            max_emi_to_income_ratio: 0.5,
            min_tenure_months: 6,
            max_tenure_months: 60,
            min_loan_amount: 50_000,
            max_loan_amount: 4_000_000,
            reference_rate_pct: 12.0,
            capacity_tenure_months: 36,
            base_rate_pct: 10.99,
            processing_fee_ratio: 0.02,
            processing_fee_cap: 20_000.0,
        }
    }
}

/// Process configuration, read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub sanction_letter_dir: PathBuf,
    pub database_url: Option<String>,
    pub session_idle_ttl: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .or_else(|_| env::var("API_PORT"))
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| OriginationError::Config(format!("invalid PORT: {}", e)))?;

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let sanction_letter_dir = env::var("SANCTION_LETTER_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("sanction_letters"));

        let database_url = env::var("POSTGRES_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        let session_idle_ttl = match env::var("SESSION_IDLE_TTL_MINUTES") {
            Ok(raw) => {
                let minutes = raw.parse::<i64>().map_err(|e| {
                    OriginationError::Config(format!("invalid SESSION_IDLE_TTL_MINUTES: {}", e))
                })?;
                if minutes <= 0 {
                    return Err(OriginationError::Config(
                        "SESSION_IDLE_TTL_MINUTES must be positive".to_string(),
                    ));
                }
                Some(Duration::minutes(minutes))
            }
            Err(_) => None,
        };

        Ok(Self {
            port,
            gemini_api_key,
            sanction_letter_dir,
            database_url,
            session_idle_ttl,
        })
    }
}
