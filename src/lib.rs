//! Loan Origination Orchestrator
//!
//! A conversational personal-loan assistant that:
//! - Collects applicant details one slot at a time
//! - Verifies identity against a customer registry
//! - Underwrites with deterministic policy rules and risk-adjusted pricing
//! - Issues a sanction letter for approved applications
//! - Audits every decision with a tamper-evident hash
//!
//! CONVERSATION FLOW:
//! INITIAL → COLLECTING → VERIFYING → UNDERWRITING → SANCTIONING → COMPLETED

pub mod agent;
pub mod api;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extraction;
pub mod gemini;
pub mod lookups;
pub mod memory;
pub mod models;
pub mod pricing;
pub mod sanction;
pub mod state;
pub mod underwriting;
pub mod verification;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::{Lookups, Orchestrator};
pub use classifier::{UtteranceClassifier, UtteranceKind};
