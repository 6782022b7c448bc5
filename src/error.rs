//! Error types for the loan origination orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OriginationError>;

#[derive(Error, Debug)]
pub enum OriginationError {

    // =============================
    // Core Pipeline Errors
    // =============================

    /// A transition was attempted with required facts missing.
    /// The orchestrator fills every slot before advancing, so this is a defect.
    #[error("Incomplete application: {0}")]
    IncompleteApplication(String),

    #[error("Slot already filled: {0}")]
    SlotAlreadyFilled(String),

    #[error("Artifact generation error: {0}")]
    ArtifactGeneration(String),

    #[error("Free-text generation error: {0}")]
    FreeText(String),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}
