//! Session transcript
//!
//! Bounded per-session message history. It is context for the free-text
//! fallback only; no decision reads it.

pub mod store;

pub use store::{MessageRole, Transcript, TranscriptEntry};
