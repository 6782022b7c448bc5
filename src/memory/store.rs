//! Transcript storage
//!
//! Stores turn messages with timestamps, trimmed to a recent window

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Entries kept per session before the oldest are dropped
pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 50;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
}

impl TranscriptEntry {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role,
            content: content.into(),
        }
    }
}

/// Conversation transcript for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    entries: VecDeque<TranscriptEntry>,
    limit: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::with_limit(DEFAULT_TRANSCRIPT_LIMIT)
    }
}

impl Transcript {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) {
        self.entries.push_back(TranscriptEntry::new(role, content));
        self.trim_to_recent(self.limit);
    }

    /// Iterate over all entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    /// Most recent `count` entries, newest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the oldest entries until at most `keep_count` remain
    pub fn trim_to_recent(&mut self, keep_count: usize) {
        while self.entries.len() > keep_count {
            self.entries.pop_front();
        }
    }

    /// Plain-text rendering used as prompt context
    pub fn formatted(&self) -> String {
        let mut context = String::new();

        for entry in &self.entries {
            let role = match entry.role {
                MessageRole::User => "User",
                MessageRole::Agent => "Assistant",
            };
            context.push_str(&format!("{}: {}\n", role, entry.content));
        }

        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_keeps_recent_window() {
        let mut transcript = Transcript::with_limit(3);
        for i in 0..5 {
            transcript.push(MessageRole::User, format!("message {}", i));
        }

        assert_eq!(transcript.len(), 3);
        let newest: Vec<_> = transcript.recent(1).map(|e| e.content.clone()).collect();
        assert_eq!(newest, vec!["message 4".to_string()]);
        assert_eq!(transcript.entries().next().unwrap().content, "message 2");
    }

    #[test]
    fn test_formatted_context() {
        let mut transcript = Transcript::default();
        transcript.push(MessageRole::User, "hi");
        transcript.push(MessageRole::Agent, "Hello!");

        let text = transcript.formatted();
        assert!(text.contains("User: hi"));
        assert!(text.contains("Assistant: Hello!"));
    }
}
