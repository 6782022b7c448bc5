//! Utterance Classifier
//!
//! Coarse intent of a user message, used by the orchestrator where it does not
//! extract a slot:
//! - Greeting: opens the conversation ("hi", "good morning")
//! - LoanInterest: asks about a loan without greeting first
//! - Gratitude: closing thanks after completion

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceKind {
    Greeting,
    LoanInterest,
    Gratitude,
    Other,
}

/// Single-word greetings, matched as whole tokens so "this" is not "hi"
const GREETING_WORDS: &[&str] = &["hi", "hello", "hey"];

/// Multi-word greetings, matched as substrings
const GREETING_PHRASES: &[&str] = &["good morning", "good afternoon", "good evening"];

const LOAN_KEYWORDS: &[&str] = &["loan"];

const GRATITUDE_KEYWORDS: &[&str] = &["thank"];

/// Utterance classifier
pub struct UtteranceClassifier;

impl UtteranceClassifier {
    /// Classify a message. Greeting wins over loan interest.
    pub fn classify(message: &str) -> UtteranceKind {
        let text = message.to_lowercase();

        if is_greeting(&text) {
            UtteranceKind::Greeting
        } else if LOAN_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            UtteranceKind::LoanInterest
        } else if GRATITUDE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            UtteranceKind::Gratitude
        } else {
            UtteranceKind::Other
        }
    }

    pub fn is_gratitude(message: &str) -> bool {
        let text = message.to_lowercase();
        GRATITUDE_KEYWORDS.iter().any(|kw| text.contains(kw))
    }
}

fn is_greeting(text: &str) -> bool {
    let has_word = text
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| GREETING_WORDS.contains(&token));

    has_word || GREETING_PHRASES.iter().any(|phrase| text.contains(phrase))
}
