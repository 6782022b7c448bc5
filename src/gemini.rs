//! Free-text fallback backed by the Gemini API
//!
//! Used only when the orchestrator meets a phase it cannot handle. Never on
//! the decision path: a failure here degrades to a static reply.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::OriginationError;
use crate::models::ConversationRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Optional free-text generator consulted for unrecognised input
#[async_trait::async_trait]
pub trait FreeTextGenerator: Send + Sync {
    async fn generate(&self, message: &str, snapshot: &ConversationRecord) -> crate::Result<String>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
        })
    }

    async fn call(&self, prompt: String) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(OriginationError::FreeText(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 512,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        info!("Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                OriginationError::FreeText(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(OriginationError::FreeText(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            OriginationError::FreeText(format!("Gemini parse error: {}", e))
        })?;

        first_text(gemini_response)
    }
}

#[async_trait::async_trait]
impl FreeTextGenerator for GeminiClient {
    async fn generate(&self, message: &str, snapshot: &ConversationRecord) -> crate::Result<String> {
        self.call(build_prompt(message, snapshot)).await
    }
}

const SYSTEM_PROMPT: &str = r#"You are a personal loan sales assistant.

Guidelines:
- Be polite and concise
- Never promise approval, rates or amounts
- Steer the customer back to the loan application"#;

/// Transcript plus the latest message
fn build_prompt(message: &str, snapshot: &ConversationRecord) -> String {
    let mut prompt = String::new();

    if !snapshot.transcript.is_empty() {
        prompt.push_str("Conversation so far:\n\n");
        prompt.push_str(&snapshot.transcript.formatted());
        prompt.push_str("\n---\n\n");
    }

    prompt.push_str(&format!("Current stage: {}\n", snapshot.phase));
    prompt.push_str("Customer says: ");
    prompt.push_str(message);
    prompt
}

fn first_text(response: GeminiResponse) -> crate::Result<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| OriginationError::FreeText("Empty response from Gemini".to_string()))
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MessageRole;

    #[test]
    fn test_prompt_includes_transcript_and_stage() {
        let mut record = ConversationRecord::new("s-1");
        record.transcript.push(MessageRole::User, "hi");
        record.transcript.push(MessageRole::Agent, "Welcome!");

        let prompt = build_prompt("what is an EMI?", &record);

        assert!(prompt.contains("User: hi"));
        assert!(prompt.contains("Assistant: Welcome!"));
        assert!(prompt.contains("Current stage: initial"));
        assert!(prompt.ends_with("what is an EMI?"));
    }

    #[test]
    fn test_empty_candidates_is_an_error() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(first_text(response), Err(OriginationError::FreeText(_))));

        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "Sure."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_text(response).unwrap(), "Sure.");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = GeminiClient::new(String::new()).unwrap();
        let record = ConversationRecord::new("s-2");

        let result = client.generate("hello", &record).await;
        assert!(matches!(result, Err(OriginationError::FreeText(_))));
    }
}
