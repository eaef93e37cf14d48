//! LLM-backed intent classification.
//!
//! Sends an extraction prompt to Anthropic or OpenAI and parses the JSON
//! reply into an [`Intent`]. Any failure along the way (HTTP error,
//! unparseable reply, unknown workflow id) falls back to the keyword
//! classifier, so classification never takes a request down.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use hopelink_protocol::{DonationWorkflow, Intent, IntentFilters};

use super::{Classifier, KeywordClassifier};
use crate::config::{ClassifierConfig, ClassifierProvider};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

enum Provider {
    Anthropic { api_key: String, model: String },
    OpenAi { api_key: String, model: String },
}

pub struct LlmClassifier {
    client: Client,
    provider: Provider,
    max_tokens: u32,
    fallback: KeywordClassifier,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

/// Shape the extraction prompt asks the model to produce.
#[derive(Deserialize)]
struct RawIntent {
    workflow: String,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    filters: RawFilters,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    needs_clarification: bool,
    #[serde(default)]
    clarification_question: Option<String>,
}

#[derive(Default, Deserialize)]
struct RawFilters {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    urgent: Option<bool>,
    #[serde(default)]
    item: Option<String>,
}

fn default_confidence() -> f64 {
    0.8
}

// ============================================================================
// Classifier
// ============================================================================

impl LlmClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let provider = match config.provider {
            ClassifierProvider::Anthropic => Provider::Anthropic {
                api_key: require_key(&config.anthropic_api_key, "ANTHROPIC_API_KEY")?,
                model: config.anthropic_model.clone(),
            },
            ClassifierProvider::OpenAi => Provider::OpenAi {
                api_key: require_key(&config.openai_api_key, "OPENAI_API_KEY")?,
                model: config.openai_model.clone(),
            },
            ClassifierProvider::Keyword => {
                return Err(anyhow!("keyword provider does not use the LLM classifier"))
            }
        };
        Ok(Self {
            client: Client::new(),
            provider,
            max_tokens: config.max_tokens,
            fallback: KeywordClassifier::new(),
        })
    }

    fn build_prompt(message: &str) -> String {
        format!(
            r#"You are an intent classifier for a donation platform that helps
orphanages and children in need. Read the user's message and extract their
intent as structured JSON.

The platform supports exactly these 4 workflows:
1. education_donation  - donating money or items for children's education
2. emergency_medical   - urgent medical fundraising for sick children
3. orphanage_supply    - sending physical supplies to orphanages
4. child_sponsorship   - sponsoring an individual child long-term

User message: "{message}"

Extract the following and return ONLY valid JSON, no explanation:
{{
  "workflow": "<one of the 4 workflow ids above>",
  "amount": <number in rupees or null if not mentioned>,
  "filters": {{
    "category": "<education|medical|food|clothing|books|blankets|other or null>",
    "urgent": <true if words like urgent/emergency/critical/immediately used>,
    "item": "<specific item mentioned like books/blankets/uniforms or null>"
  }},
  "confidence": <0.0 to 1.0, how certain you are>,
  "needs_clarification": <true if message is too vague to act on>,
  "clarification_question": "<question to ask user if unclear, else null>"
}}

Rules:
- Sickness, hospital, surgery, treatment -> emergency_medical
- Books, school, uniform, fees, education -> education_donation
- Blankets, food, supplies, items, materials -> orphanage_supply
- Sponsor, monthly, long-term, support a child -> child_sponsorship
- If truly unclear, set needs_clarification to true and suggest a question
- Always return valid JSON only"#
        )
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        match &self.provider {
            Provider::Anthropic { api_key, model } => {
                let request = AnthropicRequest {
                    model: model.clone(),
                    max_tokens: self.max_tokens,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                };
                let response: AnthropicResponse = self
                    .client
                    .post(ANTHROPIC_API_URL)
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_API_VERSION)
                    .json(&request)
                    .send()
                    .await
                    .context("Anthropic request failed")?
                    .error_for_status()
                    .context("Anthropic returned an error status")?
                    .json()
                    .await
                    .context("Failed to decode Anthropic response")?;
                response
                    .content
                    .into_iter()
                    .next()
                    .map(|block| block.text)
                    .ok_or_else(|| anyhow!("Anthropic response had no content"))
            }
            Provider::OpenAi { api_key, model } => {
                let request = OpenAiRequest {
                    model: model.clone(),
                    max_tokens: self.max_tokens,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                };
                let response: OpenAiResponse = self
                    .client
                    .post(OPENAI_API_URL)
                    .bearer_auth(api_key)
                    .json(&request)
                    .send()
                    .await
                    .context("OpenAI request failed")?
                    .error_for_status()
                    .context("OpenAI returned an error status")?
                    .json()
                    .await
                    .context("Failed to decode OpenAI response")?;
                response
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content)
                    .ok_or_else(|| anyhow!("OpenAI response had no choices"))
            }
        }
    }
}

fn require_key(key: &str, name: &str) -> Result<String> {
    if key.is_empty() {
        Err(anyhow!("{name} is not set"))
    } else {
        Ok(key.to_string())
    }
}

/// Strip markdown code fences the model may have wrapped the JSON in.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Parse the model's JSON reply into an [`Intent`]. Unknown workflow ids are
/// a parse failure; the caller falls back to keywords.
fn parse_reply(raw: &str, original_message: &str) -> Result<Intent> {
    let cleaned = strip_code_fences(raw);
    let parsed: RawIntent =
        serde_json::from_str(cleaned).context("LLM reply was not valid intent JSON")?;
    let workflow: DonationWorkflow = parsed
        .workflow
        .parse()
        .with_context(|| format!("LLM returned unknown workflow '{}'", parsed.workflow))?;
    Ok(Intent {
        workflow,
        amount: parsed.amount,
        filters: IntentFilters {
            category: parsed.filters.category,
            urgent: parsed.filters.urgent.unwrap_or(false),
            item: parsed.filters.item,
        },
        confidence: parsed.confidence.clamp(0.0, 1.0),
        needs_clarification: parsed.needs_clarification,
        clarification_question: parsed.clarification_question,
        raw_message: original_message.to_string(),
    })
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, message: &str) -> Result<Intent> {
        let prompt = Self::build_prompt(message);
        match self.complete(prompt).await {
            Ok(reply) => match parse_reply(&reply, message) {
                Ok(intent) => Ok(intent),
                Err(e) => {
                    warn!(error = %e, "LLM reply unusable, using keyword fallback");
                    Ok(self.fallback.classify_message(message))
                }
            },
            Err(e) => {
                warn!(error = %e, "LLM call failed, using keyword fallback");
                Ok(self.fallback.classify_message(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_full_reply() {
        let raw = r#"{
            "workflow": "emergency_medical",
            "amount": 10000,
            "filters": {"category": "medical", "urgent": true, "item": null},
            "confidence": 0.92,
            "needs_clarification": false,
            "clarification_question": null
        }"#;
        let intent = parse_reply(raw, "help a sick child, ₹10000").unwrap();
        assert_eq!(intent.workflow, DonationWorkflow::EmergencyMedical);
        assert_eq!(intent.amount, Some(10_000.0));
        assert!(intent.filters.urgent);
        assert_eq!(intent.raw_message, "help a sick child, ₹10000");
    }

    #[test]
    fn test_parse_rejects_unknown_workflow() {
        let raw = r#"{"workflow": "world_peace", "confidence": 0.9}"#;
        assert!(parse_reply(raw, "msg").is_err());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_reply("I think the user wants to donate.", "msg").is_err());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let raw = r#"{"workflow": "education_donation", "confidence": 3.5}"#;
        let intent = parse_reply(raw, "msg").unwrap();
        assert_eq!(intent.confidence, 1.0);
    }
}
