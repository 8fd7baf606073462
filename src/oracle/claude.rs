// src/oracle/claude.rs
//! Anthropic Messages API oracle

use crate::model::Persona;
use crate::oracle::{ContentGenerator, DecisionOracle, OracleChoice, OracleError};
use crate::utils::config::OracleSettings;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Oracle backed by the Anthropic Messages API
pub struct ClaudeOracle {
    client: Client,
    api_key: String,
    settings: OracleSettings,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ClaudeOracle {
    pub fn new(api_key: impl Into<String>, settings: OracleSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| EngineError::Configuration(format!("Oracle HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            settings,
        })
    }

    async fn complete(&self, prompt: String, max_tokens: u32) -> std::result::Result<String, OracleError> {
        let body = json!({
            "model": self.settings.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(&self.settings.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Request(format!("status {}", status.as_u16())));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .unwrap_or_default())
    }
}

/// Prompt asking which option a persona would pick
pub fn decision_prompt(persona: &Persona, context: &str, options: &[String]) -> String {
    let numbered = options
        .iter()
        .enumerate()
        .map(|(i, opt)| format!("{}. {}", i + 1, opt))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are simulating a user with the following persona:\n{}\n\n\
         Context: {}\n\n\
         Available options:\n{}\n\n\
         Based on this persona's characteristics, which option would they most likely choose?\n\n\
         Respond in JSON format:\n\
         {{\"chosen\": \"option text\", \"reasoning\": \"why this persona would choose this\", \"confidence\": 0.0-1.0}}",
        persona.describe(),
        context,
        numbered
    )
}

/// Prompt asking for realistic content of a given type
pub fn content_prompt(persona: &Persona, content_type: &str) -> String {
    format!(
        "Generate realistic {} for a {} level user testing a web platform.\n\n\
         Persona characteristics:\n\
         - Tech Savvy: {}/10\n\
         - Detail Oriented: {}/10\n\n\
         Generate content that this persona would realistically create.",
        content_type,
        persona.persona_type,
        persona.characteristics.tech_savvy,
        persona.characteristics.detail_oriented
    )
}

/// Parse a decision out of model text, tolerating prose around the JSON
pub fn parse_choice(text: &str) -> std::result::Result<OracleChoice, OracleError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &text[s..=e],
        _ => return Err(OracleError::InvalidResponse("no JSON object in response".to_string())),
    };
    serde_json::from_str(json).map_err(|e| OracleError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl DecisionOracle for ClaudeOracle {
    async fn choose(
        &self,
        persona: &Persona,
        context: &str,
        options: &[String],
    ) -> std::result::Result<OracleChoice, OracleError> {
        debug!("Asking oracle: {}", context);
        let text = self
            .complete(decision_prompt(persona, context, options), self.settings.max_tokens)
            .await?;
        parse_choice(&text)
    }
}

#[async_trait]
impl ContentGenerator for ClaudeOracle {
    async fn generate(&self, persona: &Persona, content_type: &str) -> std::result::Result<String, OracleError> {
        let text = self
            .complete(content_prompt(persona, content_type), self.settings.max_tokens * 2)
            .await?;
        if text.trim().is_empty() {
            return Err(OracleError::InvalidResponse("empty content".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PersonaType;
    use crate::persona::PersonaGenerator;
    use crate::runtime::random::ScriptedRandom;

    #[test]
    fn test_parse_plain_json() {
        let choice =
            parse_choice(r#"{"chosen": "API integration", "reasoning": "automation", "confidence": 0.8}"#)
                .unwrap();
        assert_eq!(choice.chosen, "API integration");
        assert_eq!(choice.confidence, 0.8);
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let text = "Sure! Here is my answer:\n{\"chosen\": \"PDF\", \"reasoning\": \"familiar\", \"confidence\": 0.6}\nHope that helps.";
        assert_eq!(parse_choice(text).unwrap().chosen, "PDF");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_choice("I would pick the first one").is_err());
        assert!(parse_choice("{not json}").is_err());
    }

    #[test]
    fn test_prompts_mention_persona() {
        let mut rng = ScriptedRandom::constant(0.0);
        let persona = PersonaGenerator::generate(PersonaType::Expert, 3, &mut rng);
        let options = vec!["Bulk operations".to_string(), "API integration".to_string()];

        let prompt = decision_prompt(&persona, "Which advanced feature?", &options);
        assert!(prompt.contains("Pro Marketer 3"));
        assert!(prompt.contains("2. API integration"));

        let prompt = content_prompt(&persona, "book_metadata");
        assert!(prompt.contains("EXPERT"));
    }
}
