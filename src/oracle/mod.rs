// src/oracle/mod.rs
//! Decision and content oracles
//!
//! Flow steps that need a persona-flavoured choice or a piece of generated
//! text consult an oracle. Oracles are allowed to fail; callers always have a
//! fallback (random choice for decisions, a static string for content), so an
//! oracle outage never fails a flow.
//!
//! - [`ClaudeOracle`]: Anthropic Messages API over reqwest
//! - [`OfflineOracle`]: always unavailable, forcing every fallback

pub mod claude;

pub use claude::ClaudeOracle;

use crate::model::{Decision, Persona};
use crate::runtime::random::RandomSource;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Confidence attached to a fallback decision
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Content used when no flow-specific fallback exists
pub const DEFAULT_FALLBACK_CONTENT: &str = "Generated test content";

/// Error type for oracle calls
#[derive(Error, Debug, Clone)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle request failed: {0}")]
    Request(String),

    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// The oracle's answer to a decision request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleChoice {
    pub chosen: String,
    pub reasoning: String,
    pub confidence: f64,
}

/// Picks the option a persona would most likely choose
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn choose(
        &self,
        persona: &Persona,
        context: &str,
        options: &[String],
    ) -> Result<OracleChoice, OracleError>;
}

/// Generates persona-flavoured text
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, persona: &Persona, content_type: &str) -> Result<String, OracleError>;
}

/// Oracle that is never reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

#[async_trait]
impl DecisionOracle for OfflineOracle {
    async fn choose(&self, _: &Persona, _: &str, _: &[String]) -> Result<OracleChoice, OracleError> {
        Err(OracleError::Unavailable("offline".to_string()))
    }
}

#[async_trait]
impl ContentGenerator for OfflineOracle {
    async fn generate(&self, _: &Persona, _: &str) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("offline".to_string()))
    }
}

/// Turn an oracle outcome into a recorded decision
///
/// An error, or a choice that is not one of `options`, falls back to a
/// uniform-random option with confidence 0.5. An empty option list yields an
/// empty choice.
pub fn resolve_decision(
    outcome: Result<OracleChoice, OracleError>,
    context: &str,
    options: &[String],
    rng: &mut dyn RandomSource,
) -> Decision {
    let failure = match outcome {
        Ok(choice) if options.contains(&choice.chosen) => {
            return Decision {
                context: context.to_string(),
                options: options.to_vec(),
                chosen: choice.chosen,
                reasoning: choice.reasoning,
                confidence: sanitize_confidence(choice.confidence),
                timestamp: Utc::now(),
                fallback: false,
            };
        }
        Ok(choice) => format!("chosen option {:?} is not among the offered options", choice.chosen),
        Err(err) => err.to_string(),
    };

    let chosen = rng
        .pick_index(options.len())
        .map(|i| options[i].clone())
        .unwrap_or_default();

    Decision {
        context: context.to_string(),
        options: options.to_vec(),
        chosen,
        reasoning: format!("Fallback to random choice due to oracle error: {}", failure),
        confidence: FALLBACK_CONFIDENCE,
        timestamp: Utc::now(),
        fallback: true,
    }
}

fn sanitize_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        FALLBACK_CONFIDENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::random::ScriptedRandom;

    fn options() -> Vec<String> {
        vec!["PDF".to_string(), "HL7".to_string(), "FHIR".to_string()]
    }

    #[test]
    fn test_valid_choice_is_kept() {
        let mut rng = ScriptedRandom::constant(0.0);
        let outcome = Ok(OracleChoice {
            chosen: "FHIR".to_string(),
            reasoning: "interoperability".to_string(),
            confidence: 1.7,
        });
        let decision = resolve_decision(outcome, "Which report format?", &options(), &mut rng);

        assert_eq!(decision.chosen, "FHIR");
        assert_eq!(decision.confidence, 1.0);
        assert!(!decision.fallback);
    }

    #[test]
    fn test_error_falls_back_to_random_option() {
        let mut rng = ScriptedRandom::constant(0.5);
        let outcome = Err(OracleError::Unavailable("offline".to_string()));
        let decision = resolve_decision(outcome, "Which report format?", &options(), &mut rng);

        assert_eq!(decision.chosen, "HL7");
        assert_eq!(decision.confidence, FALLBACK_CONFIDENCE);
        assert!(decision.fallback);
        assert!(decision.reasoning.starts_with("Fallback to random choice"));
    }

    #[test]
    fn test_unknown_option_falls_back() {
        let mut rng = ScriptedRandom::constant(0.0);
        let outcome = Ok(OracleChoice {
            chosen: "DOCX".to_string(),
            reasoning: "".to_string(),
            confidence: 0.9,
        });
        let decision = resolve_decision(outcome, "Which report format?", &options(), &mut rng);

        assert_eq!(decision.chosen, "PDF");
        assert!(decision.fallback);
    }

    #[test]
    fn test_empty_options() {
        let mut rng = ScriptedRandom::constant(0.3);
        let decision = resolve_decision(
            Err(OracleError::Request("boom".to_string())),
            "Anything?",
            &[],
            &mut rng,
        );
        assert_eq!(decision.chosen, "");
        assert_eq!(decision.confidence, FALLBACK_CONFIDENCE);
    }
}
