// src/model/persona.rs
//! Simulated user personas

use serde::{Deserialize, Serialize};
use std::fmt;

/// Persona type, ordered from least to most experienced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonaType {
    Beginner,
    Intermediate,
    Expert,
    PowerUser,
}

impl PersonaType {
    /// All types in order
    pub const ALL: [PersonaType; 4] = [
        PersonaType::Beginner,
        PersonaType::Intermediate,
        PersonaType::Expert,
        PersonaType::PowerUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaType::Beginner => "BEGINNER",
            PersonaType::Intermediate => "INTERMEDIATE",
            PersonaType::Expert => "EXPERT",
            PersonaType::PowerUser => "POWER_USER",
        }
    }

    /// Experts and power users
    pub fn is_advanced(&self) -> bool {
        matches!(self, PersonaType::Expert | PersonaType::PowerUser)
    }
}

impl fmt::Display for PersonaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait vector, every value in `1..=10`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Characteristics {
    pub tech_savvy: u8,
    pub patience: u8,
    pub risk_tolerance: u8,
    pub detail_oriented: u8,
}

impl Characteristics {
    pub fn as_array(&self) -> [u8; 4] {
        [
            self.tech_savvy,
            self.patience,
            self.risk_tolerance,
            self.detail_oriented,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorHandlingStyle {
    Retry,
    GiveUp,
    SeekHelp,
}

impl ErrorHandlingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorHandlingStyle::Retry => "retry",
            ErrorHandlingStyle::GiveUp => "give-up",
            ErrorHandlingStyle::SeekHelp => "seek-help",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureAdoption {
    Early,
    Cautious,
    Late,
}

impl FeatureAdoption {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureAdoption::Early => "early",
            FeatureAdoption::Cautious => "cautious",
            FeatureAdoption::Late => "late",
        }
    }
}

/// How a persona tends to decide
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPatterns {
    /// 0 = efficient, 1 = exploratory
    pub exploration_vs_efficiency: f64,
    pub error_handling: ErrorHandlingStyle,
    pub feature_adoption: FeatureAdoption,
}

/// A generated simulated user. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub persona_type: PersonaType,
    pub characteristics: Characteristics,
    pub goals: Vec<String>,
    pub pain_points: Vec<String>,
    pub decision_patterns: DecisionPatterns,
}

impl Persona {
    /// Multi-line description handed to the decision and content oracles
    pub fn describe(&self) -> String {
        let c = &self.characteristics;
        let d = &self.decision_patterns;
        format!(
            "- Name: {}\n\
             - Type: {}\n\
             - Tech Savviness: {}/10\n\
             - Patience: {}/10\n\
             - Risk Tolerance: {}/10\n\
             - Detail Oriented: {}/10\n\
             - Goals: {}\n\
             - Pain Points: {}\n\
             - Exploration vs Efficiency: {}\n\
             - Error Handling: {}\n\
             - Feature Adoption: {}",
            self.name,
            self.persona_type,
            c.tech_savvy,
            c.patience,
            c.risk_tolerance,
            c.detail_oriented,
            self.goals.join(", "),
            self.pain_points.join(", "),
            d.exploration_vs_efficiency,
            d.error_handling.as_str(),
            d.feature_adoption.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ordering() {
        assert!(PersonaType::Beginner < PersonaType::Intermediate);
        assert!(PersonaType::Expert < PersonaType::PowerUser);
        assert!(PersonaType::PowerUser.is_advanced());
        assert!(!PersonaType::Intermediate.is_advanced());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PersonaType::PowerUser).unwrap();
        assert_eq!(json, "\"POWER_USER\"");

        let style = serde_json::to_string(&ErrorHandlingStyle::SeekHelp).unwrap();
        assert_eq!(style, "\"seek-help\"");
    }
}
