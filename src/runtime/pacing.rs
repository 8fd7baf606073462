// src/runtime/pacing.rs
//! Human-like pacing between flow steps
//!
//! Beginners are slow, experts are fast. A symmetric jitter of up to half the
//! base delay keeps concurrent agents from firing in lock-step.

use crate::model::PersonaType;
use crate::runtime::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay policy applied between consecutive steps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacingPolicy {
    pub enabled: bool,
    pub beginner_ms: u64,
    pub intermediate_ms: u64,
    /// Experts and power users
    pub advanced_ms: u64,
    /// Jitter as a fraction of the base delay (0.5 = ±50%)
    pub jitter_ratio: f64,
}

impl PacingPolicy {
    pub fn realistic() -> Self {
        Self {
            enabled: true,
            beginner_ms: 3000,
            intermediate_ms: 2000,
            advanced_ms: 1000,
            jitter_ratio: 0.5,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::realistic()
        }
    }

    /// Multiply every base delay by `factor`
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor.max(0.0)).round() as u64;
        Self {
            beginner_ms: scale(self.beginner_ms),
            intermediate_ms: scale(self.intermediate_ms),
            advanced_ms: scale(self.advanced_ms),
            ..self
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_delay(&self, persona_type: PersonaType) -> Duration {
        let ms = match persona_type {
            PersonaType::Beginner => self.beginner_ms,
            PersonaType::Intermediate => self.intermediate_ms,
            PersonaType::Expert | PersonaType::PowerUser => self.advanced_ms,
        };
        Duration::from_millis(ms)
    }

    /// Base delay plus jitter in `[-base * ratio, +base * ratio)`
    pub fn delay_for(&self, persona_type: PersonaType, rng: &mut dyn RandomSource) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let base = self.base_delay(persona_type).as_millis() as f64;
        let variation = base * self.jitter_ratio;
        let jitter = rng.next_f64() * variation * 2.0 - variation;
        Duration::from_millis((base + jitter).max(0.0).round() as u64)
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::realistic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::random::ScriptedRandom;

    #[test]
    fn test_base_delays_by_type() {
        let policy = PacingPolicy::realistic();
        assert_eq!(policy.base_delay(PersonaType::Beginner), Duration::from_millis(3000));
        assert_eq!(policy.base_delay(PersonaType::Intermediate), Duration::from_millis(2000));
        assert_eq!(policy.base_delay(PersonaType::Expert), Duration::from_millis(1000));
        assert_eq!(policy.base_delay(PersonaType::PowerUser), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = PacingPolicy::realistic();
        let mut low = ScriptedRandom::constant(0.0);
        let mut mid = ScriptedRandom::constant(0.5);

        assert_eq!(
            policy.delay_for(PersonaType::Beginner, &mut low),
            Duration::from_millis(1500)
        );
        assert_eq!(
            policy.delay_for(PersonaType::Beginner, &mut mid),
            Duration::from_millis(3000)
        );
    }

    #[test]
    fn test_disabled_and_scaled() {
        let mut rng = ScriptedRandom::constant(0.5);
        assert_eq!(
            PacingPolicy::disabled().delay_for(PersonaType::Beginner, &mut rng),
            Duration::ZERO
        );

        let fast = PacingPolicy::realistic().scaled(0.01);
        assert_eq!(fast.base_delay(PersonaType::Beginner), Duration::from_millis(30));
    }
}
