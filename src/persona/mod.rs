// src/persona/mod.rs
//! Persona generation
//!
//! Personas are built from per-type templates. Trait values are drawn from
//! type-specific inclusive ranges through the injected [`RandomSource`];
//! goals, pain points and decision patterns are fixed per type.

use crate::model::{
    Characteristics, DecisionPatterns, ErrorHandlingStyle, FeatureAdoption, Persona, PersonaType,
};
use crate::runtime::random::{shuffle, RandomSource};

struct Template {
    name_prefix: &'static str,
    goals: [&'static str; 4],
    pain_points: [&'static str; 4],
}

/// Inclusive trait ranges: tech savvy, patience, risk tolerance, detail
type TraitRanges = [(u32, u32); 4];

pub struct PersonaGenerator;

impl PersonaGenerator {
    /// Generate one persona of `persona_type`
    pub fn generate(persona_type: PersonaType, index: usize, rng: &mut dyn RandomSource) -> Persona {
        let template = Self::template(persona_type);

        Persona {
            id: format!("persona_{}_{}", persona_type.as_str().to_lowercase(), index),
            name: format!("{} {}", template.name_prefix, index),
            persona_type,
            characteristics: Self::characteristics(persona_type, rng),
            goals: template.goals.iter().map(|g| g.to_string()).collect(),
            pain_points: template.pain_points.iter().map(|p| p.to_string()).collect(),
            decision_patterns: Self::decision_patterns(persona_type),
        }
    }

    /// Generate `count` personas cycling through every type, indexed from 1
    pub fn generate_batch(count: usize, rng: &mut dyn RandomSource) -> Vec<Persona> {
        (0..count)
            .map(|i| {
                let persona_type = PersonaType::ALL[i % PersonaType::ALL.len()];
                Self::generate(persona_type, i + 1, rng)
            })
            .collect()
    }

    /// Generate personas following [`Self::realistic_distribution`]
    pub fn generate_realistic_batch(count: usize, rng: &mut dyn RandomSource) -> Vec<Persona> {
        let types = Self::realistic_distribution(count, rng);
        types
            .into_iter()
            .enumerate()
            .map(|(i, t)| Self::generate(t, i + 1, rng))
            .collect()
    }

    /// 30% beginners, 40% intermediate, 20% experts, the rest power users,
    /// shuffled
    pub fn realistic_distribution(total: usize, rng: &mut dyn RandomSource) -> Vec<PersonaType> {
        let beginners = total * 3 / 10;
        let intermediates = total * 4 / 10;
        let experts = total * 2 / 10;
        let power = total - beginners - intermediates - experts;

        let mut distribution = Vec::with_capacity(total);
        distribution.extend(std::iter::repeat(PersonaType::Beginner).take(beginners));
        distribution.extend(std::iter::repeat(PersonaType::Intermediate).take(intermediates));
        distribution.extend(std::iter::repeat(PersonaType::Expert).take(experts));
        distribution.extend(std::iter::repeat(PersonaType::PowerUser).take(power));

        shuffle(&mut distribution, rng);
        distribution
    }

    fn characteristics(persona_type: PersonaType, rng: &mut dyn RandomSource) -> Characteristics {
        let ranges = Self::trait_ranges(persona_type);
        let mut draw = |(min, max): (u32, u32)| rng.range_inclusive(min, max) as u8;

        Characteristics {
            tech_savvy: draw(ranges[0]),
            patience: draw(ranges[1]),
            risk_tolerance: draw(ranges[2]),
            detail_oriented: draw(ranges[3]),
        }
    }

    fn trait_ranges(persona_type: PersonaType) -> TraitRanges {
        match persona_type {
            PersonaType::Beginner => [(2, 4), (4, 6), (2, 4), (5, 7)],
            PersonaType::Intermediate => [(5, 7), (5, 7), (5, 7), (6, 8)],
            PersonaType::Expert => [(8, 10), (6, 8), (7, 9), (7, 9)],
            PersonaType::PowerUser => [(9, 10), (7, 9), (8, 10), (8, 10)],
        }
    }

    fn decision_patterns(persona_type: PersonaType) -> DecisionPatterns {
        let (exploration, error_handling, adoption) = match persona_type {
            PersonaType::Beginner => (0.7, ErrorHandlingStyle::SeekHelp, FeatureAdoption::Cautious),
            PersonaType::Intermediate => (0.5, ErrorHandlingStyle::Retry, FeatureAdoption::Cautious),
            PersonaType::Expert => (0.3, ErrorHandlingStyle::Retry, FeatureAdoption::Early),
            PersonaType::PowerUser => (0.2, ErrorHandlingStyle::Retry, FeatureAdoption::Early),
        };

        DecisionPatterns {
            exploration_vs_efficiency: exploration,
            error_handling,
            feature_adoption: adoption,
        }
    }

    fn template(persona_type: PersonaType) -> Template {
        match persona_type {
            PersonaType::Beginner => Template {
                name_prefix: "Novice Author",
                goals: [
                    "Learn the platform basics",
                    "Complete first book upload",
                    "Generate initial marketing content",
                    "Understand what features are available",
                ],
                pain_points: [
                    "Overwhelmed by too many options",
                    "Unsure where to start",
                    "Needs clear guidance",
                    "Afraid of making mistakes",
                ],
            },
            PersonaType::Intermediate => Template {
                name_prefix: "Active Author",
                goals: [
                    "Optimize marketing campaigns",
                    "Improve content quality",
                    "Try advanced features",
                    "Track performance metrics",
                ],
                pain_points: [
                    "Wants better results faster",
                    "Balancing quality vs speed",
                    "Managing multiple books",
                    "Understanding analytics",
                ],
            },
            PersonaType::Expert => Template {
                name_prefix: "Pro Marketer",
                goals: [
                    "Maximize automation",
                    "Fine-tune AI outputs",
                    "Scale across many books",
                    "Integrate with existing workflows",
                ],
                pain_points: [
                    "Wants full control and customization",
                    "Needs advanced analytics",
                    "API access for automation",
                    "Bulk operations",
                ],
            },
            PersonaType::PowerUser => Template {
                name_prefix: "Publishing House",
                goals: [
                    "Manage team workflows",
                    "Process books at scale",
                    "Custom integrations",
                    "White-label capabilities",
                ],
                pain_points: [
                    "Complex approval processes",
                    "Multi-user coordination",
                    "Brand consistency",
                    "Cost efficiency at scale",
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::random::{ScriptedRandom, SeededRandom};
    use proptest::prelude::*;

    #[test]
    fn test_generate_identity() {
        let mut rng = ScriptedRandom::constant(0.0);
        let persona = PersonaGenerator::generate(PersonaType::PowerUser, 4, &mut rng);

        assert_eq!(persona.id, "persona_power_user_4");
        assert_eq!(persona.name, "Publishing House 4");
        assert_eq!(persona.goals.len(), 4);
        assert_eq!(persona.decision_patterns.exploration_vs_efficiency, 0.2);
        assert_eq!(persona.characteristics.tech_savvy, 9);
    }

    #[test]
    fn test_batch_cycles_types() {
        let mut rng = SeededRandom::seeded(1);
        let batch = PersonaGenerator::generate_batch(6, &mut rng);
        let types: Vec<_> = batch.iter().map(|p| p.persona_type).collect();

        assert_eq!(
            types,
            vec![
                PersonaType::Beginner,
                PersonaType::Intermediate,
                PersonaType::Expert,
                PersonaType::PowerUser,
                PersonaType::Beginner,
                PersonaType::Intermediate,
            ]
        );
        assert_eq!(batch[4].id, "persona_beginner_5");
    }

    #[test]
    fn test_realistic_distribution_counts() {
        let mut rng = SeededRandom::seeded(9);
        let types = PersonaGenerator::realistic_distribution(10, &mut rng);
        let count = |t| types.iter().filter(|x| **x == t).count();

        assert_eq!(types.len(), 10);
        assert_eq!(count(PersonaType::Beginner), 3);
        assert_eq!(count(PersonaType::Intermediate), 4);
        assert_eq!(count(PersonaType::Expert), 2);
        assert_eq!(count(PersonaType::PowerUser), 1);
    }

    proptest! {
        #[test]
        fn prop_traits_within_type_ranges(seed in any::<u64>(), idx in 0usize..4) {
            let mut rng = SeededRandom::seeded(seed);
            let persona_type = PersonaType::ALL[idx];
            let persona = PersonaGenerator::generate(persona_type, 1, &mut rng);
            let ranges = PersonaGenerator::trait_ranges(persona_type);

            for (value, (min, max)) in persona.characteristics.as_array().iter().zip(ranges.iter()) {
                prop_assert!((*min as u8..=*max as u8).contains(value));
                prop_assert!((1..=10).contains(value));
            }
        }
    }
}
