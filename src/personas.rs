//! Buyer archetypes used to drive the purchase simulation.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Persona {
    pub name: &'static str,
    pub age_range: (u8, u8),
    /// How much a charity cause raises purchase intent, in `[0, 1]`.
    pub charity_motivation: f64,
    /// Sensitivity to price above the persona's comfort threshold, in `[0, 1]`.
    pub price_elasticity: f64,
    pub fan_loyalty: f64,
    pub base_probability: f64,
    /// Relative share of the buying population, used by weighted sampling.
    pub population_weight: f64,
}

const CATALOG: [Persona; 5] = [
    Persona {
        name: "young_superfan",
        age_range: (16, 24),
        charity_motivation: 0.6,
        price_elasticity: 0.3,
        fan_loyalty: 0.95,
        base_probability: 0.7,
        population_weight: 0.25,
    },
    Persona {
        name: "professional",
        age_range: (25, 44),
        charity_motivation: 0.5,
        price_elasticity: 0.4,
        fan_loyalty: 0.6,
        base_probability: 0.5,
        population_weight: 0.3,
    },
    Persona {
        name: "family",
        age_range: (30, 55),
        charity_motivation: 0.7,
        price_elasticity: 0.7,
        fan_loyalty: 0.5,
        base_probability: 0.4,
        population_weight: 0.2,
    },
    Persona {
        name: "affluent",
        age_range: (40, 70),
        charity_motivation: 0.8,
        price_elasticity: 0.1,
        fan_loyalty: 0.5,
        base_probability: 0.6,
        population_weight: 0.1,
    },
    Persona {
        name: "price_conscious_student",
        age_range: (18, 25),
        charity_motivation: 0.4,
        price_elasticity: 0.9,
        fan_loyalty: 0.7,
        base_probability: 0.3,
        population_weight: 0.15,
    },
];

/// Static catalog of buyer segments. Sampling has no side effects beyond
/// advancing the caller's random source.
#[derive(Debug, Clone)]
pub struct PersonaModel {
    personas: Vec<Persona>,
    weights: WeightedIndex<f64>,
}

impl Default for PersonaModel {
    fn default() -> Self {
        Self::new(CATALOG.to_vec()).unwrap_or_else(|| unreachable!("catalog weights are positive"))
    }
}

impl PersonaModel {
    /// Builds a model over a custom catalog. Returns `None` when the catalog is
    /// empty or its weights cannot form a distribution.
    pub fn new(personas: Vec<Persona>) -> Option<Self> {
        let weights = WeightedIndex::new(personas.iter().map(|p| p.population_weight)).ok()?;
        Some(Self { personas, weights })
    }

    pub fn catalog(&self) -> &[Persona] {
        &self.personas
    }

    /// Draws one persona uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &Persona {
        self.personas
            .choose(rng)
            .unwrap_or(&CATALOG[0])
    }

    /// Draws one persona according to `population_weight`.
    pub fn sample_weighted<R: Rng + ?Sized>(&self, rng: &mut R) -> &Persona {
        &self.personas[self.weights.sample(rng)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    #[test]
    fn catalog_has_five_bounded_personas() {
        let model = PersonaModel::default();
        assert_eq!(model.catalog().len(), 5);
        for p in model.catalog() {
            for v in [p.charity_motivation, p.price_elasticity, p.fan_loyalty, p.base_probability] {
                assert!((0.0..=1.0).contains(&v), "{} out of range", p.name);
            }
            assert!(p.age_range.0 <= p.age_range.1);
        }
    }

    #[test]
    fn uniform_sampling_reaches_every_persona() {
        let model = PersonaModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen: HashMap<&str, u32> = HashMap::new();
        for _ in 0..5_000 {
            *seen.entry(model.sample(&mut rng).name).or_default() += 1;
        }
        assert_eq!(seen.len(), 5);
        for count in seen.values() {
            assert!((800..1_200).contains(count), "uniform draw skewed: {count}");
        }
    }

    #[test]
    fn weighted_sampling_follows_population_share() {
        let model = PersonaModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let affluent = (0..10_000)
            .filter(|_| model.sample_weighted(&mut rng).name == "affluent")
            .count();
        assert!((800..1_200).contains(&affluent), "affluent share {affluent}");
    }

    #[test]
    fn same_seed_same_sequence() {
        let model = PersonaModel::default();
        let mut a = ChaCha8Rng::seed_from_u64(3);
        let mut b = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(model.sample(&mut a).name, model.sample(&mut b).name);
        }
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(PersonaModel::new(Vec::new()).is_none());
    }
}
