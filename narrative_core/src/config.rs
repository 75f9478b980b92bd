//! Simulation tunables.

use serde::{Deserialize, Serialize};
use world_rules::{DistanceWeights, Result};

/// Chances, intervals and thresholds for generation and the epoch systems.
///
/// Every field has a default, so a TOML document only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the engine RNG. `None` draws one from entropy.
    pub seed: Option<u64>,

    // --- Generation ---
    pub min_locations_per_biome: u32,
    pub max_locations_per_biome: u32,
    /// Gate for the single faction batch attempted per location.
    pub faction_spawn_chance: f64,
    /// Share of free cells the layout fill pass tries to occupy.
    pub fill_ratio: f64,

    // --- Lifecycle ---
    pub leader_death_chance: f64,
    pub resource_depletion_chance: f64,
    pub resource_regrowth_chance: f64,
    pub new_resource_chance: f64,
    pub famine_chance: f64,
    /// Growth (discovery, new resources, regrowth) runs every this many epochs.
    pub growth_interval: u32,

    // --- Conflict ---
    pub religious_war_chance: f64,
    pub civil_war_interval: u32,
    pub civil_war_chance: f64,
    pub civil_war_tension: f64,
    /// Political spawn chance per unit of tension.
    pub political_base_chance: f64,
    /// Tension at which a political conflict always breaks out.
    pub forced_tension: f64,
    pub raid_chance: f64,
    /// Minimum aggression for a faction to go raiding.
    pub raid_aggression_threshold: i32,
    pub same_faith_raid_abort: f64,
    pub boss_chance: f64,
    pub boss_ruins_multiplier: f64,
    pub boss_occupied_divisor: f64,
    pub culture_weights: DistanceWeights,

    // --- Belief ---
    pub believer_resistance: f64,
    pub unbeliever_resistance: f64,
    pub conversion_pressure_threshold: f64,

    // --- Transformation ---
    pub discovery_chance: f64,
    pub expansion_chance: f64,

    /// Sort each epoch's events by importance and tier them.
    pub importance_weighting: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            min_locations_per_biome: 2,
            max_locations_per_biome: 3,
            faction_spawn_chance: 0.75,
            fill_ratio: 1.0,
            leader_death_chance: 0.02,
            resource_depletion_chance: 0.03,
            resource_regrowth_chance: 0.1,
            new_resource_chance: 0.05,
            famine_chance: 0.5,
            growth_interval: 5,
            religious_war_chance: 0.05,
            civil_war_interval: 20,
            civil_war_chance: 0.1,
            civil_war_tension: 5.0,
            political_base_chance: 0.25,
            forced_tension: 10.0,
            raid_chance: 0.1,
            raid_aggression_threshold: 3,
            same_faith_raid_abort: 0.8,
            boss_chance: 0.03,
            boss_ruins_multiplier: 3.0,
            boss_occupied_divisor: 5.0,
            culture_weights: DistanceWeights::default(),
            believer_resistance: 0.9,
            unbeliever_resistance: 0.2,
            conversion_pressure_threshold: 2.0,
            discovery_chance: 0.1,
            expansion_chance: 0.1,
            importance_weighting: false,
        }
    }
}

impl SimulationConfig {
    /// Parse a TOML document, filling unspecified fields with defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Builder: fix the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_overrides() {
        let config = SimulationConfig::from_toml_str(
            r#"
seed = 42
raid_chance = 0.5
importance_weighting = true

[culture_weights]
deadzone = 0.0
"#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(42));
        assert_eq!(config.raid_chance, 0.5);
        assert!(config.importance_weighting);
        assert_eq!(config.culture_weights.deadzone, 0.0);
        assert_eq!(config.culture_weights.aggression, DistanceWeights::default().aggression);
        assert_eq!(config.growth_interval, 5);
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(SimulationConfig::from_toml_str("growth_interval = \"often\"").is_err());
    }
}
