//! Archetype definitions, keyed by definition id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{CultureVector, EntityType};
use crate::mechanics::Rarity;

/// A spawn option for factions inside a biome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionSpawnRule {
    /// Faction archetype id.
    pub definition_id: String,
    pub role: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Extra tags stamped on the spawned faction.
    #[serde(default)]
    pub extra_tags: Vec<String>,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeTemplate {
    pub id: String,
    pub name: String,
    #[serde(default = "default_biome_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub allowed_locations: Vec<String>,
    #[serde(default)]
    pub forbidden_neighbors: Vec<String>,
    #[serde(default)]
    pub available_resources: Vec<String>,
    #[serde(default)]
    pub faction_spawn_rules: Vec<FactionSpawnRule>,
}

fn default_biome_capacity() -> u32 {
    5
}

/// Per-type occupancy limits of a location, keyed by entity type name (`"Faction"`).
pub type Limits = BTreeMap<String, u32>;

/// Limit for one entity type, if the map declares it.
pub fn limit_for(limits: &Limits, entity_type: EntityType) -> Option<u32> {
    limits.get(&entity_type.to_string()).copied()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationTemplate {
    pub id: String,
    pub name: String,
    #[serde(default = "default_location_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_location_capacity() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionTemplate {
    pub id: String,
    pub creature_type: String,
    pub role: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub base_culture: CultureVector,
    #[serde(default)]
    pub default_belief: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RarityOption {
    pub rarity: Rarity,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    pub id: String,
    pub name_key: String,
    #[serde(default = "default_true")]
    pub renewable: bool,
    #[serde(default)]
    pub rarity_options: Vec<RarityOption>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefVariation {
    pub name: String,
    #[serde(default)]
    pub modifiers: CultureVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub naming_style: String,
    #[serde(default)]
    pub preferred_roles: Vec<String>,
    #[serde(default)]
    pub base_modifiers: CultureVector,
    #[serde(default)]
    pub variations: Vec<BeliefVariation>,
}

/// Personality trait a leader can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub modifiers: CultureVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossTemplate {
    pub id: String,
    pub name_template: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub culture: CultureVector,
    /// Biome archetype ids this boss may appear in.
    #[serde(default)]
    pub allowed_biomes: Vec<String>,
}

/// Special transformation target that retags a location as reclaimed wilderness.
pub const WILD_RUINS_TARGET: &str = "loc_wild_ruins";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRule {
    pub id: String,
    pub requires_tag: String,
    /// Faction presence the location must match.
    #[serde(default)]
    pub needs_faction: bool,
    /// Epochs that must pass after destruction before the rule applies.
    #[serde(default)]
    pub min_age_empty: Option<u32>,
    pub target_definition: String,
    pub chance: f64,
    #[serde(default)]
    pub narrative_text: String,
}

/// Common lookup key of all archetypes.
pub trait Archetype {
    /// Registry label used in error messages.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

macro_rules! impl_archetype {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl Archetype for $ty {
                const KIND: &'static str = $kind;

                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_archetype!(
    BiomeTemplate => "biome",
    LocationTemplate => "location",
    FactionTemplate => "faction",
    ResourceTemplate => "resource",
    BeliefTemplate => "belief",
    TraitTemplate => "trait",
    BossTemplate => "boss",
    TransformationRule => "transformation",
);
