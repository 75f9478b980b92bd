//! Shared fixtures for the unit tests of this crate.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use world_rules::{
    keys, CultureVector, Entity, EntityId, EntityType, RelationKind, SyllableNamer, TemplateStore,
    WorldGraph,
};

use crate::config::SimulationConfig;
use crate::query::WorldQueryService;
use crate::systems::EpochContext;

pub const TEMPLATES: &str = r#"
[[biomes]]
id = "bio_plains"
name = "Plains"
capacity = 5
allowed_locations = ["loc_hamlet", "loc_grove"]
available_resources = ["res_grain", "res_iron"]

[[biomes.faction_spawn_rules]]
definition_id = "fac_humans"
role = "farmer"

[[biomes]]
id = "bio_peaks"
name = "Peaks"
capacity = 4
tags = ["cold"]
allowed_locations = ["loc_hamlet"]
available_resources = ["res_iron"]

[[biomes.faction_spawn_rules]]
definition_id = "fac_orcs"
role = "warrior"
extra_tags = ["highland"]

[[locations]]
id = "loc_hamlet"
name = "Hamlet"
capacity = 4
tags = ["settlement"]
limits = { Faction = 1, Resource = 1 }

[[locations]]
id = "loc_grove"
name = "Grove"
tags = ["nature", "hidden"]
limits = { Faction = 1, Resource = 2 }

[[locations]]
id = "loc_camp"
name = "Camp"
tags = ["settlement"]
limits = { Faction = 2, Resource = 1 }

[[factions]]
id = "fac_humans"
creature_type = "human"
role = "farmer"
base_culture = { aggression = 5, collectivism = 2 }

[[factions]]
id = "fac_orcs"
creature_type = "orc"
role = "warrior"
base_culture = { aggression = 8 }
default_belief = "bel_war"

[[resources]]
id = "res_grain"
name_key = "Grain"
rarity_options = [{ rarity = "common", weight = 3 }, { rarity = "rare", weight = 1 }]

[[resources]]
id = "res_iron"
name_key = "Iron"
renewable = false
rarity_options = [{ rarity = "uncommon", weight = 1 }]

[[beliefs]]
id = "bel_sun"
name = "Sun Cult"
naming_style = "flowing"
preferred_roles = ["farmer"]
base_modifiers = { collectivism = 2, revered = ["light"] }

[[beliefs.variations]]
name = "Dawn"
modifiers = { magic_affinity = 1 }

[[beliefs]]
id = "bel_war"
name = "War Drum"
naming_style = "harsh"
preferred_roles = ["warrior"]
base_modifiers = { aggression = 3 }

[[traits]]
id = "trait_bold"
name = "Bold"
modifiers = { aggression = 2 }

[[traits]]
id = "trait_wise"
name = "Wise"
modifiers = { magic_affinity = 2 }

[[bosses]]
id = "boss_wyrm"
name_template = "{name} the Wyrm"
role = "predator"
tags = ["monster"]
culture = { aggression = 12 }
allowed_biomes = ["bio_peaks"]

[[transformations]]
id = "tr_reclaim"
requires_tag = "ruins"
min_age_empty = 5
target_definition = "loc_wild_ruins"
chance = 1.0

[[transformations]]
id = "tr_resettle"
requires_tag = "wild"
needs_faction = true
target_definition = "loc_hamlet"
chance = 1.0
narrative_text = "Settlers raise walls"
"#;

pub fn fixture_store() -> TemplateStore {
    TemplateStore::from_toml_str(TEMPLATES).expect("fixture templates parse")
}

pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

pub fn id(raw: &str) -> EntityId {
    EntityId::from_raw(raw)
}

/// Everything an [`EpochContext`] borrows, owned in one place.
pub struct Harness {
    pub world: WorldQueryService,
    pub templates: TemplateStore,
    pub namer: SyllableNamer<ChaCha8Rng>,
    pub config: SimulationConfig,
    pub rng: ChaCha8Rng,
}

impl Harness {
    pub fn new(graph: WorldGraph, seed: u64) -> Self {
        Self {
            world: WorldQueryService::new(graph),
            templates: fixture_store(),
            namer: SyllableNamer::new(seeded(seed.wrapping_add(1))),
            config: SimulationConfig::default(),
            rng: seeded(seed),
        }
    }

    pub fn ctx(&mut self, epoch: u32) -> EpochContext<'_, ChaCha8Rng> {
        EpochContext {
            world: &mut self.world,
            templates: &self.templates,
            namer: &mut self.namer,
            config: &self.config,
            rng: &mut self.rng,
            epoch,
        }
    }
}

/// `bio_1` (plains) holding `loc_1` and `loc_2`, with `bio_2` (peaks) next door holding `loc_3`.
pub fn two_biome_graph() -> WorldGraph {
    let mut graph = WorldGraph::with_builtin_relation_types();
    graph.add_entity(
        Entity::new(id("bio_1"), EntityType::Biome, "bio_plains", "Plains")
            .with_capacity(5)
            .with_data(keys::COORD, vec![0.0, 0.0])
            .with_data(keys::NEIGHBOR_BIOMES, vec!["bio_2"]),
    );
    graph.add_entity(
        Entity::new(id("bio_2"), EntityType::Biome, "bio_peaks", "Peaks")
            .with_capacity(4)
            .with_data(keys::COORD, vec![1.0, 0.0])
            .with_data(keys::NEIGHBOR_BIOMES, vec!["bio_1"]),
    );
    for (loc, biome, x) in [("loc_1", "bio_1", 0.1), ("loc_2", "bio_1", -0.1), ("loc_3", "bio_2", 1.0)] {
        graph.add_entity(
            Entity::new(id(loc), EntityType::Location, "loc_hamlet", loc)
                .with_parent(id(biome))
                .with_capacity(4)
                .with_tags(["settlement"])
                .with_data(keys::ABS_COORD, vec![x, 0.0])
                .with_data(keys::LIMITS, serde_json::json!({ "Faction": 1, "Resource": 1 })),
        );
    }
    graph
}

/// Add a faction with a base culture to a location, wired with `faction_located_in`.
pub fn add_faction(graph: &mut WorldGraph, raw: &str, location: &str, culture: CultureVector) -> EntityId {
    let faction = graph.add_entity(
        Entity::new(id(raw), EntityType::Faction, "fac_humans", raw)
            .with_parent(id(location))
            .with_tags(["faction"])
            .with_data(keys::ROLE, "farmer")
            .with_culture(&culture),
    );
    graph
        .add_relation(&faction, &id(location), &RelationKind::FactionLocatedIn)
        .expect("fixture relation is well typed");
    faction
}
