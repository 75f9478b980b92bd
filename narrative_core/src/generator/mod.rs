//! World generator - turns a spatial layout into the initial entity graph.
//!
//! Population runs top-down: biomes, then 2-3 locations per biome, then the
//! resources and factions of each location. Structural relations are wired
//! once at the end by scanning `parent_id`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use world_rules::{
    ids_to_value, keys, limit_for, BiomeTemplate, Entity, EntityId, EntityType, FactionSpawnRule,
    LocationTemplate, NameContext, NamingOracle, Rarity, RarityOption, RelationKind, Result,
    TemplateStore, WorldError, WorldGraph,
};

use crate::config::SimulationConfig;
use crate::layout::{Coord, SpatialLayout, SpatialLayoutGenerator};
use crate::query::WorldQueryService;
use crate::systems::roll_chance;

/// Naming attempts before a numeric suffix is used for a biome name.
const NAME_RETRIES: usize = 10;
/// Resource slots of a location template without a Resource limit.
pub const DEFAULT_RESOURCE_LIMIT: u32 = 1;
/// Faction slots of a location template without a Faction limit.
pub const DEFAULT_FACTION_LIMIT: u32 = 2;

/// Builds worlds from templates.
pub struct WorldGenerator<'a> {
    templates: &'a TemplateStore,
    namer: &'a mut dyn NamingOracle,
    config: &'a SimulationConfig,
}

impl<'a> WorldGenerator<'a> {
    pub fn new(
        templates: &'a TemplateStore,
        namer: &'a mut dyn NamingOracle,
        config: &'a SimulationConfig,
    ) -> Self {
        Self {
            templates,
            namer,
            config,
        }
    }

    /// Lay out a `width x height` map and populate it.
    ///
    /// An empty `biome_pool` uses every registered biome; the first pool
    /// entry doubles as the fallback biome.
    pub fn generate<R: Rng>(
        &mut self,
        width: u32,
        height: u32,
        biome_pool: &[String],
        rng: &mut R,
    ) -> Result<WorldGraph> {
        let pool: Vec<String> = if biome_pool.is_empty() {
            self.templates.biomes.all().map(|b| b.id.clone()).collect()
        } else {
            biome_pool.to_vec()
        };
        let default_biome = pool.first().cloned().ok_or(WorldError::EmptyLayout)?;

        let layout = SpatialLayoutGenerator::new(self.templates).generate(
            width,
            height,
            &pool,
            &default_biome,
            self.config.fill_ratio,
            rng,
        );
        self.populate(&layout, rng)
    }

    /// Instantiate the entity graph for an existing layout.
    pub fn populate<R: Rng>(&mut self, layout: &SpatialLayout, rng: &mut R) -> Result<WorldGraph> {
        if layout.occupied().next().is_none() {
            return Err(WorldError::EmptyLayout);
        }
        let mut world = WorldQueryService::new(WorldGraph::with_builtin_relation_types());

        let biomes = self.create_biomes(&mut world, layout, rng);
        for (coord, biome_id) in &biomes {
            let neighbors: Vec<EntityId> = layout
                .neighbors(*coord)
                .iter()
                .filter_map(|n| biomes.get(n).cloned())
                .collect();
            if let Some(biome) = world.entity_mut(biome_id) {
                biome.set_data(keys::NEIGHBOR_BIOMES, ids_to_value(&neighbors));
            }
        }

        let templates = self.templates;
        for biome_id in biomes.values() {
            let Some(template) = world
                .entity(biome_id)
                .and_then(|b| templates.biomes.get(&b.definition_id))
            else {
                continue;
            };
            self.create_locations(&mut world, biome_id, template, rng);
        }

        let linked = wire_structural_relations(&mut world)?;
        info!(
            biomes = biomes.len(),
            entities = world.graph().entity_count(),
            relations = linked,
            "world generated"
        );
        Ok(world.into_graph())
    }

    fn create_biomes<R: Rng>(
        &mut self,
        world: &mut WorldQueryService,
        layout: &SpatialLayout,
        rng: &mut R,
    ) -> BTreeMap<Coord, EntityId> {
        let templates = self.templates;
        let mut placed = BTreeMap::new();
        let mut used_names = BTreeSet::new();

        for (coord, definition) in layout.occupied() {
            let Some(template) = templates.biomes.get(definition) else {
                warn!(biome = definition, "biome missing from registry, cell left empty");
                continue;
            };
            let name = self.unique_biome_name(template, &used_names);
            used_names.insert(name.clone());

            let biome = Entity::new(
                EntityId::generate(EntityType::Biome.id_prefix(), rng),
                EntityType::Biome,
                &template.id,
                name,
            )
            .with_tags(template.tags.iter().cloned())
            .with_capacity(template.capacity)
            .with_data(keys::COORD, vec![f64::from(coord.0), f64::from(coord.1)]);
            placed.insert(coord, world.add_entity(biome));
        }
        placed
    }

    fn unique_biome_name(&mut self, template: &BiomeTemplate, used: &BTreeSet<String>) -> String {
        let context = NameContext::new()
            .with("biome_id", template.id.clone())
            .with("base_name", template.name.clone());
        for _ in 0..NAME_RETRIES {
            let name = self.namer.generate_name(EntityType::Biome, &context);
            if !used.contains(&name) {
                return name;
            }
        }
        (1..)
            .map(|n| format!("{} {n}", template.name))
            .find(|candidate| !used.contains(candidate))
            .unwrap_or_else(|| template.name.clone())
    }

    fn create_locations<R: Rng>(
        &mut self,
        world: &mut WorldQueryService,
        biome_id: &EntityId,
        biome: &BiomeTemplate,
        rng: &mut R,
    ) {
        let templates = self.templates;
        let allowed: Vec<&LocationTemplate> = biome
            .allowed_locations
            .iter()
            .filter_map(|id| templates.locations.get(id))
            .collect();
        if allowed.is_empty() {
            debug!(biome = %biome.id, "no registered location archetypes");
            return;
        }

        let max = self.config.max_locations_per_biome.min(biome.capacity);
        let min = self.config.min_locations_per_biome.min(max);
        let count = rng.gen_range(min..=max);

        for _ in 0..count {
            let Some(template) = allowed.choose(rng).copied() else {
                break;
            };
            let location_id = spawn_location(world, self.namer, biome_id, template, 0, rng);
            self.populate_location(world, &location_id, biome, template, rng);
        }
    }

    fn populate_location<R: Rng>(
        &mut self,
        world: &mut WorldQueryService,
        location_id: &EntityId,
        biome: &BiomeTemplate,
        location: &LocationTemplate,
        rng: &mut R,
    ) {
        let max_resources = limit_for(&location.limits, EntityType::Resource).unwrap_or(DEFAULT_RESOURCE_LIMIT);
        let current = world.children(location_id, Some(EntityType::Resource)).len() as u32;
        if max_resources > current && !biome.available_resources.is_empty() {
            let count = rng.gen_range(1..=2).min(max_resources - current);
            for _ in 0..count {
                if let Some(definition) = biome.available_resources.choose(rng) {
                    spawn_resource(world, self.templates, self.namer, location_id, definition, 0, rng);
                }
            }
        }

        let max_factions = limit_for(&location.limits, EntityType::Faction).unwrap_or(DEFAULT_FACTION_LIMIT);
        let current = world.children(location_id, Some(EntityType::Faction)).len() as u32;
        if max_factions > current && roll_chance(rng, self.config.faction_spawn_chance) {
            if let Some(rule) = choose_spawn_rule(&biome.faction_spawn_rules, rng) {
                self.spawn_faction(world, location_id, biome, rule, rng);
            }
        }
    }

    fn spawn_faction<R: Rng>(
        &mut self,
        world: &mut WorldQueryService,
        location_id: &EntityId,
        biome: &BiomeTemplate,
        rule: &FactionSpawnRule,
        rng: &mut R,
    ) {
        let templates = self.templates;
        let Some(template) = templates.factions.get(&rule.definition_id) else {
            warn!(faction = %rule.definition_id, "faction template not found");
            return;
        };
        let context = NameContext::new()
            .with("biome_id", biome.id.clone())
            .with("role", rule.role.clone())
            .with("creature_type", template.creature_type.clone())
            .with("style", template.creature_type.clone());
        let name = self.namer.generate_name(EntityType::Faction, &context);

        let mut faction = Entity::new(
            EntityId::generate(EntityType::Faction.id_prefix(), rng),
            EntityType::Faction,
            &template.id,
            name,
        )
        .with_parent(location_id.clone())
        .with_tags(["faction".to_string()])
        .with_tags(template.tags.iter().cloned())
        .with_tags(rule.extra_tags.iter().cloned())
        .with_data(keys::ROLE, rule.role.clone())
        .with_data(keys::CREATURE_TYPE, template.creature_type.clone())
        .with_culture(&template.base_culture);
        if let Some(belief) = &template.default_belief {
            faction.set_data(keys::DEFAULT_BELIEF, belief.clone());
        }

        let id = world.add_entity(faction);
        world.assign_slot(&id, rng);
    }
}

/// Weighted choice among spawn rules; zero weights are never picked unless all are zero.
fn choose_spawn_rule<'r, R: Rng>(rules: &'r [FactionSpawnRule], rng: &mut R) -> Option<&'r FactionSpawnRule> {
    rules
        .choose_weighted(rng, |r| r.weight)
        .ok()
        .or_else(|| rules.choose(rng))
}

/// Weighted rarity draw. Templates without options are common.
pub fn choose_rarity<R: Rng>(options: &[RarityOption], rng: &mut R) -> Rarity {
    options
        .choose_weighted(rng, |o| o.weight)
        .map(|o| o.rarity)
        .unwrap_or(Rarity::Common)
}

/// JSON form of a limits map for a location payload.
pub fn limits_to_value(limits: &world_rules::Limits) -> Value {
    json!(limits)
}

/// Create a Location inside a biome and give it a slot. Shared with the
/// systems that found or discover new locations.
pub fn spawn_location<R: Rng>(
    world: &mut WorldQueryService,
    namer: &mut dyn NamingOracle,
    biome_id: &EntityId,
    template: &LocationTemplate,
    epoch: u32,
    rng: &mut R,
) -> EntityId {
    let context = NameContext::new()
        .with("base_name", template.name.clone())
        .with("location_id", template.id.clone());
    let name = namer.generate_name(EntityType::Location, &context);

    let location = Entity::new(
        EntityId::generate(EntityType::Location.id_prefix(), rng),
        EntityType::Location,
        &template.id,
        name,
    )
    .with_parent(biome_id.clone())
    .with_tags(template.tags.iter().cloned())
    .with_capacity(template.capacity)
    .with_data(keys::LIMITS, limits_to_value(&template.limits))
    .created_at(epoch);

    let id = world.add_entity(location);
    world.assign_slot(&id, rng);
    id
}

/// Create a Resource of the given archetype inside a location.
///
/// Returns `None` when the archetype is not registered.
pub fn spawn_resource<R: Rng>(
    world: &mut WorldQueryService,
    templates: &TemplateStore,
    namer: &mut dyn NamingOracle,
    location_id: &EntityId,
    definition: &str,
    epoch: u32,
    rng: &mut R,
) -> Option<EntityId> {
    let Some(template) = templates.resources.get(definition) else {
        warn!(resource = definition, "resource template not found");
        return None;
    };
    let rarity = choose_rarity(&template.rarity_options, rng);
    let context = NameContext::new()
        .with("name_key", template.name_key.clone())
        .with("rarity", rarity.as_str());
    let name = namer.generate_name(EntityType::Resource, &context);

    let resource = Entity::new(
        EntityId::generate(EntityType::Resource.id_prefix(), rng),
        EntityType::Resource,
        &template.id,
        name,
    )
    .with_parent(location_id.clone())
    .with_tags(template.tags.iter().cloned())
    .with_tags([rarity.as_str()])
    .with_data(keys::RARITY, rarity.as_str())
    .with_data(keys::RENEWABLE, template.renewable)
    .created_at(epoch);

    Some(world.add_entity(resource))
}

/// Add `located_in` for resources and `faction_located_in` for factions whose
/// parent is a Location. Returns the number of edges created.
pub fn wire_structural_relations(world: &mut WorldQueryService) -> Result<usize> {
    let pending: Vec<(EntityId, EntityId, RelationKind)> = world
        .graph()
        .entities()
        .filter_map(|e| {
            let parent = e.parent_id.clone()?;
            if !world.is_type(&parent, EntityType::Location) {
                return None;
            }
            let kind = match e.entity_type {
                EntityType::Resource => RelationKind::LocatedIn,
                EntityType::Faction => RelationKind::FactionLocatedIn,
                _ => return None,
            };
            Some((e.id.clone(), parent, kind))
        })
        .collect();

    let mut created = 0;
    for (from, to, kind) in pending {
        if world.add_relation(&from, &to, &kind)? {
            created += 1;
        }
    }
    Ok(created)
}
