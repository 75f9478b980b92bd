//! Simulation systems - the rule engines run once per epoch.
//!
//! Each system is a set of free functions over an [`EpochContext`]. They read
//! and write the world only through the [`WorldQueryService`] and return the
//! events they produced, in call order.
//!
//! Failures concerning a single entity (a missing template, a vanished
//! participant) are logged and skipped. Only invariant violations such as a
//! mistyped relation are handed back to the engine.

pub mod belief;
pub mod conflict;
pub mod lifecycle;
pub mod transformation;

use rand::Rng;
use tracing::{debug, warn};
use world_rules::{
    keys, Entity, EntityId, EntityType, NamingOracle, Result, TemplateStore, WorldError,
};

use crate::config::SimulationConfig;
use crate::events::{EventRecord, EventSpec};
pub use crate::generator::DEFAULT_FACTION_LIMIT;
use crate::query::WorldQueryService;

/// Everything a system may touch during one epoch.
pub struct EpochContext<'a, R: Rng> {
    pub world: &'a mut WorldQueryService,
    pub templates: &'a TemplateStore,
    pub namer: &'a mut dyn NamingOracle,
    pub config: &'a SimulationConfig,
    pub rng: &'a mut R,
    pub epoch: u32,
}

impl<'a, R: Rng> EpochContext<'a, R> {
    /// Register an event in the graph for the current epoch.
    pub fn emit(&mut self, spec: EventSpec) -> EventRecord {
        self.world.register_event(spec, self.epoch, self.rng)
    }

    /// Bernoulli draw. Out-of-range chances saturate.
    pub fn roll(&mut self, chance: f64) -> bool {
        roll_chance(&mut *self.rng, chance)
    }
}

/// Bernoulli draw that saturates out-of-range chances and never fires on NaN.
pub(crate) fn roll_chance<R: Rng>(rng: &mut R, chance: f64) -> bool {
    if chance.is_nan() {
        return false;
    }
    rng.gen_bool(chance.clamp(0.0, 1.0))
}

/// Log and drop a soft per-entity failure; hand anything else back.
pub(crate) fn skip_soft<T>(result: Result<T>, step: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err @ WorldError::CapacityExceeded { .. }) => {
            debug!(step, error = %err, "no room");
            Ok(None)
        }
        Err(err) if err.is_soft() => {
            warn!(step, error = %err, "entity skipped");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Living, non-absorbed factions that are not bosses.
pub(crate) fn is_settled_faction(entity: &Entity) -> bool {
    entity.entity_type == EntityType::Faction
        && entity.is_alive()
        && !entity.has_any_tag(&[keys::TAG_ABSORBED, keys::TAG_BOSS])
}

/// Ids of every settled faction, in id order.
pub(crate) fn settled_factions(world: &WorldQueryService) -> Vec<EntityId> {
    world
        .graph()
        .entities_of_type(EntityType::Faction)
        .filter(|e| is_settled_faction(e))
        .map(|e| e.id.clone())
        .collect()
}

/// Active locations that are not ruins.
pub(crate) fn habitable_locations(world: &WorldQueryService, biome: &EntityId) -> Vec<EntityId> {
    world
        .children(biome, Some(EntityType::Location))
        .into_iter()
        .filter(|l| world.entity(l).map_or(false, |e| !e.has_tag(keys::TAG_RUINS)))
        .collect()
}

/// Whether a location can take another resident faction.
pub(crate) fn has_faction_room(world: &WorldQueryService, location: &EntityId) -> bool {
    let limit = world
        .limit(location, EntityType::Faction)
        .unwrap_or(DEFAULT_FACTION_LIMIT);
    (world.resident_factions(location).len() as u32) < limit
}

/// Display name of an entity, or its id when it is gone.
pub(crate) fn name_of(world: &WorldQueryService, id: &EntityId) -> String {
    world
        .entity(id)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_faction, id, two_biome_graph, Harness};
    use world_rules::CultureVector;

    #[test]
    fn test_roll_saturates() {
        let mut harness = Harness::new(two_biome_graph(), 1);
        let mut ctx = harness.ctx(1);
        assert!(ctx.roll(2.0));
        assert!(!ctx.roll(-1.0));
        assert!(!ctx.roll(f64::NAN));
    }

    #[test]
    fn test_faction_room_uses_limits() {
        let mut graph = two_biome_graph();
        add_faction(&mut graph, "fac_a", "loc_1", CultureVector::default());
        let world = WorldQueryService::new(graph);

        assert!(!has_faction_room(&world, &id("loc_1")));
        assert!(has_faction_room(&world, &id("loc_2")));
        assert_eq!(settled_factions(&world), vec![id("fac_a")]);
    }

    #[test]
    fn test_skip_soft_passes_hard_errors() {
        let soft: Result<()> = Err(WorldError::EntityNotFound(id("x")));
        assert!(matches!(skip_soft(soft, "test"), Ok(None)));

        let full: Result<()> = Err(WorldError::CapacityExceeded { parent: id("bio_1"), capacity: 2 });
        assert!(matches!(skip_soft(full, "test"), Ok(None)));

        let hard: Result<()> = Err(WorldError::EmptyLayout);
        assert!(skip_soft(hard, "test").is_err());
    }
}
