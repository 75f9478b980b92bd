//! Lifecycle - births, deaths and exhaustion of leaders, resources and crowded settlements.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use world_rules::{keys, EntityId, EntityType, RelationKind, Result};

use super::{name_of, skip_soft, EpochContext, DEFAULT_FACTION_LIMIT};
use crate::events::{EventKind, EventRecord, EventSpec};
use crate::generator::{spawn_resource, DEFAULT_RESOURCE_LIMIT};

/// Chance a conquered leader is put to death.
const EXECUTION_CHANCE: f64 = 0.3;
/// Upper bound of the exile roll; anything above is recruited.
const EXILE_CHANCE: f64 = 0.7;

/// What happened to a leader whose faction was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderFate {
    Execution,
    Exile,
    Recruitment,
}

impl LeaderFate {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderFate::Execution => "execution",
            LeaderFate::Exile => "exile",
            LeaderFate::Recruitment => "recruitment",
        }
    }
}

/// Living characters with a `leads` edge may die of old age or misfortune.
pub fn process_leader_decay<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let leaders: Vec<EntityId> = ctx
        .world
        .graph()
        .entities_of_type(EntityType::Character)
        .filter(|c| c.is_alive())
        .map(|c| c.id.clone())
        .filter(|c| !ctx.world.targets(c, &RelationKind::Leads).is_empty())
        .collect();

    let mut events = Vec::new();
    for leader in leaders {
        if !ctx.roll(ctx.config.leader_death_chance) {
            continue;
        }
        let faction = ctx.world.targets(&leader, &RelationKind::Leads).into_iter().next();
        ctx.world.update_tags(&leader, &[keys::TAG_DEAD, keys::TAG_INACTIVE], &[]);
        ctx.world.remove_outgoing(&leader, &RelationKind::Leads);

        let mut spec = EventSpec::new(
            EventKind::LeaderDeath,
            format!("{} has died", name_of(ctx.world, &leader)),
        )
        .primary(&leader);
        if let Some(faction) = &faction {
            spec = spec.secondary(faction);
        }
        events.push(ctx.emit(spec));
    }
    Ok(events)
}

/// Active resources may run dry. Non-renewable ones are gone for good.
pub fn process_resource_decay<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let candidates: Vec<EntityId> = ctx
        .world
        .graph()
        .entities_of_type(EntityType::Resource)
        .filter(|r| r.is_active() && !r.has_tag(keys::TAG_DEPLETED))
        .map(|r| r.id.clone())
        .collect();

    let mut events = Vec::new();
    for resource in candidates {
        if !ctx.roll(ctx.config.resource_depletion_chance) {
            continue;
        }
        let renewable = is_renewable(ctx, &resource);
        if renewable {
            ctx.world.update_tags(&resource, &[keys::TAG_DEPLETED], &[]);
        } else {
            ctx.world
                .update_tags(&resource, &[keys::TAG_DEPLETED, keys::TAG_INACTIVE], &[]);
        }

        let mut spec = EventSpec::new(
            EventKind::ResourceDepleted,
            format!("{} is exhausted", name_of(ctx.world, &resource)),
        )
        .primary(&resource);
        if let Some(location) = ctx.world.location_of(&resource) {
            spec = spec.secondary(&location);
        }
        events.push(ctx.emit(spec));
    }
    Ok(events)
}

/// Renewability from the payload, falling back to the archetype.
fn is_renewable<R: Rng>(ctx: &EpochContext<'_, R>, resource: &EntityId) -> bool {
    let Some(entity) = ctx.world.entity(resource) else {
        return false;
    };
    match entity.data.get(keys::RENEWABLE).and_then(|v| v.as_bool()) {
        Some(renewable) => renewable,
        None => ctx
            .templates
            .resources
            .get(&entity.definition_id)
            .map_or(false, |t| t.renewable),
    }
}

/// Depleted resources that are still active may recover.
pub fn process_resource_regrowth<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let depleted: Vec<EntityId> = ctx
        .world
        .graph()
        .entities_of_type(EntityType::Resource)
        .filter(|r| r.is_active() && r.has_tag(keys::TAG_DEPLETED))
        .map(|r| r.id.clone())
        .collect();

    let mut events = Vec::new();
    for resource in depleted {
        if !ctx.roll(ctx.config.resource_regrowth_chance) {
            continue;
        }
        ctx.world.update_tags(&resource, &[], &[keys::TAG_DEPLETED]);

        let mut spec = EventSpec::new(
            EventKind::ResourceRegrowth,
            format!("{} has recovered", name_of(ctx.world, &resource)),
        )
        .primary(&resource);
        if let Some(location) = ctx.world.location_of(&resource) {
            spec = spec.secondary(&location);
        }
        events.push(ctx.emit(spec));
    }
    Ok(events)
}

/// New deposits appear in locations with spare resource slots.
pub fn process_new_resources<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let mut events = Vec::new();
    for location in ctx.world.ids_of_type(EntityType::Location) {
        if !ctx.world.entity(&location).map_or(false, |l| l.is_active()) {
            continue;
        }
        if !ctx.roll(ctx.config.new_resource_chance) {
            continue;
        }
        if let Some(event) = skip_soft(discover_resource(ctx, &location), "new_resource")?.flatten() {
            events.push(event);
        }
    }
    Ok(events)
}

fn discover_resource<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    location: &EntityId,
) -> Result<Option<EventRecord>> {
    ctx.world
        .ensure_room(location, EntityType::Resource, Some(DEFAULT_RESOURCE_LIMIT))?;

    let Some(biome) = ctx.world.biome_of(location) else {
        return Ok(None);
    };
    let definition = ctx
        .world
        .entity(&biome)
        .map(|b| b.definition_id.clone())
        .unwrap_or_default();
    let templates = ctx.templates;
    let pool = &templates.biomes.require(&definition)?.available_resources;
    let Some(choice) = pool.choose(ctx.rng) else {
        return Ok(None);
    };

    let Some(resource) = spawn_resource(
        ctx.world,
        templates,
        ctx.namer,
        location,
        choice,
        ctx.epoch,
        ctx.rng,
    ) else {
        return Ok(None);
    };
    ctx.world
        .add_relation(&resource, location, &RelationKind::LocatedIn)?;

    let summary = format!(
        "A new resource was found in {}: {}",
        name_of(ctx.world, location),
        name_of(ctx.world, &resource)
    );
    Ok(Some(ctx.emit(
        EventSpec::new(EventKind::ResourceDiscovered, summary)
            .primary(&resource)
            .secondary(location),
    )))
}

/// Tag locations whose resident factions exceed the Faction limit and let
/// famine thin them out. The tag clears once the location is back under its limit.
pub fn process_overcrowding<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let mut events = Vec::new();
    for location in ctx.world.ids_of_type(EntityType::Location) {
        let limit = ctx
            .world
            .limit(&location, EntityType::Faction)
            .unwrap_or(DEFAULT_FACTION_LIMIT);
        let residents: Vec<EntityId> = ctx
            .world
            .resident_factions(&location)
            .into_iter()
            .filter(|f| ctx.world.entity(f).map_or(false, |e| !e.has_tag(keys::TAG_BOSS)))
            .collect();

        if residents.len() as u32 <= limit {
            ctx.world.update_tags(&location, &[], &[keys::TAG_OVERCROWDED]);
            continue;
        }

        ctx.world.update_tags(&location, &[keys::TAG_OVERCROWDED], &[]);
        debug!(location = %location, residents = residents.len(), limit, "location overcrowded");
        if !ctx.roll(ctx.config.famine_chance) {
            continue;
        }
        let Some(victim) = residents.choose(ctx.rng).cloned() else {
            continue;
        };
        ctx.world.update_tags(
            &victim,
            &[keys::TAG_DEAD, keys::TAG_STARVED, keys::TAG_INACTIVE],
            &[],
        );

        let summary = format!(
            "{} starved in overcrowded {}",
            name_of(ctx.world, &victim),
            name_of(ctx.world, &location)
        );
        events.push(ctx.emit(
            EventSpec::new(EventKind::Famine, summary)
                .primary(&location)
                .secondary(&victim),
        ));
    }
    Ok(events)
}

/// Decide what becomes of the living leaders of an absorbed faction.
///
/// Executed leaders die, exiles leave play, recruits move under the winner
/// with a `joined` edge. Every fate is recorded as a `leader_fate` event.
pub fn conquered_leader_fates<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    loser: &EntityId,
    winner: &EntityId,
) -> Result<Vec<EventRecord>> {
    let leaders: Vec<EntityId> = ctx
        .world
        .children(loser, Some(EntityType::Character))
        .into_iter()
        .filter(|c| ctx.world.entity(c).map_or(false, |e| e.is_alive()))
        .collect();

    let mut events = Vec::new();
    for leader in leaders {
        let roll: f64 = ctx.rng.gen();
        let fate = if roll < EXECUTION_CHANCE {
            LeaderFate::Execution
        } else if roll < EXILE_CHANCE {
            LeaderFate::Exile
        } else {
            LeaderFate::Recruitment
        };

        ctx.world.remove_outgoing(&leader, &RelationKind::Leads);
        let name = name_of(ctx.world, &leader);
        let winner_name = name_of(ctx.world, winner);
        let summary = match fate {
            LeaderFate::Execution => {
                ctx.world
                    .update_tags(&leader, &[keys::TAG_DEAD, keys::TAG_INACTIVE], &[]);
                format!("{name} was executed by {winner_name}")
            }
            LeaderFate::Exile => {
                ctx.world
                    .update_tags(&leader, &[keys::TAG_EXILED, keys::TAG_INACTIVE], &[]);
                format!("{name} fled into exile")
            }
            LeaderFate::Recruitment => {
                if let Some(entity) = ctx.world.entity_mut(&leader) {
                    entity.parent_id = Some(winner.clone());
                    entity.set_data(keys::FACTION_ID, winner.as_str());
                }
                ctx.world.add_relation(&leader, winner, &RelationKind::Joined)?;
                format!("{name} bent the knee to {winner_name}")
            }
        };
        debug!(leader = %leader, fate = fate.as_str(), "conquered leader");

        // The event is located at the winner's home.
        let mut spec = EventSpec::new(EventKind::LeaderFate, summary)
            .primary(&leader)
            .secondary(winner)
            .data("fate", fate.as_str());
        if let Some(location) = ctx.world.location_of(winner) {
            spec = spec.location(&location);
        }
        events.push(ctx.emit(spec));
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_faction, id, two_biome_graph, Harness};
    use world_rules::{CultureVector, Entity, WorldError};

    fn with_leader(harness: &mut Harness, raw: &str, faction: &str) {
        harness.world.add_entity(
            Entity::new(id(raw), EntityType::Character, "char_leader", raw).with_parent(id(faction)),
        );
        harness
            .world
            .add_relation(&id(raw), &id(faction), &RelationKind::Leads)
            .unwrap();
    }

    #[test]
    fn test_leader_death_strips_leads() {
        let mut graph = two_biome_graph();
        add_faction(&mut graph, "fac_a", "loc_1", CultureVector::default());
        let mut harness = Harness::new(graph, 3);
        with_leader(&mut harness, "chr_a", "fac_a");
        harness.config.leader_death_chance = 1.0;

        let events = process_leader_decay(&mut harness.ctx(1)).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::LeaderDeath);
        assert_eq!(events[0].participants, vec![id("chr_a"), id("fac_a")]);
        let leader = harness.world.entity(&id("chr_a")).unwrap();
        assert!(!leader.is_alive());
        assert!(harness.world.leader_of(&id("fac_a")).is_none());
    }

    #[test]
    fn test_non_renewable_resource_goes_inactive() {
        let mut graph = two_biome_graph();
        graph.add_entity(
            Entity::new(id("res_iron"), EntityType::Resource, "res_iron", "Iron").with_parent(id("loc_1")),
        );
        graph.add_entity(
            Entity::new(id("res_grain"), EntityType::Resource, "res_grain", "Grain")
                .with_parent(id("loc_1"))
                .with_data(keys::RENEWABLE, true),
        );
        let mut harness = Harness::new(graph, 4);
        harness.config.resource_depletion_chance = 1.0;

        let events = process_resource_decay(&mut harness.ctx(1)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].location_id, Some(id("loc_1")));

        let iron = harness.world.entity(&id("res_iron")).unwrap();
        assert!(iron.has_tag(keys::TAG_DEPLETED) && !iron.is_active());
        let grain = harness.world.entity(&id("res_grain")).unwrap();
        assert!(grain.has_tag(keys::TAG_DEPLETED) && grain.is_active());

        harness.config.resource_regrowth_chance = 1.0;
        let regrown = process_resource_regrowth(&mut harness.ctx(2)).unwrap();
        assert_eq!(regrown.len(), 1);
        assert!(!harness.world.entity(&id("res_grain")).unwrap().has_tag(keys::TAG_DEPLETED));
    }

    #[test]
    fn test_new_resources_respect_limit() {
        let mut harness = Harness::new(two_biome_graph(), 5);
        harness.config.new_resource_chance = 1.0;

        let events = process_new_resources(&mut harness.ctx(5)).unwrap();
        assert_eq!(events.len(), 3);
        for event in &events {
            assert_eq!(event.kind, EventKind::ResourceDiscovered);
            let resource = &event.participants[0];
            let location = event.location_id.clone().unwrap();
            assert!(harness.world.has_relation(resource, &location, &RelationKind::LocatedIn));
        }

        // Every location is now at its Resource limit of 1.
        assert!(process_new_resources(&mut harness.ctx(10)).unwrap().is_empty());
        let full = discover_resource(&mut harness.ctx(11), &id("loc_1"));
        assert!(matches!(full, Err(WorldError::CapacityExceeded { capacity: 1, .. })));
    }

    #[test]
    fn test_overcrowding_tags_then_clears() {
        let mut graph = two_biome_graph();
        graph
            .entity_mut(&id("loc_1"))
            .unwrap()
            .set_data(keys::LIMITS, serde_json::json!({ "Faction": 2 }));
        for raw in ["fac_a", "fac_b", "fac_c"] {
            add_faction(&mut graph, raw, "loc_1", CultureVector::default());
        }
        let mut harness = Harness::new(graph, 6);
        harness.config.famine_chance = 0.0;

        assert!(process_overcrowding(&mut harness.ctx(1)).unwrap().is_empty());
        assert!(harness.world.entity(&id("loc_1")).unwrap().has_tag(keys::TAG_OVERCROWDED));

        harness.world.update_tags(&id("fac_c"), &[keys::TAG_DEAD, keys::TAG_INACTIVE], &[]);
        process_overcrowding(&mut harness.ctx(2)).unwrap();
        assert!(!harness.world.entity(&id("loc_1")).unwrap().has_tag(keys::TAG_OVERCROWDED));
    }

    #[test]
    fn test_famine_kills_one_resident() {
        let mut graph = two_biome_graph();
        for raw in ["fac_a", "fac_b"] {
            add_faction(&mut graph, raw, "loc_1", CultureVector::default());
        }
        let mut harness = Harness::new(graph, 7);
        harness.config.famine_chance = 1.0;

        let events = process_overcrowding(&mut harness.ctx(1)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Famine);
        let victim = &events[0].participants[1];
        let victim = harness.world.entity(victim).unwrap();
        assert!(victim.has_tag(keys::TAG_STARVED) && !victim.is_alive());
        assert_eq!(harness.world.resident_factions(&id("loc_1")).len(), 1);
    }

    #[test]
    fn test_conquered_leaders_each_get_a_fate() {
        let mut graph = two_biome_graph();
        add_faction(&mut graph, "fac_a", "loc_1", CultureVector::default());
        add_faction(&mut graph, "fac_b", "loc_1", CultureVector::default());
        let mut harness = Harness::new(graph, 8);
        with_leader(&mut harness, "chr_b", "fac_b");

        let events = conquered_leader_fates(&mut harness.ctx(3), &id("fac_b"), &id("fac_a")).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::LeaderFate);
        assert_eq!(events[0].location_id, Some(id("loc_1")));
        assert!(harness.world.leader_of(&id("fac_b")).is_none());

        let leader = harness.world.entity(&id("chr_b")).unwrap();
        let recruited = harness.world.has_relation(&id("chr_b"), &id("fac_a"), &RelationKind::Joined);
        assert!(recruited || !leader.is_alive());
        assert_eq!(recruited, leader.parent_id == Some(id("fac_a")));
    }
}
