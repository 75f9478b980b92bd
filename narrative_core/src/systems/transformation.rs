//! Transformation - how places change after the fighting: ruins go wild,
//! wilds are resettled, new land is found and factions branch out.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use world_rules::{
    keys, Entity, EntityId, EntityType, NameContext, RelationKind, Result, TransformationRule,
    WorldError, WILD_RUINS_TARGET,
};

use super::{habitable_locations, has_faction_room, name_of, settled_factions, skip_soft, EpochContext};
use crate::events::{EventKind, EventRecord, EventSpec};
use crate::generator::{limits_to_value, spawn_location};

/// Template tags that make a location a discovery candidate.
const WILD_TAGS: [&str; 3] = ["hidden", "nature", "resource"];
/// Payload keys a branch faction does not inherit.
const SPATIAL_KEYS: [&str; 7] = [
    keys::SLOT_INDEX,
    keys::LOCAL_COORD,
    keys::ABS_COORD,
    keys::X,
    keys::Y,
    keys::LAST_MOVED_AT,
    keys::ABSORBED_BY,
];

/// Apply at most one matching transformation rule per location.
pub fn process_transformations<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let templates = ctx.templates;
    let mut events = Vec::new();

    for location in ctx.world.ids_of_type(EntityType::Location) {
        for rule in templates.transformations.all() {
            if !rule_applies(ctx, &location, rule) || !ctx.roll(rule.chance) {
                continue;
            }
            let applied = if rule.target_definition == WILD_RUINS_TARGET {
                Some(reclaim(ctx, &location, rule))
            } else {
                skip_soft(transform(ctx, &location, rule), "transformation")?
            };
            if let Some(event) = applied {
                events.push(event);
                break;
            }
        }
    }
    Ok(events)
}

/// Tag, faction presence and age gates of a rule. The chance roll is separate.
fn rule_applies<R: Rng>(ctx: &EpochContext<'_, R>, location: &EntityId, rule: &TransformationRule) -> bool {
    let Some(entity) = ctx.world.entity(location) else {
        return false;
    };
    if !entity.is_active() || !entity.has_tag(&rule.requires_tag) {
        return false;
    }
    let occupied = !ctx.world.resident_factions(location).is_empty();
    if occupied != rule.needs_faction {
        return false;
    }
    match rule.min_age_empty {
        Some(min_age) => {
            let since = entity
                .data_u32(keys::DESTROYED_IN_EPOCH)
                .unwrap_or(entity.created_at);
            ctx.epoch.saturating_sub(since) >= min_age
        }
        None => true,
    }
}

/// Nature takes the place back without changing what it is.
fn reclaim<R: Rng>(ctx: &mut EpochContext<'_, R>, location: &EntityId, rule: &TransformationRule) -> EventRecord {
    ctx.world
        .update_tags(location, &[keys::TAG_WILD], &[rule.requires_tag.as_str()]);
    if let Some(entity) = ctx.world.entity_mut(location) {
        entity.name = format!("Overgrown {}", entity.name);
    }

    let summary = if rule.narrative_text.is_empty() {
        format!("{} was swallowed by the wild", name_of(ctx.world, location))
    } else {
        format!("{}: {}", rule.narrative_text, name_of(ctx.world, location))
    };
    ctx.emit(EventSpec::new(EventKind::NatureReclaim, summary).primary(location))
}

/// Swap the location over to another archetype and rename it.
fn transform<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    location: &EntityId,
    rule: &TransformationRule,
) -> Result<EventRecord> {
    let templates = ctx.templates;
    let target = templates.locations.require(&rule.target_definition)?;
    let builder = ctx.world.resident_factions(location).into_iter().next();
    let base = ctx.namer.generate_name(
        EntityType::Location,
        &NameContext::new().with("base_name", target.name.clone()),
    );

    let Some(entity) = ctx.world.entity_mut(location) else {
        return Err(WorldError::EntityNotFound(location.clone()));
    };
    let old_name = entity.name.clone();
    let clean = old_name
        .trim_start_matches("Ruins of ")
        .trim_start_matches("Uncharted ");
    entity.definition_id = target.id.clone();
    entity.tags = target.tags.iter().cloned().collect();
    entity.add_tag(keys::TAG_TRANSFORMED);
    entity.capacity = Some(target.capacity);
    entity.set_data(keys::LIMITS, limits_to_value(&target.limits));
    entity.data.remove(keys::DESTROYED_IN_EPOCH);
    entity.name = format!("{base} (formerly {clean})");
    let new_name = entity.name.clone();

    debug!(location = %location, rule = %rule.id, "location transformed");
    let summary = if rule.narrative_text.is_empty() {
        format!("{old_name} became {new_name}")
    } else {
        format!("{}: {old_name} became {new_name}", rule.narrative_text)
    };
    let mut spec = EventSpec::new(EventKind::Transformation, summary).primary(location);
    if let Some(builder) = &builder {
        spec = spec.secondary(builder);
    }
    Ok(ctx.emit(spec))
}

/// Open up an uncharted location in biomes that still have room.
pub fn process_discovery<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let mut events = Vec::new();
    for biome in ctx.world.ids_of_type(EntityType::Biome) {
        if !ctx.roll(ctx.config.discovery_chance) {
            continue;
        }
        if let Some(event) = skip_soft(discover(ctx, &biome), "discovery")?.flatten() {
            events.push(event);
        }
    }
    Ok(events)
}

fn discover<R: Rng>(ctx: &mut EpochContext<'_, R>, biome: &EntityId) -> Result<Option<EventRecord>> {
    let templates = ctx.templates;
    ctx.world.ensure_room(biome, EntityType::Location, None)?;
    let Some(entity) = ctx.world.entity(biome) else {
        return Ok(None);
    };
    let Some(biome_template) = templates.biomes.get(&entity.definition_id) else {
        return Ok(None);
    };

    let allowed: Vec<_> = biome_template
        .allowed_locations
        .iter()
        .filter_map(|id| templates.locations.get(id))
        .collect();
    let wild: Vec<_> = allowed
        .iter()
        .copied()
        .filter(|t| t.tags.iter().any(|tag| WILD_TAGS.contains(&tag.as_str())))
        .collect();
    let pool = if wild.is_empty() { &allowed } else { &wild };
    let Some(template) = pool.choose(ctx.rng).copied() else {
        return Ok(None);
    };

    let found = spawn_location(ctx.world, ctx.namer, biome, template, ctx.epoch, ctx.rng);
    ctx.world
        .update_tags(&found, &[keys::TAG_WILD, keys::TAG_DISCOVERED], &[]);
    if template.tags.iter().any(|t| t == "hidden") {
        if let Some(place) = ctx.world.entity_mut(&found) {
            place.name = format!("Uncharted {}", place.name);
        }
    }

    let summary = format!(
        "New land found in {}: {}",
        name_of(ctx.world, biome),
        name_of(ctx.world, &found)
    );
    Ok(Some(ctx.emit(
        EventSpec::new(EventKind::Discovery, summary)
            .primary(&found)
            .secondary(biome),
    )))
}

/// Factions found branches in nearby locations with room for them.
pub fn process_expansions<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let mut events = Vec::new();
    for faction in settled_factions(ctx.world) {
        if !ctx.roll(ctx.config.expansion_chance) {
            continue;
        }
        if let Some(event) = skip_soft(expand(ctx, &faction), "expansion")?.flatten() {
            events.push(event);
        }
    }
    Ok(events)
}

fn expand<R: Rng>(ctx: &mut EpochContext<'_, R>, faction: &EntityId) -> Result<Option<EventRecord>> {
    let Some(home) = ctx.world.location_of(faction) else {
        return Ok(None);
    };
    let Some(biome) = ctx.world.biome_of(&home) else {
        return Ok(None);
    };
    let targets: Vec<EntityId> = habitable_locations(ctx.world, &biome)
        .into_iter()
        .filter(|l| *l != home && has_faction_room(ctx.world, l))
        .collect();
    let Some(target) = targets.choose(ctx.rng).cloned() else {
        return Ok(None);
    };
    let Some(origin) = ctx.world.entity(faction).cloned() else {
        return Ok(None);
    };

    let context = NameContext::new()
        .with("role", origin.data_str(keys::ROLE).unwrap_or("default"))
        .with("group_noun", "Branch");
    let name = ctx.namer.generate_name(EntityType::Faction, &context);
    let mut branch = Entity::new(
        EntityId::generate(EntityType::Faction.id_prefix(), ctx.rng),
        EntityType::Faction,
        &origin.definition_id,
        name,
    )
    .with_parent(target.clone())
    .with_tags(origin.tags.iter().cloned())
    .created_at(ctx.epoch);
    branch.tags.remove(keys::TAG_ALLIED);
    branch.data = origin
        .data
        .iter()
        .filter(|(key, _)| !SPATIAL_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let branch = ctx.world.add_entity(branch);
    ctx.world.assign_slot(&branch, ctx.rng);
    ctx.world
        .add_relation(&branch, &target, &RelationKind::FactionLocatedIn)?;
    ctx.world
        .add_relation(faction, &target, &RelationKind::ExpandedTo)?;
    ctx.world
        .add_relation(&branch, faction, &RelationKind::SplinteredFrom)?;
    if let Some(belief) = ctx.world.belief_of(faction) {
        ctx.world
            .add_relation(&branch, &belief, &RelationKind::BelievesIn)?;
    }

    let summary = format!(
        "{} opened a branch in {}",
        origin.name,
        name_of(ctx.world, &target)
    );
    Ok(Some(ctx.emit(
        EventSpec::new(EventKind::Expansion, summary)
            .primary(faction)
            .secondary(&target)
            .secondary(&branch),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_faction, id, two_biome_graph, Harness};
    use world_rules::CultureVector;

    fn ruins_at(harness: &mut Harness, location: &str, destroyed: u32) {
        harness
            .world
            .update_tags(&id(location), &[keys::TAG_RUINS], &["settlement"]);
        let entity = harness.world.entity_mut(&id(location)).unwrap();
        entity.name = format!("Ruins of {}", entity.name);
        entity.set_data(keys::DESTROYED_IN_EPOCH, destroyed);
    }

    #[test]
    fn test_ruins_wait_before_going_wild() {
        let mut harness = Harness::new(two_biome_graph(), 41);
        ruins_at(&mut harness, "loc_1", 10);

        assert!(process_transformations(&mut harness.ctx(14)).unwrap().is_empty());
        let events = process_transformations(&mut harness.ctx(15)).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::NatureReclaim);
        let wild = harness.world.entity(&id("loc_1")).unwrap();
        assert!(wild.has_tag(keys::TAG_WILD) && !wild.has_tag(keys::TAG_RUINS));
        assert!(wild.name.starts_with("Overgrown Ruins of "));
    }

    #[test]
    fn test_one_transformation_per_location_per_epoch() {
        let mut graph = two_biome_graph();
        add_faction(&mut graph, "fac_a", "loc_1", CultureVector::default());
        let mut harness = Harness::new(graph, 42);
        harness.world.update_tags(&id("loc_1"), &[keys::TAG_WILD], &[]);

        let events = process_transformations(&mut harness.ctx(3)).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Transformation);
        assert!(events[0].summary.starts_with("Settlers raise walls"));
        assert_eq!(events[0].participants, vec![id("loc_1"), id("fac_a")]);
        let settled = harness.world.entity(&id("loc_1")).unwrap();
        assert_eq!(settled.definition_id, "loc_hamlet");
        assert!(settled.has_tag(keys::TAG_TRANSFORMED) && !settled.has_tag(keys::TAG_WILD));
        assert!(settled.name.ends_with("(formerly loc_1)"));
    }

    #[test]
    fn test_empty_wilds_stay_wild() {
        let mut harness = Harness::new(two_biome_graph(), 43);
        harness.world.update_tags(&id("loc_2"), &[keys::TAG_WILD], &[]);

        assert!(process_transformations(&mut harness.ctx(3)).unwrap().is_empty());
    }

    #[test]
    fn test_discovery_prefers_wild_archetypes() {
        let mut harness = Harness::new(two_biome_graph(), 44);
        harness.config.discovery_chance = 1.0;

        let events = process_discovery(&mut harness.ctx(5)).unwrap();

        // Both biomes have room; only the plains allow the hidden grove.
        assert_eq!(events.len(), 2);
        let grove = harness.world.entity(&events[0].participants[0]).unwrap();
        assert_eq!(grove.parent_id, Some(id("bio_1")));
        assert_eq!(grove.definition_id, "loc_grove");
        assert!(grove.name.starts_with("Uncharted "));
        assert!(grove.has_tag(keys::TAG_WILD) && grove.has_tag(keys::TAG_DISCOVERED));

        let hamlet = harness.world.entity(&events[1].participants[0]).unwrap();
        assert_eq!(hamlet.definition_id, "loc_hamlet");
        assert!(!hamlet.name.starts_with("Uncharted "));
    }

    #[test]
    fn test_full_biome_is_not_extended() {
        let mut harness = Harness::new(two_biome_graph(), 45);
        harness.config.discovery_chance = 1.0;
        harness.world.entity_mut(&id("bio_1")).unwrap().capacity = Some(2);
        harness.world.entity_mut(&id("bio_2")).unwrap().capacity = Some(1);

        assert!(process_discovery(&mut harness.ctx(5)).unwrap().is_empty());
        let full = discover(&mut harness.ctx(6), &id("bio_2"));
        assert!(matches!(full, Err(WorldError::CapacityExceeded { capacity: 1, .. })));
    }

    #[test]
    fn test_expansion_founds_linked_branch() {
        let mut graph = two_biome_graph();
        let origin = add_faction(&mut graph, "fac_a", "loc_1", CultureVector::new(4, 0, 0));
        graph.add_entity(Entity::new(id("bel_x"), EntityType::Belief, "bel_sun", "Sun"));
        graph
            .add_relation(&origin, &id("bel_x"), &RelationKind::BelievesIn)
            .unwrap();
        let mut harness = Harness::new(graph, 46);
        harness.config.expansion_chance = 1.0;

        let events = process_expansions(&mut harness.ctx(2)).unwrap();

        assert_eq!(events.len(), 1);
        let branch = events[0].participants[2].clone();
        let entity = harness.world.entity(&branch).unwrap();
        assert_eq!(entity.parent_id, Some(id("loc_2")));
        assert_eq!(entity.culture(), CultureVector::new(4, 0, 0));
        assert!(harness.world.has_relation(&origin, &id("loc_2"), &RelationKind::ExpandedTo));
        assert!(harness.world.has_relation(&branch, &origin, &RelationKind::SplinteredFrom));
        assert_eq!(harness.world.belief_of(&branch), Some(id("bel_x")));
    }
}
