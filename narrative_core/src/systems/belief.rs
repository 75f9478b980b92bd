//! Belief - founding of religions and their spread between neighbors.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use world_rules::{
    keys, BeliefTemplate, Entity, EntityId, EntityType, NameContext, RelationKind, Result,
};

use super::{is_settled_faction, name_of, settled_factions, EpochContext};
use crate::events::{EventKind, EventRecord, EventSpec};

/// A world wants at least this many religions.
pub const MIN_BELIEFS: usize = 2;
/// Variation name used when a belief archetype has none.
const ORTHODOX: &str = "Orthodox";
/// Pressure of one believing neighbor.
const NEIGHBOR_PRESSURE: f64 = 1.0;
/// Extra pressure of an allied neighbor.
const ALLIED_PRESSURE: f64 = 0.5;

/// Found religions while fewer than [`MIN_BELIEFS`] exist, then let faith spread.
pub fn process_beliefs<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let mut events = Vec::new();
    let existing = ctx.world.ids_of_type(EntityType::Belief).len();
    if existing < MIN_BELIEFS {
        events.extend(genesis(ctx, MIN_BELIEFS - existing)?);
    }
    events.extend(spread(ctx)?);
    Ok(events)
}

/// Prophet factions without a belief each found one.
fn genesis<R: Rng>(ctx: &mut EpochContext<'_, R>, wanted: usize) -> Result<Vec<EventRecord>> {
    let candidates: Vec<EntityId> = settled_factions(ctx.world)
        .into_iter()
        .filter(|f| ctx.world.belief_of(f).is_none())
        .collect();
    let prophets: Vec<EntityId> = candidates
        .choose_multiple(ctx.rng, wanted.min(candidates.len()))
        .cloned()
        .collect();

    let mut events = Vec::new();
    for prophet in prophets {
        let Some(template) = pick_archetype(ctx, &prophet) else {
            warn!(faction = %prophet, "no belief archetypes registered");
            break;
        };
        events.push(found_belief(ctx, &prophet, template)?);
    }
    Ok(events)
}

/// The faction's default belief if registered, else one preferring its role, else any.
fn pick_archetype<'t, R: Rng>(
    ctx: &mut EpochContext<'t, R>,
    faction: &EntityId,
) -> Option<&'t BeliefTemplate> {
    let templates = ctx.templates;
    let entity = ctx.world.entity(faction)?;

    let default_belief = entity
        .data_str(keys::DEFAULT_BELIEF)
        .or_else(|| {
            templates
                .factions
                .get(&entity.definition_id)
                .and_then(|t| t.default_belief.as_deref())
        })
        .and_then(|id| templates.beliefs.get(id));
    if default_belief.is_some() {
        return default_belief;
    }

    let role = entity.data_str(keys::ROLE).unwrap_or("default").to_string();
    let preferred: Vec<&BeliefTemplate> = templates
        .beliefs
        .all()
        .filter(|t| t.preferred_roles.iter().any(|r| *r == role))
        .collect();
    if let Some(template) = preferred.choose(ctx.rng) {
        return Some(*template);
    }
    let all: Vec<&BeliefTemplate> = templates.beliefs.all().collect();
    all.choose(ctx.rng).copied()
}

fn found_belief<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    prophet: &EntityId,
    template: &BeliefTemplate,
) -> Result<EventRecord> {
    let (modifiers, variation) = match template.variations.choose(ctx.rng) {
        Some(variation) => (
            template.base_modifiers.add(&variation.modifiers),
            variation.name.clone(),
        ),
        None => (template.base_modifiers.clone(), ORTHODOX.to_string()),
    };

    let deity = ctx
        .namer
        .generate_name(EntityType::Character, &NameContext::new().with("style", "spirit"));
    let context = NameContext::new()
        .with("base_name", template.name.clone())
        .with("style", template.naming_style.clone())
        .with("deity", deity.clone());
    let name = ctx.namer.generate_name(EntityType::Belief, &context);

    let belief = ctx.world.add_entity(
        Entity::new(
            EntityId::generate(EntityType::Belief.id_prefix(), ctx.rng),
            EntityType::Belief,
            &template.id,
            name.clone(),
        )
        .created_at(ctx.epoch)
        .with_data(keys::MODIFIERS, modifiers.to_value())
        .with_data(keys::ORIGIN_FACTION_ID, prophet.as_str())
        .with_data(keys::NAMING_STYLE, template.naming_style.clone())
        .with_data(keys::DEITY_NAME, deity)
        .with_data(keys::VARIATION, variation.clone()),
    );
    ctx.world
        .add_relation(prophet, &belief, &RelationKind::BelievesIn)?;

    let summary = format!(
        "{} founds the cult {name} ({}, {variation})",
        name_of(ctx.world, prophet),
        template.name
    );
    let mut spec = EventSpec::new(EventKind::ReligionFounded, summary)
        .primary(&belief)
        .secondary(prophet);
    if let Some(location) = ctx.world.location_of(prophet) {
        spec = spec.location(&location);
    }
    Ok(ctx.emit(spec))
}

/// Factions that pass their resistance roll weigh the beliefs of their
/// neighbors and convert to the strongest one once pressure is high enough.
fn spread<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let mut factions = settled_factions(ctx.world);
    factions.shuffle(ctx.rng);

    let mut events = Vec::new();
    for faction in factions {
        let current = ctx.world.belief_of(&faction);
        let resistance = if current.is_some() {
            ctx.config.believer_resistance
        } else {
            ctx.config.unbeliever_resistance
        };
        if ctx.roll(resistance) {
            continue;
        }

        let pressure = belief_pressure(ctx, &faction);
        let total: f64 = pressure.values().sum();
        if total <= ctx.config.conversion_pressure_threshold {
            continue;
        }
        let Some(strongest) = strongest(&pressure) else {
            continue;
        };
        if current.as_ref() == Some(&strongest) {
            continue;
        }

        let faction_name = name_of(ctx.world, &faction);
        let belief_name = name_of(ctx.world, &strongest);
        let spec = match &current {
            Some(old) => {
                ctx.world.remove_outgoing(&faction, &RelationKind::BelievesIn);
                ctx.world
                    .add_relation(&faction, &strongest, &RelationKind::BelievesIn)?;
                EventSpec::new(
                    EventKind::ReligionConversion,
                    format!(
                        "{faction_name} renounces {} and embraces {belief_name}",
                        name_of(ctx.world, old)
                    ),
                )
            }
            None => {
                ctx.world
                    .add_relation(&faction, &strongest, &RelationKind::BelievesIn)?;
                EventSpec::new(
                    EventKind::ReligionAdopted,
                    format!("{faction_name} adopts the faith of {belief_name}"),
                )
            }
        };
        debug!(faction = %faction, belief = %strongest, total, "belief spread");
        events.push(ctx.emit(spec.primary(&faction).secondary(&strongest)));
    }
    Ok(events)
}

/// Pressure per belief from co-located and same-biome factions.
fn belief_pressure<R: Rng>(ctx: &EpochContext<'_, R>, faction: &EntityId) -> BTreeMap<EntityId, f64> {
    let world = &*ctx.world;
    let mut pressure = BTreeMap::new();
    let Some(location) = world.location_of(faction) else {
        return pressure;
    };

    let mut locations = vec![location.clone()];
    if let Some(biome) = world.biome_of(&location) {
        locations.extend(
            world
                .children(&biome, Some(EntityType::Location))
                .into_iter()
                .filter(|l| *l != location),
        );
    }

    for neighbor in locations
        .iter()
        .flat_map(|l| world.children(l, Some(EntityType::Faction)))
    {
        if neighbor == *faction {
            continue;
        }
        let Some(entity) = world.entity(&neighbor).filter(|e| is_settled_faction(e)) else {
            continue;
        };
        let Some(belief) = world.belief_of(&neighbor) else {
            continue;
        };
        let weight = if entity.has_tag(keys::TAG_ALLIED) {
            NEIGHBOR_PRESSURE + ALLIED_PRESSURE
        } else {
            NEIGHBOR_PRESSURE
        };
        *pressure.entry(belief).or_insert(0.0) += weight;
    }
    pressure
}

/// Highest-pressure belief; ties go to the lowest id.
fn strongest(pressure: &BTreeMap<EntityId, f64>) -> Option<EntityId> {
    let mut best: Option<(&EntityId, f64)> = None;
    for (id, value) in pressure {
        if best.map_or(true, |(_, b)| *value > b) {
            best = Some((id, *value));
        }
    }
    best.map(|(id, _)| id.clone())
}
