//! Conflict - spawning and resolving wars, feuds, raids and monster attacks.
//!
//! A Conflict entity moves `active -> resolved` or `active -> aborted`. The
//! spawn paths run in a fixed order each epoch: religious war, civil war,
//! political conflict, then raids and bosses as separate pipeline steps.

mod resolve;

pub use resolve::*;

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::debug;
use world_rules::{
    ids_to_value, keys, ConflictStatus, CultureVector, DisputeReason, Entity, EntityId,
    EntityType, NameContext, RelationKind, Result,
};

use super::{name_of, skip_soft, EpochContext};
use crate::config::SimulationConfig;
use crate::events::{EventKind, EventRecord, EventSpec};
use crate::query::WorldQueryService;

/// Definition id of religious GlobalConflicts.
pub const GLOBAL_WAR_DEFINITION: &str = "global_religious_war";
/// Lower and upper clamp of the culture part of tension.
const TENSION_FLOOR: f64 = 0.1;
const TENSION_CEIL: f64 = 5.0;
/// Belief modifiers of tension.
const SAME_BELIEF: f64 = 0.5;
const OTHER_BELIEF: f64 = 1.2;
/// Tags that make a dispute about power.
const POWER_TAGS: [&str; 2] = ["power", "imperial"];

/// Religious war, civil war and political conflict spawns, in that order.
pub fn process_conflict_spawn<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let mut events = spawn_religious_war(ctx)?;
    events.extend(spawn_civil_wars(ctx)?);
    events.extend(spawn_political_conflicts(ctx)?);
    Ok(events)
}

/// Whether an entity's payload carries `status = active`.
pub(crate) fn is_active_conflict(entity: &Entity) -> bool {
    entity
        .data_str(keys::STATUS)
        .and_then(ConflictStatus::parse)
        == Some(ConflictStatus::Active)
}

fn active_global_wars(world: &WorldQueryService) -> Vec<EntityId> {
    world
        .graph()
        .entities_of_type(EntityType::GlobalConflict)
        .filter(|w| is_active_conflict(w))
        .map(|w| w.id.clone())
        .collect()
}

/// Start a holy war between two beliefs. Only one may be active at a time.
pub fn spawn_religious_war<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    if !ctx.roll(ctx.config.religious_war_chance) {
        return Ok(Vec::new());
    }
    let beliefs = ctx.world.ids_of_type(EntityType::Belief);
    if beliefs.len() < 2 || !active_global_wars(ctx.world).is_empty() {
        return Ok(Vec::new());
    }

    let Some(attacker) = beliefs.choose(ctx.rng).cloned() else {
        return Ok(Vec::new());
    };
    let others: Vec<&EntityId> = beliefs.iter().filter(|b| **b != attacker).collect();
    let Some(defender) = others.choose(ctx.rng).map(|b| (*b).clone()) else {
        return Ok(Vec::new());
    };

    let name = format!(
        "Holy War: {} against {}",
        name_of(ctx.world, &attacker),
        name_of(ctx.world, &defender)
    );
    let war = ctx.world.add_entity(
        Entity::new(
            EntityId::generate(EntityType::GlobalConflict.id_prefix(), ctx.rng),
            EntityType::GlobalConflict,
            GLOBAL_WAR_DEFINITION,
            name,
        )
        .created_at(ctx.epoch)
        .with_data(keys::STATUS, ConflictStatus::Active.as_str())
        .with_data(keys::WAR_KIND, "religious")
        .with_data(keys::INITIATOR_BELIEF, attacker.as_str())
        .with_data(keys::TARGET_BELIEF, defender.as_str())
        .with_data(keys::PARTICIPANTS, ids_to_value([&attacker, &defender]))
        .with_data(keys::EPOCH_STARTED, ctx.epoch),
    );

    ctx.world.add_relation(&attacker, &war, &RelationKind::BeliefAtWar)?;
    ctx.world.add_relation(&defender, &war, &RelationKind::BeliefAtWar)?;
    ctx.world
        .add_relation(&attacker, &defender, &RelationKind::OpposesBelief)?;
    for belief in [&attacker, &defender] {
        for faction in ctx.world.factions_by_belief(belief) {
            ctx.world
                .add_relation(&faction, &war, &RelationKind::ActiveParticipant)?;
        }
    }

    let summary = format!(
        "HOLY WAR! The followers of {} march against {}",
        name_of(ctx.world, &attacker),
        name_of(ctx.world, &defender)
    );
    Ok(vec![ctx.emit(
        EventSpec::new(EventKind::GlobalWarStart, summary)
            .primary(&war)
            .secondary(&attacker)
            .secondary(&defender),
    )])
}

/// Every `civil_war_interval` epochs absorbed factions may rise against their absorber.
pub fn spawn_civil_wars<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let interval = ctx.config.civil_war_interval;
    if interval == 0 || ctx.epoch % interval != 0 {
        return Ok(Vec::new());
    }
    let absorbed: Vec<EntityId> = ctx
        .world
        .graph()
        .entities_of_type(EntityType::Faction)
        .filter(|f| f.is_alive() && f.has_tag(keys::TAG_ABSORBED))
        .map(|f| f.id.clone())
        .collect();

    let mut events = Vec::new();
    for rebel in absorbed {
        if !ctx.roll(ctx.config.civil_war_chance) {
            continue;
        }
        if let Some(event) = skip_soft(rebel_against_absorber(ctx, &rebel), "civil_war")?.flatten() {
            events.push(event);
        }
    }
    Ok(events)
}

fn rebel_against_absorber<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    rebel: &EntityId,
) -> Result<Option<EventRecord>> {
    let Some(overlord) = ctx.world.entity(rebel).and_then(|f| f.data_id(keys::ABSORBED_BY)) else {
        return Ok(None);
    };
    if !ctx.world.entity(&overlord).map_or(false, |o| o.is_alive()) {
        return Ok(None);
    }
    let Some(location) = ctx.world.location_of(rebel) else {
        return Ok(None);
    };
    if ctx.world.entity(&overlord).and_then(|o| o.parent_id.clone()) != Some(location.clone()) {
        return Ok(None);
    }

    // Break away: back onto the absorber's ground as an independent faction.
    ctx.world
        .move_entity(rebel, &location, &RelationKind::FactionLocatedIn, ctx.rng)?;
    ctx.world.remove_outgoing(rebel, &RelationKind::AbsorbedBy);
    ctx.world
        .update_tags(rebel, &[keys::TAG_REBEL], &[keys::TAG_ABSORBED]);

    let tension = ctx.config.civil_war_tension;
    let conflict = open_conflict(ctx, rebel, &overlord, &location, DisputeReason::Rebellion, Some(tension), false)?;
    let summary = format!(
        "{} rises against {}",
        name_of(ctx.world, rebel),
        name_of(ctx.world, &overlord)
    );
    Ok(Some(ctx.emit(
        EventSpec::new(EventKind::CivilWarStart, summary)
            .primary(&conflict)
            .secondary(rebel)
            .secondary(&overlord)
            .location(&location),
    )))
}

/// Co-resident faction pairs without an active conflict may fall out.
///
/// The spawn chance is `political_base_chance x tension`, certain at or above
/// `forced_tension`, which marks the dispute as a religious crusade.
pub fn spawn_political_conflicts<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let wars = active_global_wars(ctx.world);
    let mut busy = active_pairs(ctx.world);
    let mut events = Vec::new();

    for location in ctx.world.ids_of_type(EntityType::Location) {
        let residents: Vec<EntityId> = ctx
            .world
            .resident_factions(&location)
            .into_iter()
            .filter(|f| ctx.world.entity(f).map_or(false, |e| !e.has_tag(keys::TAG_BOSS)))
            .collect();
        if residents.len() < 2 {
            continue;
        }

        for (i, first) in residents.iter().enumerate() {
            for second in &residents[i + 1..] {
                let pair = BTreeSet::from([first.clone(), second.clone()]);
                if busy.contains(&pair) {
                    continue;
                }

                let tension = cultural_tension(ctx.world, first, second, &wars, ctx.config);
                let forced = tension >= ctx.config.forced_tension;
                let chance = if forced {
                    1.0
                } else {
                    ctx.config.political_base_chance * tension
                };
                if !ctx.roll(chance) {
                    continue;
                }

                let reason = if forced {
                    DisputeReason::ReligiousCrusade
                } else {
                    dispute_reason(ctx.world, &[first, second], &location)
                };
                let conflict = open_conflict(ctx, first, second, &location, reason, Some(tension), false)?;
                if reason == DisputeReason::ReligiousCrusade {
                    if let Some(war) = crusade_between(ctx.world, first, second, &wars) {
                        ctx.world
                            .add_relation(&conflict, &war, &RelationKind::PartOfGlobal)?;
                    }
                }
                busy.insert(pair);

                debug!(conflict = %conflict, tension, reason = reason.as_str(), "conflict spawned");
                let summary = format!(
                    "{} and {} clash over {}",
                    name_of(ctx.world, first),
                    name_of(ctx.world, second),
                    reason.as_str().replace('_', " ")
                );
                events.push(ctx.emit(
                    EventSpec::new(EventKind::ConflictStart, summary)
                        .primary(&conflict)
                        .secondary(first)
                        .secondary(second)
                        .location(&location),
                ));
            }
        }
    }
    Ok(events)
}

/// Participant pairs of every active conflict.
fn active_pairs(world: &WorldQueryService) -> BTreeSet<BTreeSet<EntityId>> {
    world
        .graph()
        .entities_of_type(EntityType::Conflict)
        .filter(|c| is_active_conflict(c))
        .map(|c| c.data_ids(keys::PARTICIPANTS).into_iter().collect::<BTreeSet<_>>())
        .filter(|pair| pair.len() >= 2)
        .collect()
}

/// The active holy war whose two sides are the beliefs of these factions.
fn crusade_between(
    world: &WorldQueryService,
    first: &EntityId,
    second: &EntityId,
    wars: &[EntityId],
) -> Option<EntityId> {
    let a = world.belief_of(first)?;
    let b = world.belief_of(second)?;
    wars.iter()
        .find(|war| {
            let Some(entity) = world.entity(war) else {
                return false;
            };
            let initiator = entity.data_id(keys::INITIATOR_BELIEF);
            let target = entity.data_id(keys::TARGET_BELIEF);
            (initiator.as_ref() == Some(&a) && target.as_ref() == Some(&b))
                || (initiator.as_ref() == Some(&b) && target.as_ref() == Some(&a))
        })
        .cloned()
}

/// Belief relationship factor: neutral without faith, calmer within one, hotter across two.
pub fn belief_modifier(world: &WorldQueryService, first: &EntityId, second: &EntityId) -> f64 {
    match (world.belief_of(first), world.belief_of(second)) {
        (Some(a), Some(b)) if a == b => SAME_BELIEF,
        (Some(_), Some(_)) => OTHER_BELIEF,
        _ => 1.0,
    }
}

/// Scalar likelihood of two factions coming to blows.
///
/// `clamp(1 + distance, 0.1, 5.0) x belief modifier`, raised to at least the
/// forced tension when their beliefs are the two sides of an active holy war.
pub fn cultural_tension(
    world: &WorldQueryService,
    first: &EntityId,
    second: &EntityId,
    wars: &[EntityId],
    config: &SimulationConfig,
) -> f64 {
    let a: CultureVector = world.effective_culture(first);
    let b: CultureVector = world.effective_culture(second);
    let base = (1.0 + a.distance(&b, &config.culture_weights)).clamp(TENSION_FLOOR, TENSION_CEIL);
    let tension = base * belief_modifier(world, first, second);

    if crusade_between(world, first, second, wars).is_some() {
        tension.max(config.forced_tension)
    } else {
        tension
    }
}

/// Resources on the ground make it about resources, power-hungry factions
/// about power, anything else about territory.
pub fn dispute_reason(world: &WorldQueryService, factions: &[&EntityId], location: &EntityId) -> DisputeReason {
    if !world.children(location, Some(EntityType::Resource)).is_empty() {
        return DisputeReason::Resources;
    }
    let power_hungry = factions
        .iter()
        .filter_map(|f| world.entity(f))
        .any(|f| f.has_any_tag(&POWER_TAGS));
    if power_hungry {
        DisputeReason::Power
    } else {
        DisputeReason::Territory
    }
}

/// Create an active Conflict entity and link both sides with `involved_in`.
pub(crate) fn open_conflict<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    first: &EntityId,
    second: &EntityId,
    location: &EntityId,
    reason: DisputeReason,
    tension: Option<f64>,
    is_raid: bool,
) -> Result<EntityId> {
    let name = format!(
        "Conflict: {} vs {}",
        name_of(ctx.world, first),
        name_of(ctx.world, second)
    );
    let mut entity = Entity::new(
        EntityId::generate(EntityType::Conflict.id_prefix(), ctx.rng),
        EntityType::Conflict,
        reason.definition_id(),
        name,
    )
    .created_at(ctx.epoch)
    .with_data(keys::PARTICIPANTS, ids_to_value([first, second]))
    .with_data(keys::LOCATION_ID, location.as_str())
    .with_data(keys::REASON_ID, reason.as_str())
    .with_data(keys::STATUS, ConflictStatus::Active.as_str())
    .with_data(keys::EPOCH_STARTED, ctx.epoch)
    .with_data(keys::IS_RAID, is_raid);
    if let Some(tension) = tension {
        entity.set_data(keys::CULTURAL_TENSION, tension);
    }

    let conflict = ctx.world.add_entity(entity);
    ctx.world.add_relation(first, &conflict, &RelationKind::InvolvedIn)?;
    ctx.world.add_relation(second, &conflict, &RelationKind::InvolvedIn)?;
    Ok(conflict)
}

/// Aggressive factions strike a location in a neighboring biome.
pub fn process_raids<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let threshold = ctx.config.raid_aggression_threshold;
    let raiders: Vec<EntityId> = super::settled_factions(ctx.world)
        .into_iter()
        .filter(|f| ctx.world.effective_culture(f).aggression > threshold)
        .collect();

    let mut events = Vec::new();
    for raider in raiders {
        if !ctx.roll(ctx.config.raid_chance) {
            continue;
        }
        if let Some(event) = skip_soft(launch_raid(ctx, &raider), "raid")?.flatten() {
            events.push(event);
        }
    }
    Ok(events)
}

fn launch_raid<R: Rng>(ctx: &mut EpochContext<'_, R>, raider: &EntityId) -> Result<Option<EventRecord>> {
    let Some(biome) = ctx.world.biome_of(raider) else {
        return Ok(None);
    };
    let neighbors = ctx
        .world
        .entity(&biome)
        .map(|b| b.data_ids(keys::NEIGHBOR_BIOMES))
        .unwrap_or_default();
    let Some(target_biome) = neighbors.choose(ctx.rng).cloned() else {
        return Ok(None);
    };
    if !ctx.world.is_type(&target_biome, EntityType::Biome) {
        return Ok(None);
    }

    let targets = super::habitable_locations(ctx.world, &target_biome);
    let Some(target) = targets.choose(ctx.rng).cloned() else {
        return Ok(None);
    };
    let victims: Vec<EntityId> = ctx
        .world
        .resident_factions(&target)
        .into_iter()
        .filter(|v| v != raider)
        .collect();
    let Some(victim) = victims.choose(ctx.rng).cloned() else {
        return Ok(None);
    };

    if belief_modifier(ctx.world, raider, &victim) < 1.0 && ctx.roll(ctx.config.same_faith_raid_abort) {
        debug!(raider = %raider, victim = %victim, "raid on fellow believers called off");
        return Ok(None);
    }

    let conflict = open_conflict(ctx, raider, &victim, &target, DisputeReason::Plunder, None, true)?;
    let summary = format!(
        "{} raids {}",
        name_of(ctx.world, raider),
        name_of(ctx.world, &target)
    );
    Ok(Some(ctx.emit(
        EventSpec::new(EventKind::RaidStart, summary)
            .primary(&conflict)
            .secondary(raider)
            .secondary(&victim)
            .location(&target),
    )))
}

/// Monsters awaken in quiet places, most often in ruins.
pub fn process_bosses<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let mut events = Vec::new();
    for location in ctx.world.ids_of_type(EntityType::Location) {
        let Some(entity) = ctx.world.entity(&location) else {
            continue;
        };
        if !entity.is_active() || entity.has_any_tag(&[keys::TAG_DISASTER, keys::TAG_UNDER_SIEGE]) {
            continue;
        }
        let is_ruins = entity.has_tag(keys::TAG_RUINS);
        let residents = ctx.world.resident_factions(&location);
        let haunted = residents
            .iter()
            .any(|f| ctx.world.entity(f).map_or(false, |e| e.has_tag(keys::TAG_BOSS)));
        if haunted {
            continue;
        }

        let mut chance = ctx.config.boss_chance;
        if is_ruins {
            chance *= ctx.config.boss_ruins_multiplier;
        }
        if !residents.is_empty() && ctx.config.boss_occupied_divisor > 0.0 {
            chance /= ctx.config.boss_occupied_divisor;
        }
        if !ctx.roll(chance) {
            continue;
        }
        if let Some(spawned) = skip_soft(spawn_boss(ctx, &location, &residents), "boss")?.flatten() {
            events.push(spawned);
        }
    }
    Ok(events)
}

fn spawn_boss<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    location: &EntityId,
    victims: &[EntityId],
) -> Result<Option<EventRecord>> {
    let Some(biome) = ctx.world.biome_of(location) else {
        return Ok(None);
    };
    let biome_definition = ctx
        .world
        .entity(&biome)
        .map(|b| b.definition_id.clone())
        .unwrap_or_default();
    let templates = ctx.templates;
    let candidates: Vec<_> = templates
        .bosses
        .all()
        .filter(|b| b.allowed_biomes.contains(&biome_definition))
        .collect();
    let Some(template) = candidates.choose(ctx.rng).copied() else {
        return Ok(None);
    };

    let context = NameContext::new()
        .with("name_template", template.name_template.clone())
        .with("style", "harsh");
    let name = ctx.namer.generate_name(EntityType::Boss, &context);
    let boss = ctx.world.add_entity(
        Entity::new(
            EntityId::generate(EntityType::Boss.id_prefix(), ctx.rng),
            EntityType::Faction,
            &template.id,
            name.clone(),
        )
        .with_parent(location.clone())
        .with_tags(template.tags.iter().cloned())
        .with_tags([keys::TAG_BOSS, keys::TAG_HOSTILE])
        .with_culture(&template.culture)
        .with_data(keys::ROLE, template.role.clone())
        .created_at(ctx.epoch),
    );
    ctx.world
        .add_relation(&boss, location, &RelationKind::FactionLocatedIn)?;
    ctx.world.assign_slot(&boss, ctx.rng);
    if template.tags.iter().any(|t| t == keys::TAG_DISASTER) {
        ctx.world.update_tags(location, &[keys::TAG_UNDER_SIEGE], &[]);
    }

    let summary = format!("A threat awakens in {}: {name}", name_of(ctx.world, location));
    let event = ctx.emit(
        EventSpec::new(EventKind::BossSpawn, summary)
            .primary(&boss)
            .secondary(location),
    );
    for victim in victims {
        open_conflict(ctx, &boss, victim, location, DisputeReason::Survival, None, false)?;
    }
    Ok(Some(event))
}
