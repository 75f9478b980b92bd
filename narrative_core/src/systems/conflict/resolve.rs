//! Conflict resolution and the effects of each outcome.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use world_rules::{
    keys, ConflictOutcome, ConflictStatus, DisputeReason, EntityId, EntityType, RelationKind, Result,
    WorldError,
};

use super::is_active_conflict;
use crate::events::{EventKind, EventRecord, EventSpec};
use crate::generator::spawn_location;
use crate::query::WorldQueryService;
use crate::systems::lifecycle::conquered_leader_fates;
use crate::systems::{habitable_locations, has_faction_room, name_of, skip_soft, EpochContext};

const RUINS_DEFINITION: &str = "loc_ruins";
const RUINS_TAGS: [&str; 3] = [keys::TAG_RUINS, "dangerous", "hidden"];
/// Location archetypes a displaced faction can found.
const SETTLEMENT_ARCHETYPES: [&str; 3] = ["plains", "hamlet", "camp"];
const RAID_DIE_SIDES: i32 = 10;

/// What resolving one conflict did.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        outcome: ConflictOutcome,
        events: Vec<EventRecord>,
    },
    /// Too few participants left, or the conflict was not active. No event.
    Aborted,
}

/// Resolve every active conflict, then close holy wars that lost a side.
pub fn resolve_conflicts<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let active: Vec<EntityId> = ctx
        .world
        .graph()
        .entities_of_type(EntityType::Conflict)
        .filter(|c| is_active_conflict(c))
        .map(|c| c.id.clone())
        .collect();

    let mut events = Vec::new();
    for conflict in active {
        if let Some(Resolution::Resolved { events: produced, .. }) =
            skip_soft(resolve_conflict(ctx, &conflict), "resolve_conflict")?
        {
            events.extend(produced);
        }
    }
    events.extend(close_global_wars(ctx)?);
    Ok(events)
}

/// Resolve a single conflict.
///
/// Raids compare `aggression + d10` per side. Everything else draws a weighted
/// outcome, with the crusade table for religious crusades. A conflict that is
/// no longer active, or has fewer than two participants still standing at
/// its location, is marked aborted.
pub fn resolve_conflict<R: Rng>(ctx: &mut EpochContext<'_, R>, conflict: &EntityId) -> Result<Resolution> {
    let entity = ctx
        .world
        .entity(conflict)
        .ok_or_else(|| WorldError::EntityNotFound(conflict.clone()))?;
    if entity.entity_type != EntityType::Conflict || !is_active_conflict(entity) {
        abort(ctx.world, conflict);
        return Ok(Resolution::Aborted);
    }
    let participants = entity.data_ids(keys::PARTICIPANTS);
    let is_raid = entity.data_bool(keys::IS_RAID);
    let crusade = entity.data_str(keys::REASON_ID) == Some(DisputeReason::ReligiousCrusade.as_str());
    let Some(location) = entity.data_id(keys::LOCATION_ID).filter(|l| ctx.world.entity(l).is_some()) else {
        abort(ctx.world, conflict);
        return Ok(Resolution::Aborted);
    };

    let valid = valid_participants(ctx.world, &participants, &location, is_raid);
    if valid.len() < 2 {
        debug!(conflict = %conflict, remaining = valid.len(), "conflict aborted");
        abort(ctx.world, conflict);
        return Ok(Resolution::Aborted);
    }

    let (outcome, events) = if is_raid {
        resolve_raid(ctx, &valid[0], &valid[1], &location)?
    } else {
        let outcome = draw_outcome(ctx.rng, crusade);
        let events = apply_outcome(ctx, outcome, &valid, &location)?;
        (outcome, events)
    };

    if let Some(entity) = ctx.world.entity_mut(conflict) {
        entity.set_data(keys::STATUS, ConflictStatus::Resolved.as_str());
        entity.set_data(keys::OUTCOME, outcome.as_str());
    }
    if let Some(place) = ctx.world.entity_mut(&location) {
        place.set_data(keys::LAST_CONFLICT_EPOCH, ctx.epoch);
    }
    if let Some(event_id) = events.first().and_then(|e| e.id.clone()) {
        ctx.world
            .add_relation(conflict, &event_id, &RelationKind::ResolvedAs)?;
    }

    debug!(conflict = %conflict, outcome = outcome.as_str(), "conflict resolved");
    Ok(Resolution::Resolved { outcome, events })
}

fn abort(world: &mut WorldQueryService, conflict: &EntityId) {
    if let Some(entity) = world.entity_mut(conflict) {
        entity.set_data(keys::STATUS, ConflictStatus::Aborted.as_str());
    }
}

/// Living, active and unabsorbed.
fn is_standing(world: &WorldQueryService, id: &EntityId) -> bool {
    world
        .entity(id)
        .map_or(false, |e| e.is_alive() && e.is_active() && !e.has_tag(keys::TAG_ABSORBED))
}

fn is_present(world: &WorldQueryService, id: &EntityId, location: &EntityId) -> bool {
    is_standing(world, id) && world.entity(id).and_then(|e| e.parent_id.as_ref()) == Some(location)
}

/// Raiders only need to be standing. Everyone else must still be at the location.
fn valid_participants(
    world: &WorldQueryService,
    participants: &[EntityId],
    location: &EntityId,
    is_raid: bool,
) -> Vec<EntityId> {
    participants
        .iter()
        .enumerate()
        .filter(|(i, p)| {
            if is_raid && *i == 0 {
                is_standing(world, p)
            } else {
                is_present(world, p, location)
            }
        })
        .map(|(_, p)| p.clone())
        .collect()
}

fn is_boss(world: &WorldQueryService, id: &EntityId) -> bool {
    world.entity(id).map_or(false, |e| e.has_tag(keys::TAG_BOSS))
}

/// Weighted draw among the non-raid outcomes.
pub fn draw_outcome<R: Rng>(rng: &mut R, crusade: bool) -> ConflictOutcome {
    ConflictOutcome::WEIGHTED
        .choose_weighted(rng, |o| if crusade { o.crusade_weight() } else { o.base_weight() })
        .copied()
        .unwrap_or(ConflictOutcome::Absorption)
}

fn resolve_raid<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    raider: &EntityId,
    victim: &EntityId,
    target: &EntityId,
) -> Result<(ConflictOutcome, Vec<EventRecord>)> {
    let attack = ctx.world.effective_culture(raider).aggression + ctx.rng.gen_range(1..=RAID_DIE_SIDES);
    let defense = ctx.world.effective_culture(victim).aggression + ctx.rng.gen_range(1..=RAID_DIE_SIDES);
    let raider_name = name_of(ctx.world, raider);
    let target_name = name_of(ctx.world, target);

    if attack <= defense {
        let summary = format!("{} drove off the raiders of {raider_name}", name_of(ctx.world, victim));
        let event = ctx.emit(
            EventSpec::new(EventKind::RaidRepelled, summary)
                .primary(victim)
                .secondary(raider)
                .location(target),
        );
        return Ok((ConflictOutcome::RaidRepelled, vec![event]));
    }

    let loot = ctx
        .world
        .children(target, Some(EntityType::Resource))
        .choose(ctx.rng)
        .cloned();
    let home = ctx.world.location_of(raider);

    if let (Some(resource), Some(home)) = (loot, home) {
        ctx.world
            .move_entity(&resource, &home, &RelationKind::LocatedIn, ctx.rng)?;
        ctx.world.update_tags(&resource, &[keys::TAG_STOLEN], &[]);
        let summary = format!(
            "{raider_name} carried {} away from {target_name}",
            name_of(ctx.world, &resource)
        );
        let event = ctx.emit(
            EventSpec::new(EventKind::RaidSuccessLoot, summary)
                .primary(raider)
                .secondary(victim)
                .location(target)
                .data("loot", resource.as_str()),
        );
        return Ok((ConflictOutcome::RaidSuccessLoot, vec![event]));
    }

    let summary = format!("{raider_name} plundered {target_name}");
    let event = ctx.emit(
        EventSpec::new(EventKind::RaidSuccessPlunder, summary)
            .primary(raider)
            .secondary(victim)
            .location(target),
    );
    Ok((ConflictOutcome::RaidSuccessPlunder, vec![event]))
}

/// Apply a non-raid outcome. A random participant wins, the rest lose.
///
/// The `conflict_resolved` event comes first, followed by any leader fates.
fn apply_outcome<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    outcome: ConflictOutcome,
    participants: &[EntityId],
    location: &EntityId,
) -> Result<Vec<EventRecord>> {
    let Some(winner) = participants.choose(ctx.rng).cloned() else {
        return Ok(Vec::new());
    };
    let losers: Vec<EntityId> = participants.iter().filter(|p| **p != winner).cloned().collect();
    let winner_name = name_of(ctx.world, &winner);
    let loser_names = losers
        .iter()
        .map(|l| name_of(ctx.world, l))
        .collect::<Vec<_>>()
        .join(", ");

    let mut fates = Vec::new();
    let summary = match outcome {
        ConflictOutcome::Truce => {
            make_truce(ctx.world, participants)?;
            format!("{winner_name} and {loser_names} made peace")
        }
        ConflictOutcome::Destruction => {
            let old = name_of(ctx.world, location);
            destroy_location(ctx, location);
            format!("{old} was razed in the fighting")
        }
        _ => {
            let mut lines = Vec::new();
            for loser in &losers {
                let line = if is_boss(ctx.world, loser) {
                    cease(ctx.world, loser);
                    format!("{winner_name} slew {}", name_of(ctx.world, loser))
                } else {
                    match outcome {
                        ConflictOutcome::Absorption => {
                            fates.extend(absorb(ctx, loser, &winner)?);
                            format!("{winner_name} absorbed {}", name_of(ctx.world, loser))
                        }
                        ConflictOutcome::Flight => {
                            let (line, fate) = flee(ctx, loser, &winner, location)?;
                            fates.extend(fate);
                            line
                        }
                        _ => settle_elsewhere(ctx, loser, location)?,
                    }
                };
                lines.push(line);
            }
            lines.join("; ")
        }
    };

    let mut spec = EventSpec::new(EventKind::ConflictResolved, summary)
        .primary(&winner)
        .location(location)
        .data(keys::OUTCOME, outcome.as_str());
    for loser in &losers {
        spec = spec.secondary(loser);
    }
    let mut events = vec![ctx.emit(spec)];
    events.extend(fates);
    Ok(events)
}

/// Every participant turns ally of every other.
fn make_truce(world: &mut WorldQueryService, participants: &[EntityId]) -> Result<()> {
    for (i, first) in participants.iter().enumerate() {
        world.update_tags(first, &[keys::TAG_ALLIED], &[]);
        for second in &participants[i + 1..] {
            world.add_relation(first, second, &RelationKind::AlliedWith)?;
        }
    }
    Ok(())
}

/// Mark a faction as gone for good. It keeps its parent.
fn cease(world: &mut WorldQueryService, faction: &EntityId) {
    world.update_tags(faction, &[keys::TAG_DEAD, keys::TAG_INACTIVE], &[]);
}

/// Fold the loser into the winner, along with whatever it had absorbed.
fn absorb<R: Rng>(ctx: &mut EpochContext<'_, R>, loser: &EntityId, winner: &EntityId) -> Result<Vec<EventRecord>> {
    // Leaders are decided before the loser's household moves.
    let fates = conquered_leader_fates(ctx, loser, winner)?;

    ctx.world
        .move_entity(loser, winner, &RelationKind::AbsorbedBy, ctx.rng)?;
    ctx.world.remove_outgoing(loser, &RelationKind::FactionLocatedIn);
    ctx.world.remove_outgoing(loser, &RelationKind::FledTo);
    ctx.world
        .update_tags(loser, &[keys::TAG_ABSORBED], &[keys::TAG_REBEL, keys::TAG_ALLIED]);
    if let Some(entity) = ctx.world.entity_mut(loser) {
        entity.set_data(keys::ABSORBED_BY, winner.as_str());
    }

    for child in ctx.world.children(loser, None) {
        if ctx.world.is_type(&child, EntityType::Faction) {
            ctx.world
                .move_entity(&child, winner, &RelationKind::AbsorbedBy, ctx.rng)?;
            if let Some(entity) = ctx.world.entity_mut(&child) {
                entity.set_data(keys::ABSORBED_BY, winner.as_str());
            }
        } else if let Some(entity) = ctx.world.entity_mut(&child) {
            entity.parent_id = Some(winner.clone());
        }
    }
    Ok(fates)
}

/// Relocate the loser: same biome first, then anywhere, then a coin flip
/// between absorption and extinction.
fn flee<R: Rng>(
    ctx: &mut EpochContext<'_, R>,
    loser: &EntityId,
    winner: &EntityId,
    location: &EntityId,
) -> Result<(String, Vec<EventRecord>)> {
    let name = name_of(ctx.world, loser);
    let nearby: Vec<EntityId> = ctx
        .world
        .biome_of(location)
        .map(|biome| habitable_locations(ctx.world, &biome))
        .unwrap_or_default()
        .into_iter()
        .filter(|l| l != location && has_faction_room(ctx.world, l))
        .collect();
    let destination = match nearby.choose(ctx.rng) {
        Some(found) => Some(found.clone()),
        None => {
            let anywhere: Vec<EntityId> = ctx
                .world
                .ids_of_type(EntityType::Biome)
                .iter()
                .flat_map(|b| habitable_locations(ctx.world, b))
                .filter(|l| l != location)
                .collect();
            anywhere.choose(ctx.rng).cloned()
        }
    };

    if let Some(destination) = destination {
        ctx.world
            .move_entity(loser, &destination, &RelationKind::FactionLocatedIn, ctx.rng)?;
        ctx.world
            .add_relation(loser, &destination, &RelationKind::FledTo)?;
        let line = format!("{name} fled to {}", name_of(ctx.world, &destination));
        return Ok((line, Vec::new()));
    }

    if ctx.rng.gen_bool(0.5) {
        let fates = absorb(ctx, loser, winner)?;
        Ok((format!("{name} had nowhere to run and was absorbed"), fates))
    } else {
        cease(ctx.world, loser);
        Ok((format!("{name} had nowhere to run and perished"), Vec::new()))
    }
}

/// Found a new location in the same biome, or take to the roads as bandits.
fn settle_elsewhere<R: Rng>(ctx: &mut EpochContext<'_, R>, loser: &EntityId, location: &EntityId) -> Result<String> {
    let name = name_of(ctx.world, loser);
    let templates = ctx.templates;
    let candidates: Vec<_> = templates
        .locations
        .all()
        .filter(|t| SETTLEMENT_ARCHETYPES.iter().any(|a| t.id.contains(a)))
        .collect();

    let biome = ctx.world.biome_of(location);
    let has_room = match &biome {
        Some(b) => {
            let room = ctx.world.ensure_room(b, EntityType::Location, None);
            skip_soft(room, "new_settlement")?.is_some()
        }
        None => false,
    };

    match (biome, candidates.choose(ctx.rng).copied()) {
        (Some(biome), Some(template)) if has_room => {
            let founded = spawn_location(ctx.world, ctx.namer, &biome, template, ctx.epoch, ctx.rng);
            ctx.world
                .move_entity(loser, &founded, &RelationKind::FactionLocatedIn, ctx.rng)?;
            Ok(format!("{name} left to found {}", name_of(ctx.world, &founded)))
        }
        _ => {
            ctx.world
                .update_tags(loser, &[keys::TAG_WANDERING, keys::TAG_BANDITS], &[]);
            Ok(format!("{name} took to the roads as bandits"))
        }
    }
}

/// Turn a location into ruins. Everyone in it dies, its resources are buried.
fn destroy_location<R: Rng>(ctx: &mut EpochContext<'_, R>, location: &EntityId) {
    let Some(entity) = ctx.world.entity_mut(location) else {
        return;
    };
    entity.definition_id = RUINS_DEFINITION.to_string();
    entity.name = format!("Ruins of {}", entity.name);
    entity.remove_tag("settlement");
    for tag in RUINS_TAGS {
        entity.add_tag(tag);
    }
    entity.set_data(keys::DESTROYED_IN_EPOCH, ctx.epoch);

    for descendant in ctx.world.descendants(location) {
        let Some(kind) = ctx.world.entity(&descendant).map(|e| e.entity_type) else {
            continue;
        };
        match kind {
            EntityType::Faction | EntityType::Character => {
                ctx.world
                    .update_tags(&descendant, &[keys::TAG_DEAD, keys::TAG_INACTIVE], &[]);
            }
            EntityType::Resource => {
                ctx.world.update_tags(&descendant, &[keys::TAG_BURIED], &[]);
            }
            _ => {}
        }
    }
}

/// End holy wars once either belief has no living followers.
fn close_global_wars<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let wars: Vec<(EntityId, Option<EntityId>, Option<EntityId>)> = ctx
        .world
        .graph()
        .entities_of_type(EntityType::GlobalConflict)
        .filter(|w| is_active_conflict(w))
        .map(|w| (w.id.clone(), w.data_id(keys::INITIATOR_BELIEF), w.data_id(keys::TARGET_BELIEF)))
        .collect();

    let mut events = Vec::new();
    for (war, initiator, target) in wars {
        let survivors: Vec<EntityId> = [initiator, target]
            .into_iter()
            .flatten()
            .filter(|b| !ctx.world.factions_by_belief(b).is_empty())
            .collect();
        if survivors.len() >= 2 {
            continue;
        }

        if let Some(entity) = ctx.world.entity_mut(&war) {
            entity.set_data(keys::STATUS, ConflictStatus::Resolved.as_str());
        }
        let summary = match survivors.first() {
            Some(victor) => format!(
                "{} ended with the triumph of {}",
                name_of(ctx.world, &war),
                name_of(ctx.world, victor)
            ),
            None => format!("{} ended with no faithful left", name_of(ctx.world, &war)),
        };
        let mut spec = EventSpec::new(EventKind::ConflictResolved, summary).primary(&war);
        if let Some(victor) = survivors.first() {
            spec = spec.secondary(victor);
        }
        events.push(ctx.emit(spec));
    }
    Ok(events)
}
