//! Narrative Engine - owns a world and advances it one epoch at a time.
//!
//! Each epoch runs the systems in a fixed order:
//!
//! 1. Leader and resource decay
//! 2. Beliefs (genesis and spread)
//! 3. Leader appointment for leaderless factions
//! 4. Conflict spawns: religious war, civil war, political
//! 5. Raids and bosses
//! 6. Growth every `growth_interval` epochs: discovery, new resources, regrowth
//! 7. Overcrowding, transformations, expansions
//! 8. Conflict resolution
//! 9. Coordinate sync of mobile entities
//!
//! Events come back in call order. A failing step ends the epoch early with a
//! `critical_error` record; the next epoch runs normally.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{error, info};
use world_rules::{
    keys, CultureVector, Entity, EntityId, EntityType, NameContext, NamingOracle, RelationKind, Result,
    SyllableNamer, TemplateStore, WorldGraph,
};

use crate::config::SimulationConfig;
use crate::events::{weigh_events, EventKind, EventRecord, EventSpec};
use crate::generator::WorldGenerator;
use crate::query::WorldQueryService;
use crate::systems::{belief, conflict, lifecycle, name_of, settled_factions, transformation, EpochContext};

/// Definition id of appointed leaders.
pub const LEADER_DEFINITION: &str = "char_leader";
/// Chance a new leader has a single trait rather than two.
const SINGLE_TRAIT_CHANCE: f64 = 0.7;
/// Relations that place a mobile entity, in order of precedence.
const PLACEMENT_RELATIONS: [RelationKind; 4] = [
    RelationKind::FactionLocatedIn,
    RelationKind::LocatedIn,
    RelationKind::OccurredAt,
    RelationKind::FledTo,
];

/// Drives the simulation over a world graph.
pub struct NarrativeEngine {
    world: WorldQueryService,
    templates: TemplateStore,
    namer: Box<dyn NamingOracle>,
    config: SimulationConfig,
    rng: ChaCha8Rng,
    epoch: u32,
}

impl NarrativeEngine {
    /// Wrap an existing graph. Builtin relation types are registered if missing.
    ///
    /// The RNG is seeded from `config.seed`, or from entropy without one.
    pub fn new(mut graph: WorldGraph, templates: TemplateStore, config: SimulationConfig) -> Self {
        graph.register_builtin_relation_types();
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let namer = SyllableNamer::new(ChaCha8Rng::seed_from_u64(rng.gen()));

        Self {
            world: WorldQueryService::new(graph),
            templates,
            namer: Box::new(namer),
            config,
            rng,
            epoch: 0,
        }
    }

    /// Generate a fresh `width x height` world and wrap it.
    pub fn generate(
        width: u32,
        height: u32,
        biome_pool: &[String],
        templates: TemplateStore,
        config: SimulationConfig,
    ) -> Result<Self> {
        let mut engine = Self::new(WorldGraph::new(), templates, config);
        let graph = WorldGenerator::new(&engine.templates, engine.namer.as_mut(), &engine.config).generate(
            width,
            height,
            biome_pool,
            &mut engine.rng,
        )?;
        engine.world = WorldQueryService::new(graph);
        info!(
            entities = engine.world.graph().entity_count(),
            relations = engine.world.graph().relations().len(),
            "world generated"
        );
        Ok(engine)
    }

    /// Replace the naming oracle.
    pub fn with_namer(mut self, namer: Box<dyn NamingOracle>) -> Self {
        self.namer = namer;
        self
    }

    pub fn world(&self) -> &WorldQueryService {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldQueryService {
        &mut self.world
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of the last completed epoch.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn into_graph(self) -> WorldGraph {
        self.world.into_graph()
    }

    /// Run one epoch and return its events.
    pub fn advance(&mut self) -> Vec<EventRecord> {
        self.epoch += 1;
        let epoch = self.epoch;
        let mut events = Vec::new();

        if let Err(err) = self.run_pipeline(epoch, &mut events) {
            error!(epoch, error = %err, "epoch aborted");
            events.push(EventRecord::synthetic(
                EventKind::CriticalError,
                epoch,
                format!("Epoch {epoch} failed: {err}"),
            ));
        }
        if self.config.importance_weighting {
            weigh_events(&mut events, epoch, &mut self.rng);
        }

        info!(epoch, events = events.len(), "epoch complete");
        events
    }

    /// Run `epochs` epochs back to back, concatenating their events.
    pub fn evolve(&mut self, epochs: u32) -> Vec<EventRecord> {
        let mut events = Vec::new();
        for _ in 0..epochs {
            events.extend(self.advance());
        }
        events
    }

    fn run_pipeline(&mut self, epoch: u32, events: &mut Vec<EventRecord>) -> Result<()> {
        let growth_interval = self.config.growth_interval;
        let mut ctx = EpochContext {
            world: &mut self.world,
            templates: &self.templates,
            namer: self.namer.as_mut(),
            config: &self.config,
            rng: &mut self.rng,
            epoch,
        };
        let ctx = &mut ctx;

        events.extend(lifecycle::process_leader_decay(ctx)?);
        events.extend(lifecycle::process_resource_decay(ctx)?);
        events.extend(belief::process_beliefs(ctx)?);
        events.extend(ensure_leaders(ctx)?);
        events.extend(conflict::process_conflict_spawn(ctx)?);
        events.extend(conflict::process_raids(ctx)?);
        events.extend(conflict::process_bosses(ctx)?);
        if growth_interval > 0 && epoch % growth_interval == 0 {
            events.extend(transformation::process_discovery(ctx)?);
            events.extend(lifecycle::process_new_resources(ctx)?);
            events.extend(lifecycle::process_resource_regrowth(ctx)?);
        }
        events.extend(lifecycle::process_overcrowding(ctx)?);
        events.extend(transformation::process_transformations(ctx)?);
        events.extend(transformation::process_expansions(ctx)?);
        events.extend(conflict::resolve_conflicts(ctx)?);
        sync_positions(ctx.world, epoch);
        Ok(())
    }
}

/// Appoint a leader for every settled faction without a living one.
///
/// The leader gets one trait (sometimes two) and carries the sum of their
/// culture modifiers. Without registered traits the leader is neutral.
pub fn ensure_leaders<R: Rng>(ctx: &mut EpochContext<'_, R>) -> Result<Vec<EventRecord>> {
    let templates = ctx.templates;
    let traits: Vec<_> = templates.traits.all().collect();
    let leaderless: Vec<EntityId> = settled_factions(ctx.world)
        .into_iter()
        .filter(|f| ctx.world.leader_of(f).is_none())
        .collect();

    let mut events = Vec::new();
    for faction in leaderless {
        let count = if ctx.roll(SINGLE_TRAIT_CHANCE) { 1 } else { 2 };
        let chosen: Vec<_> = traits.choose_multiple(ctx.rng, count).copied().collect();
        let culture = chosen
            .iter()
            .fold(CultureVector::default(), |acc, t| acc.add(&t.modifiers))
            .clamped();
        let trait_names: Vec<&str> = chosen.iter().map(|t| t.name.as_str()).collect();

        let style = ctx
            .world
            .entity(&faction)
            .and_then(|f| f.data_str(keys::CREATURE_TYPE))
            .unwrap_or("plain")
            .to_string();
        let root = ctx
            .namer
            .generate_name(EntityType::Character, &NameContext::new().with("style", style));
        let name = match trait_names.first() {
            Some(title) => format!("{root} the {title}"),
            None => root,
        };

        let leader = ctx.world.add_entity(
            Entity::new(
                EntityId::generate(EntityType::Character.id_prefix(), ctx.rng),
                EntityType::Character,
                LEADER_DEFINITION,
                name,
            )
            .with_parent(faction.clone())
            .with_tags(["leader"])
            .with_culture(&culture)
            .with_data(keys::FACTION_ID, faction.as_str())
            .with_data(keys::ROLE, "leader")
            .with_data(keys::TRAITS, trait_names.clone())
            .created_at(ctx.epoch),
        );
        ctx.world.add_relation(&leader, &faction, &RelationKind::Leads)?;

        let summary = format!(
            "{} now leads {}",
            name_of(ctx.world, &leader),
            name_of(ctx.world, &faction)
        );
        events.push(ctx.emit(
            EventSpec::new(EventKind::LeaderAppointed, summary)
                .primary(&leader)
                .secondary(&faction)
                .data(keys::TRAITS, trait_names),
        ));
    }
    Ok(events)
}

/// Copy each mobile entity's placement coordinates into `x`/`y`.
///
/// `last_moved_at` changes only when the position does. Returns the number
/// of entities that moved.
pub fn sync_positions(world: &mut WorldQueryService, epoch: u32) -> usize {
    let moves: Vec<(EntityId, (f64, f64))> = world
        .graph()
        .entities()
        .filter(|e| !matches!(e.entity_type, EntityType::Location | EntityType::Biome))
        .filter_map(|e| {
            let anchor = PLACEMENT_RELATIONS
                .iter()
                .find_map(|kind| world.targets(&e.id, kind).into_iter().next())?;
            let target = world.entity(&anchor)?;
            let point = target
                .data_point(keys::ABS_COORD)
                .or_else(|| target.data_point(keys::COORD))?;
            let current = e.data_f64(keys::X).zip(e.data_f64(keys::Y));
            (current != Some(point)).then(|| (e.id.clone(), point))
        })
        .collect();

    for (id, (x, y)) in &moves {
        if let Some(entity) = world.entity_mut(id) {
            entity.set_data(keys::X, *x);
            entity.set_data(keys::Y, *y);
            entity.set_data(keys::LAST_MOVED_AT, epoch);
        }
    }
    moves.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_faction, fixture_store, id, two_biome_graph, Harness};
    use world_rules::ConflictStatus;

    fn seeded_config(seed: u64) -> SimulationConfig {
        SimulationConfig::default().with_seed(seed)
    }

    #[test]
    fn test_leaderless_factions_get_leaders() {
        let mut graph = two_biome_graph();
        add_faction(&mut graph, "fac_a", "loc_1", CultureVector::default());
        let mut harness = Harness::new(graph, 51);

        let events = ensure_leaders(&mut harness.ctx(1)).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::LeaderAppointed);
        let leader = harness.world.leader_of(&id("fac_a")).unwrap();
        let entity = harness.world.entity(&leader).unwrap();
        assert_eq!(entity.parent_id, Some(id("fac_a")));
        assert_eq!(entity.data_id(keys::FACTION_ID), Some(id("fac_a")));
        assert!(entity.name.contains(" the "));
        let traits = entity.data[keys::TRAITS].as_array().unwrap().len();
        assert!((1..=2).contains(&traits));

        // Already led.
        assert!(ensure_leaders(&mut harness.ctx(2)).unwrap().is_empty());
    }

    #[test]
    fn test_sync_positions_tracks_moves() {
        let mut graph = two_biome_graph();
        add_faction(&mut graph, "fac_a", "loc_1", CultureVector::default());
        let mut world = WorldQueryService::new(graph);

        assert_eq!(sync_positions(&mut world, 1), 1);
        let faction = world.entity(&id("fac_a")).unwrap();
        assert_eq!(faction.data_f64(keys::X), Some(0.1));
        assert_eq!(faction.data_u32(keys::LAST_MOVED_AT), Some(1));

        // Nothing moved.
        assert_eq!(sync_positions(&mut world, 2), 0);
        assert_eq!(world.entity(&id("fac_a")).unwrap().data_u32(keys::LAST_MOVED_AT), Some(1));

        world.remove_outgoing(&id("fac_a"), &RelationKind::FactionLocatedIn);
        world
            .add_relation(&id("fac_a"), &id("loc_3"), &RelationKind::FactionLocatedIn)
            .unwrap();
        assert_eq!(sync_positions(&mut world, 3), 1);
        assert_eq!(world.entity(&id("fac_a")).unwrap().data_f64(keys::X), Some(1.0));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = |seed| {
            let mut engine =
                NarrativeEngine::generate(3, 3, &[], fixture_store(), seeded_config(seed)).unwrap();
            let events = engine.evolve(12);
            let summaries: Vec<String> = events.into_iter().map(|e| e.summary).collect();
            (summaries, engine.world().graph().entity_count())
        };

        assert_eq!(run(7), run(7));
    }

    #[test]
    fn test_epochs_leave_no_active_conflicts() {
        let mut engine = NarrativeEngine::generate(3, 3, &[], fixture_store(), seeded_config(8)).unwrap();

        for _ in 0..10 {
            let events = engine.advance();
            assert!(events.iter().all(|e| e.kind != EventKind::CriticalError));
            assert!(events.iter().all(|e| e.epoch == engine.epoch()));
            let open = engine
                .world()
                .graph()
                .entities_of_type(EntityType::Conflict)
                .filter(|c| c.data_str(keys::STATUS) == Some(ConflictStatus::Active.as_str()))
                .count();
            assert_eq!(open, 0);
        }
        assert_eq!(engine.epoch(), 10);
    }

    #[test]
    fn test_hard_error_becomes_critical_event() {
        let mut graph = two_biome_graph();
        add_faction(&mut graph, "fac_a", "loc_1", CultureVector::default());
        // A relation type that clashes with how leaders are linked.
        graph.register_builtin_relation_types();
        let mut snapshot: world_rules::GraphSnapshot = graph.into();
        if let Some(leads) = snapshot.relation_types.get_mut("leads") {
            leads.from_type = EntityType::Faction;
        }
        let graph = WorldGraph::try_from(snapshot).unwrap();
        let mut engine = NarrativeEngine::new(graph, fixture_store(), seeded_config(9));

        let first = engine.advance();
        assert_eq!(first.last().map(|e| e.kind), Some(EventKind::CriticalError));
        assert_eq!(first.last().unwrap().epoch, 1);

        // The next epoch still runs.
        let second = engine.advance();
        assert_eq!(engine.epoch(), 2);
        assert_eq!(second.last().map(|e| e.kind), Some(EventKind::CriticalError));
    }

    #[test]
    fn test_importance_pass_tiers_events() {
        let mut config = seeded_config(10);
        config.importance_weighting = true;
        let mut engine = NarrativeEngine::generate(3, 3, &[], fixture_store(), config).unwrap();

        let events = engine.advance();

        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.importance.is_some()));
        let scores: Vec<f64> = events.iter().map(|e| e.importance.unwrap().score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}
