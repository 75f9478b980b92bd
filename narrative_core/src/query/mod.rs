//! World Query Service - the single mutation and query gateway for the world graph.
//!
//! Systems never touch the graph directly. Reads return `None` or empty
//! collections for unknown ids; writes against unknown ids or relation types
//! log a warning and do nothing, while type mismatches are returned as errors.

mod slots;

pub use slots::*;

use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use world_rules::{
    ids_to_value, keys, CultureVector, Entity, EntityId, EntityType, GraphSnapshot, RelationInstance,
    RelationKind, RelationType, Result, WorldError, WorldGraph,
};

use crate::events::{EventRecord, EventSpec};

/// How far parent chains are followed before giving up.
const MAX_PARENT_DEPTH: usize = 8;
/// Slot capacity of a biome without an explicit capacity.
const DEFAULT_BIOME_SLOTS: u32 = 5;
/// Slot capacity of any other parent without capacity or faction limit.
const DEFAULT_SLOTS: u32 = 4;
/// Definition id of Event entities.
pub const EVENT_DEFINITION: &str = "sys_event";

/// Filter for [`WorldQueryService::query_entities`].
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    pub entity_type: Option<EntityType>,
    /// Entities must carry all of these.
    pub include_tags: Vec<String>,
    /// Entities must carry none of these.
    pub exclude_tags: Vec<String>,
    pub limit: Option<usize>,
}

/// Summary of what a world contains, for tooling.
#[derive(Debug, Clone, Serialize)]
pub struct WorldMetadata {
    pub entity_counts: BTreeMap<EntityType, usize>,
    pub tags: BTreeSet<String>,
    pub relation_types: Vec<String>,
}

/// Gateway over a [`WorldGraph`].
#[derive(Debug, Clone, Default)]
pub struct WorldQueryService {
    graph: WorldGraph,
}

impl WorldQueryService {
    pub fn new(graph: WorldGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &WorldGraph {
        &self.graph
    }

    pub fn into_graph(self) -> WorldGraph {
        self.graph
    }

    // --- Entities ---

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.graph.entity(id)
    }

    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.graph.entity_mut(id)
    }

    /// Insert or overwrite an entity.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        self.graph.add_entity(entity)
    }

    pub fn ids_of_type(&self, entity_type: EntityType) -> Vec<EntityId> {
        self.graph.ids_of_type(entity_type)
    }

    /// Direct descendants of `parent`, excluding `inactive` ones.
    pub fn children(&self, parent: &EntityId, entity_type: Option<EntityType>) -> Vec<EntityId> {
        self.graph
            .entities()
            .filter(|e| e.parent_id.as_ref() == Some(parent))
            .filter(|e| e.is_active())
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .map(|e| e.id.clone())
            .collect()
    }

    /// All descendants of `parent` at any depth, including inactive ones.
    pub fn descendants(&self, parent: &EntityId) -> Vec<EntityId> {
        let mut found = Vec::new();
        let mut frontier = vec![parent.clone()];
        while let Some(current) = frontier.pop() {
            for entity in self.graph.entities() {
                if entity.parent_id.as_ref() == Some(&current) && !found.contains(&entity.id) {
                    found.push(entity.id.clone());
                    frontier.push(entity.id.clone());
                }
            }
        }
        found
    }

    /// Living factions directly inside `location` that are not absorbed or fled.
    pub fn resident_factions(&self, location: &EntityId) -> Vec<EntityId> {
        self.children(location, Some(EntityType::Faction))
            .into_iter()
            .filter(|id| {
                self.entity(id).map_or(false, |f| {
                    f.is_alive() && !f.has_any_tag(&[keys::TAG_ABSORBED, keys::TAG_FLED])
                })
            })
            .collect()
    }

    /// Parent chain of an entity, nearest first.
    pub fn lineage(&self, id: &EntityId) -> Vec<EntityId> {
        let mut chain = Vec::new();
        let mut current = self.entity(id).and_then(|e| e.parent_id.clone());
        while let Some(parent) = current {
            if chain.len() >= MAX_PARENT_DEPTH || chain.contains(&parent) {
                break;
            }
            current = self.entity(&parent).and_then(|e| e.parent_id.clone());
            chain.push(parent);
        }
        chain
    }

    /// The biome containing an entity, or the entity itself if it is a biome.
    pub fn biome_of(&self, id: &EntityId) -> Option<EntityId> {
        if self.entity(id)?.entity_type == EntityType::Biome {
            return Some(id.clone());
        }
        self.lineage(id)
            .into_iter()
            .find(|p| self.is_type(p, EntityType::Biome))
    }

    /// The nearest Location among an entity's ancestors.
    pub fn location_of(&self, id: &EntityId) -> Option<EntityId> {
        self.lineage(id)
            .into_iter()
            .find(|p| self.is_type(p, EntityType::Location))
    }

    pub fn is_type(&self, id: &EntityId, entity_type: EntityType) -> bool {
        self.entity(id).map_or(false, |e| e.entity_type == entity_type)
    }

    /// Entities matching a type and tag filter, in id order.
    pub fn query_entities(&self, query: &EntityQuery) -> Vec<&Entity> {
        self.graph
            .entities()
            .filter(|e| query.entity_type.map_or(true, |t| e.entity_type == t))
            .filter(|e| query.include_tags.iter().all(|t| e.has_tag(t)))
            .filter(|e| !query.exclude_tags.iter().any(|t| e.has_tag(t)))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    pub fn world_metadata(&self) -> WorldMetadata {
        let mut entity_counts = BTreeMap::new();
        let mut tags = BTreeSet::new();
        for entity in self.graph.entities() {
            *entity_counts.entry(entity.entity_type).or_insert(0) += 1;
            tags.extend(entity.tags.iter().cloned());
        }
        WorldMetadata {
            entity_counts,
            tags,
            relation_types: self
                .graph
                .relation_types()
                .map(|rt| rt.id.to_string())
                .collect(),
        }
    }

    /// Presentation copy of the graph without entities carrying `exclude_tags`.
    pub fn graph_snapshot(&self, exclude_tags: &[&str]) -> GraphSnapshot {
        self.graph.filtered(exclude_tags)
    }

    // --- Tags and limits ---

    /// Add and remove tags on an entity. Unknown ids are logged and ignored.
    pub fn update_tags(&mut self, id: &EntityId, add: &[&str], remove: &[&str]) -> bool {
        let Some(entity) = self.graph.entity_mut(id) else {
            warn!(entity = %id, "update_tags on unknown entity");
            return false;
        };
        for tag in remove {
            entity.remove_tag(tag);
        }
        for tag in add {
            entity.add_tag(*tag);
        }
        true
    }

    /// Fail with `CapacityExceeded` when `parent` cannot take another live
    /// child of `child_type`.
    ///
    /// Locations count against the parent's `capacity`, everything else against
    /// its `limits` entry. `default_limit` applies when neither is set; `None`
    /// there means unlimited.
    pub fn ensure_room(
        &self,
        parent: &EntityId,
        child_type: EntityType,
        default_limit: Option<u32>,
    ) -> Result<()> {
        let entity = self
            .entity(parent)
            .ok_or_else(|| WorldError::EntityNotFound(parent.clone()))?;
        let declared = if child_type == EntityType::Location {
            entity.capacity
        } else {
            self.limit(parent, child_type)
        };
        let Some(capacity) = declared.or(default_limit) else {
            return Ok(());
        };
        if self.children(parent, Some(child_type)).len() as u32 >= capacity {
            return Err(WorldError::CapacityExceeded {
                parent: parent.clone(),
                capacity,
            });
        }
        Ok(())
    }

    /// Occupancy limit for a type declared in a location's `limits` payload.
    pub fn limit(&self, location: &EntityId, entity_type: EntityType) -> Option<u32> {
        self.entity(location)?
            .data
            .get(keys::LIMITS)?
            .get(entity_type.to_string())?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
    }

    // --- Relations ---

    /// Register a relation type at runtime.
    pub fn register_relation_type(
        &mut self,
        id: &str,
        description: &str,
        from_type: EntityType,
        to_type: EntityType,
        is_symmetric: bool,
    ) -> Result<()> {
        self.graph.register_relation_type(RelationType::new(
            id,
            from_type,
            to_type,
            description,
            is_symmetric,
        ))
    }

    /// Add a relation. Returns `Ok(false)` when the write was skipped because
    /// an id or the relation type is unknown.
    pub fn add_relation(&mut self, from: &EntityId, to: &EntityId, kind: &RelationKind) -> Result<bool> {
        match self.graph.add_relation(from, to, kind) {
            Ok(()) => Ok(true),
            Err(err) if err.is_soft() => {
                warn!(%from, %to, relation = %kind, error = %err, "relation skipped");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub fn has_relation(&self, from: &EntityId, to: &EntityId, kind: &RelationKind) -> bool {
        self.graph.has_relation(from, to, kind)
    }

    pub fn remove_outgoing(&mut self, from: &EntityId, kind: &RelationKind) -> usize {
        self.graph.remove_outgoing(from, kind)
    }

    /// Targets of an entity's outgoing edges of one kind.
    pub fn targets(&self, from: &EntityId, kind: &RelationKind) -> Vec<EntityId> {
        self.graph
            .outgoing(from, Some(kind))
            .map(|r| r.to_id.clone())
            .collect()
    }

    /// Sources of an entity's incoming edges of one kind.
    pub fn sources(&self, to: &EntityId, kind: &RelationKind) -> Vec<EntityId> {
        self.graph
            .incoming(to, Some(kind))
            .map(|r| r.from_id.clone())
            .collect()
    }

    // --- Faction helpers ---

    /// The belief a faction follows, via its first `believes_in` edge.
    pub fn belief_of(&self, faction: &EntityId) -> Option<EntityId> {
        self.targets(faction, &RelationKind::BelievesIn).into_iter().next()
    }

    /// Living factions following a belief.
    pub fn factions_by_belief(&self, belief: &EntityId) -> Vec<EntityId> {
        self.sources(belief, &RelationKind::BelievesIn)
            .into_iter()
            .filter(|f| self.entity(f).map_or(false, Entity::is_alive))
            .collect()
    }

    /// The living character leading a faction.
    pub fn leader_of(&self, faction: &EntityId) -> Option<EntityId> {
        self.sources(faction, &RelationKind::Leads)
            .into_iter()
            .find(|c| self.entity(c).map_or(false, Entity::is_alive))
    }

    /// Base culture plus belief modifiers plus the living leader's profile.
    pub fn effective_culture(&self, faction: &EntityId) -> CultureVector {
        let Some(entity) = self.entity(faction) else {
            return CultureVector::default();
        };
        let mut culture = entity.culture();

        if let Some(belief) = self.belief_of(faction).and_then(|b| self.entity(&b)) {
            if let Some(modifiers) = belief.data.get(keys::MODIFIERS).and_then(CultureVector::from_value) {
                culture = culture.add(&modifiers);
            }
        }
        if let Some(leader) = self.leader_of(faction).and_then(|l| self.entity(&l)) {
            culture = culture.add(&leader.culture());
        }
        culture.clamped()
    }

    // --- Spatial ---

    /// Reparent an entity and replace its outgoing `kind` edge with one to the new parent.
    ///
    /// The edge is validated before anything changes, so a rejected move
    /// leaves the graph untouched. On success the entity gets a free slot
    /// among its new siblings.
    pub fn move_entity<R: Rng>(
        &mut self,
        id: &EntityId,
        new_parent: &EntityId,
        kind: &RelationKind,
        rng: &mut R,
    ) -> Result<()> {
        let entity = self
            .graph
            .entity(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))?;
        let parent = self
            .graph
            .entity(new_parent)
            .ok_or_else(|| WorldError::EntityNotFound(new_parent.clone()))?;
        let relation_type = self
            .graph
            .relation_type(kind)
            .ok_or_else(|| WorldError::UnknownRelationType(kind.to_string()))?;
        RelationInstance::new(entity, parent, relation_type)?;

        self.graph.remove_outgoing(id, kind);
        if let Some(entity) = self.graph.entity_mut(id) {
            entity.parent_id = Some(new_parent.clone());
        }
        self.graph.add_relation(id, new_parent, kind)?;
        self.assign_slot(id, rng);

        debug!(entity = %id, parent = %new_parent, relation = %kind, "entity moved");
        Ok(())
    }

    /// Give an entity a free slot inside its parent and cache its coordinates.
    pub fn assign_slot<R: Rng>(&mut self, id: &EntityId, rng: &mut R) -> Option<u32> {
        let parent_id = self.entity(id)?.parent_id.clone()?;
        let parent = self.entity(&parent_id)?;

        let is_biome = parent.entity_type == EntityType::Biome;
        let capacity = parent
            .capacity
            .or_else(|| self.limit(&parent_id, EntityType::Faction))
            .unwrap_or(if is_biome { DEFAULT_BIOME_SLOTS } else { DEFAULT_SLOTS });
        let pattern = if is_biome { SlotPattern::Grid } else { SlotPattern::Ring };
        let parent_coord = parent
            .data_point(keys::ABS_COORD)
            .or_else(|| parent.data_point(keys::COORD));

        let occupied: Vec<u32> = self
            .children(&parent_id, None)
            .iter()
            .filter(|sibling| *sibling != id)
            .filter_map(|sibling| self.entity(sibling)?.data_u32(keys::SLOT_INDEX))
            .collect();

        let index = free_slot_index(capacity, &occupied, rng)?;
        let positions = slot_positions(capacity, pattern, rng);
        let local = positions.get(index as usize).copied().unwrap_or((0.5, 0.5));

        let entity = self.graph.entity_mut(id)?;
        entity.set_data(keys::SLOT_INDEX, index);
        entity.set_data(keys::LOCAL_COORD, vec![local.0, local.1]);
        if let Some(origin) = parent_coord {
            let (x, y) = absolute_coord(origin, local);
            entity.set_data(keys::ABS_COORD, vec![x, y]);
        }
        Some(index)
    }

    // --- Events ---

    /// Create an Event entity and link it to its participants.
    ///
    /// The location is taken from the `EventSpec`, else the primary entity if it is
    /// a location, else the primary's location, else the first location among
    /// the secondaries. Factions get `affected_by`, characters `featured_in`,
    /// and the event itself `occurred_at` its location.
    pub fn register_event<R: Rng>(&mut self, spec: EventSpec, epoch: u32, rng: &mut R) -> EventRecord {
        let location = spec.location.clone().or_else(|| self.infer_event_location(&spec));
        let participants = spec.participants();

        let id = EntityId::generate(EntityType::Event.id_prefix(), rng);
        let mut event = Entity::new(
            id.clone(),
            EntityType::Event,
            EVENT_DEFINITION,
            format!("Epoch {epoch}: {}", spec.summary),
        )
        .created_at(epoch)
        .with_data(keys::EPOCH, epoch)
        .with_data(keys::EVENT_KIND, spec.kind.as_str())
        .with_data(keys::SUMMARY, spec.summary.clone())
        .with_data(keys::PARTICIPANTS, ids_to_value(&participants));
        if let Some(location) = &location {
            event.set_data(keys::LOCATION_ID, location.as_str());
        }
        for (key, value) in spec.data {
            event.data.insert(key, value);
        }
        self.graph.add_entity(event);

        for participant in &participants {
            let kind = match self.entity(participant).map(|e| e.entity_type) {
                Some(EntityType::Faction) => RelationKind::AffectedBy,
                Some(EntityType::Character) => RelationKind::FeaturedIn,
                _ => continue,
            };
            self.link_soft(participant, &id, &kind);
        }
        if let Some(location) = &location {
            self.link_soft(&id, location, &RelationKind::OccurredAt);
        }

        debug!(epoch, kind = %spec.kind, event = %id, "event registered");
        EventRecord {
            id: Some(id),
            kind: spec.kind,
            epoch,
            summary: spec.summary,
            location_id: location,
            participants,
            importance: None,
        }
    }

    fn infer_event_location(&self, spec: &EventSpec) -> Option<EntityId> {
        if let Some(primary) = &spec.primary {
            if self.is_type(primary, EntityType::Location) {
                return Some(primary.clone());
            }
            if let Some(location) = self.location_of(primary) {
                return Some(location);
            }
        }
        spec.secondary
            .iter()
            .find(|id| self.is_type(id, EntityType::Location))
            .cloned()
    }

    /// Add an edge whose typing is guaranteed by the caller; failures are only logged.
    fn link_soft(&mut self, from: &EntityId, to: &EntityId, kind: &RelationKind) {
        if let Err(err) = self.graph.add_relation(from, to, kind) {
            warn!(%from, %to, relation = %kind, error = %err, "event link skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn id(raw: &str) -> EntityId {
        EntityId::from_raw(raw)
    }

    /// Biome -> two locations, a faction with a leader in the first.
    fn small_world() -> WorldQueryService {
        let mut graph = WorldGraph::with_builtin_relation_types();
        graph.add_entity(
            Entity::new(id("bio_1"), EntityType::Biome, "bio_plains", "Plains")
                .with_capacity(5)
                .with_data(keys::COORD, vec![2.0, 3.0]),
        );
        for loc in ["loc_1", "loc_2"] {
            graph.add_entity(
                Entity::new(id(loc), EntityType::Location, "loc_hamlet", loc)
                    .with_parent(id("bio_1"))
                    .with_data(keys::ABS_COORD, vec![2.0, 3.0])
                    .with_data(keys::LIMITS, json!({ "Faction": 2, "Resource": 1 })),
            );
        }
        graph.add_entity(
            Entity::new(id("fac_1"), EntityType::Faction, "fac_humans", "Wardens")
                .with_parent(id("loc_1"))
                .with_culture(&CultureVector::new(2, 0, 0)),
        );
        graph.add_entity(
            Entity::new(id("chr_1"), EntityType::Character, "char_leader", "Aldo")
                .with_parent(id("fac_1"))
                .with_culture(&CultureVector::new(3, 1, 0)),
        );
        graph.add_relation(&id("chr_1"), &id("fac_1"), &RelationKind::Leads).unwrap();
        WorldQueryService::new(graph)
    }

    #[test]
    fn test_children_excludes_inactive() {
        let mut world = small_world();
        assert_eq!(world.children(&id("bio_1"), Some(EntityType::Location)).len(), 2);

        world.update_tags(&id("loc_2"), &[keys::TAG_INACTIVE], &[]);
        assert_eq!(world.children(&id("bio_1"), None), vec![id("loc_1")]);
        assert!(!world.update_tags(&id("loc_404"), &["x"], &[]));
    }

    #[test]
    fn test_ensure_room() {
        let mut world = small_world();
        world.ensure_room(&id("bio_1"), EntityType::Location, None).unwrap();
        world.ensure_room(&id("loc_1"), EntityType::Faction, None).unwrap();

        world.entity_mut(&id("bio_1")).unwrap().capacity = Some(2);
        let full = world.ensure_room(&id("bio_1"), EntityType::Location, None);
        assert!(matches!(full, Err(WorldError::CapacityExceeded { capacity: 2, .. })));
        assert!(full.unwrap_err().is_soft());

        // no Character limit declared, so the fallback decides
        world.ensure_room(&id("loc_1"), EntityType::Character, None).unwrap();
        world.ensure_room(&id("fac_1"), EntityType::Character, Some(2)).unwrap();
        assert!(world.ensure_room(&id("fac_1"), EntityType::Character, Some(1)).is_err());
        assert!(matches!(
            world.ensure_room(&id("loc_9"), EntityType::Faction, None),
            Err(WorldError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_location_and_biome_lookup() {
        let world = small_world();
        assert_eq!(world.location_of(&id("chr_1")), Some(id("loc_1")));
        assert_eq!(world.biome_of(&id("chr_1")), Some(id("bio_1")));
        assert_eq!(world.biome_of(&id("bio_1")), Some(id("bio_1")));
        assert_eq!(world.lineage(&id("chr_1")), vec![id("fac_1"), id("loc_1"), id("bio_1")]);
        assert_eq!(world.limit(&id("loc_1"), EntityType::Faction), Some(2));
        assert_eq!(world.limit(&id("loc_1"), EntityType::Character), None);
    }

    #[test]
    fn test_add_relation_soft_failures() {
        let mut world = small_world();
        assert!(!world
            .add_relation(&id("fac_1"), &id("loc_1"), &RelationKind::from("haunts"))
            .unwrap());
        assert!(!world
            .add_relation(&id("fac_9"), &id("loc_1"), &RelationKind::FactionLocatedIn)
            .unwrap());
        assert!(world
            .add_relation(&id("loc_1"), &id("fac_1"), &RelationKind::FactionLocatedIn)
            .is_err());
    }

    #[test]
    fn test_effective_culture_includes_leader_and_belief() {
        let mut world = small_world();
        world.add_entity(
            Entity::new(id("bel_1"), EntityType::Belief, "bel_sun", "Sun Cult")
                .with_data(keys::MODIFIERS, CultureVector::new(0, 4, 1).to_value()),
        );
        world.add_relation(&id("fac_1"), &id("bel_1"), &RelationKind::BelievesIn).unwrap();

        let culture = world.effective_culture(&id("fac_1"));
        assert_eq!(culture, CultureVector::new(5, 5, 1));
        assert_eq!(world.factions_by_belief(&id("bel_1")), vec![id("fac_1")]);
    }

    #[test]
    fn test_move_entity_replaces_relation() {
        let mut world = small_world();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        world.add_relation(&id("fac_1"), &id("loc_1"), &RelationKind::FactionLocatedIn).unwrap();

        world
            .move_entity(&id("fac_1"), &id("loc_2"), &RelationKind::FactionLocatedIn, &mut rng)
            .unwrap();

        let faction = world.entity(&id("fac_1")).unwrap();
        assert_eq!(faction.parent_id, Some(id("loc_2")));
        assert_eq!(faction.data_u32(keys::SLOT_INDEX), Some(0));
        assert!(faction.data_point(keys::ABS_COORD).is_some());
        assert_eq!(world.targets(&id("fac_1"), &RelationKind::FactionLocatedIn), vec![id("loc_2")]);
    }

    #[test]
    fn test_move_entity_rejects_bad_relation_untouched() {
        let mut world = small_world();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let result = world.move_entity(&id("fac_1"), &id("loc_2"), &RelationKind::LocatedIn, &mut rng);
        assert!(matches!(result, Err(WorldError::TypeMismatch { .. })));
        assert_eq!(world.entity(&id("fac_1")).unwrap().parent_id, Some(id("loc_1")));
    }

    #[test]
    fn test_slots_are_distinct_among_siblings() {
        let mut world = small_world();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        world.add_entity(
            Entity::new(id("fac_2"), EntityType::Faction, "fac_humans", "Pilgrims").with_parent(id("loc_1")),
        );
        let first = world.assign_slot(&id("fac_1"), &mut rng).unwrap();
        let second = world.assign_slot(&id("fac_2"), &mut rng).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_register_event_infers_location_and_links() {
        let mut world = small_world();
        let mut rng = ChaCha8Rng::seed_from_u64(8);

        let record = world.register_event(
            EventSpec::new(EventKind::LeaderDeath, "Aldo has died")
                .primary(&id("chr_1"))
                .secondary(&id("fac_1")),
            3,
            &mut rng,
        );

        assert_eq!(record.location_id, Some(id("loc_1")));
        assert_eq!(record.participants, vec![id("chr_1"), id("fac_1")]);
        let event_id = record.id.unwrap();
        let event = world.entity(&event_id).unwrap();
        assert_eq!(event.name, "Epoch 3: Aldo has died");
        assert_eq!(event.data_str(keys::EVENT_KIND), Some("leader_death"));
        assert!(world.has_relation(&id("fac_1"), &event_id, &RelationKind::AffectedBy));
        assert!(world.has_relation(&id("chr_1"), &event_id, &RelationKind::FeaturedIn));
        assert!(world.has_relation(&event_id, &id("loc_1"), &RelationKind::OccurredAt));
    }

    #[test]
    fn test_query_entities_filters() {
        let mut world = small_world();
        world.update_tags(&id("loc_1"), &["ruins"], &[]);

        let query = EntityQuery {
            entity_type: Some(EntityType::Location),
            exclude_tags: vec!["ruins".into()],
            ..Default::default()
        };
        let found: Vec<_> = world.query_entities(&query).iter().map(|e| e.id.clone()).collect();
        assert_eq!(found, vec![id("loc_2")]);

        let metadata = world.world_metadata();
        assert_eq!(metadata.entity_counts[&EntityType::Location], 2);
        assert!(metadata.tags.contains("ruins"));
        assert!(metadata.relation_types.contains(&"leads".to_string()));
    }

    #[test]
    fn test_graph_snapshot_drops_tagged_entities() {
        let mut world = small_world();
        world.update_tags(&id("chr_1"), &[keys::TAG_DEAD], &[]);

        let snapshot = world.graph_snapshot(&[keys::TAG_DEAD]);

        assert!(!snapshot.entities.contains_key(&id("chr_1")));
        assert!(snapshot.entities.contains_key(&id("fac_1")));
        assert!(snapshot.relations.iter().all(|r| !r.touches(&id("chr_1"))));
    }
}
