//! World graph - the central structure holding every entity and relation.

mod relation;
mod snapshot;

pub use relation::*;
pub use snapshot::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::entities::{Entity, EntityId, EntityType};
use crate::error::{Result, WorldError};

/// Typed entity store plus typed relation store.
///
/// Entities live in a single table keyed by id. Relations only hold ids and
/// are resolved through that table, so every lookup of an endpoint returns the
/// very record held by the table. Invariant: every relation's endpoints exist
/// and match its relation type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphSnapshot", into = "GraphSnapshot")]
pub struct WorldGraph {
    entities: BTreeMap<EntityId, Entity>,
    relation_types: BTreeMap<RelationKind, RelationType>,
    relations: Vec<RelationInstance>,
}

impl WorldGraph {
    /// Create a new empty graph with no relation types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph with every builtin relation type registered.
    pub fn with_builtin_relation_types() -> Self {
        let mut graph = Self::new();
        graph.register_builtin_relation_types();
        graph
    }

    // --- Entities ---

    /// Insert an entity, overwriting any previous record with the same id.
    ///
    /// When the overwrite changes the entity's type, every relation touching
    /// the id is dropped, since its endpoints no longer match their types.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id.clone();
        let entity_type = entity.entity_type;
        let previous = self.entities.insert(id.clone(), entity);
        if let Some(previous) = previous.filter(|p| p.entity_type != entity_type) {
            let dropped = self.remove_relations_where(|r| r.from_id == id || r.to_id == id);
            debug!(%id, from = ?previous.entity_type, to = ?entity_type, dropped, "entity retyped");
        }
        id
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// All entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entities_of_type(&self, entity_type: EntityType) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |e| e.entity_type == entity_type)
    }

    /// Ids of all entities of a type, collected so callers may mutate while iterating.
    pub fn ids_of_type(&self, entity_type: EntityType) -> Vec<EntityId> {
        self.entities_of_type(entity_type)
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // --- Relation types ---

    /// Register a relation type.
    ///
    /// Re-registering an identical declaration is a no-op; changing the
    /// endpoints of an existing id is rejected.
    pub fn register_relation_type(&mut self, relation_type: RelationType) -> Result<()> {
        if let Some(existing) = self.relation_types.get(&relation_type.id) {
            if existing.from_type == relation_type.from_type
                && existing.to_type == relation_type.to_type
            {
                return Ok(());
            }
            return Err(WorldError::DuplicateRelationType(
                relation_type.id.to_string(),
            ));
        }
        self.relation_types
            .insert(relation_type.id.clone(), relation_type);
        Ok(())
    }

    /// Register every builtin relation type that is not registered yet.
    pub fn register_builtin_relation_types(&mut self) {
        for kind in RelationKind::BUILTIN.iter() {
            if let Some(relation_type) = RelationType::builtin(kind) {
                self.relation_types
                    .entry(kind.clone())
                    .or_insert(relation_type);
            }
        }
    }

    pub fn relation_type(&self, kind: &RelationKind) -> Option<&RelationType> {
        self.relation_types.get(kind)
    }

    pub fn relation_types(&self) -> impl Iterator<Item = &RelationType> {
        self.relation_types.values()
    }

    // --- Relations ---

    /// Add a typed edge between two existing entities.
    ///
    /// Adding an edge that already exists is a no-op.
    pub fn add_relation(&mut self, from: &EntityId, to: &EntityId, kind: &RelationKind) -> Result<()> {
        let relation_type = self
            .relation_types
            .get(kind)
            .ok_or_else(|| WorldError::UnknownRelationType(kind.to_string()))?;
        let from_entity = self
            .entities
            .get(from)
            .ok_or_else(|| WorldError::EntityNotFound(from.clone()))?;
        let to_entity = self
            .entities
            .get(to)
            .ok_or_else(|| WorldError::EntityNotFound(to.clone()))?;

        let instance = RelationInstance::new(from_entity, to_entity, relation_type)?;
        if !self.relations.contains(&instance) {
            self.relations.push(instance);
        }
        Ok(())
    }

    /// Whether an edge of `kind` connects the two entities, honoring symmetry.
    pub fn has_relation(&self, from: &EntityId, to: &EntityId, kind: &RelationKind) -> bool {
        let symmetric = self
            .relation_types
            .get(kind)
            .map(|rt| rt.is_symmetric)
            .unwrap_or(false);

        self.relations.iter().any(|r| {
            &r.relation_type == kind
                && ((&r.from_id == from && &r.to_id == to)
                    || (symmetric && &r.from_id == to && &r.to_id == from))
        })
    }

    /// Remove every relation matching `predicate`, returning how many were dropped.
    pub fn remove_relations_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&RelationInstance) -> bool,
    {
        let before = self.relations.len();
        self.relations.retain(|r| !predicate(r));
        before - self.relations.len()
    }

    /// Remove the outgoing edges of one kind from an entity.
    pub fn remove_outgoing(&mut self, from: &EntityId, kind: &RelationKind) -> usize {
        self.remove_relations_where(|r| &r.from_id == from && &r.relation_type == kind)
    }

    pub fn relations(&self) -> &[RelationInstance] {
        &self.relations
    }

    /// Outgoing edges of an entity, optionally restricted to one kind.
    pub fn outgoing<'a>(
        &'a self,
        from: &'a EntityId,
        kind: Option<&'a RelationKind>,
    ) -> impl Iterator<Item = &'a RelationInstance> + 'a {
        self.relations.iter().filter(move |r| {
            &r.from_id == from && kind.map_or(true, |k| &r.relation_type == k)
        })
    }

    /// Incoming edges of an entity, optionally restricted to one kind.
    pub fn incoming<'a>(
        &'a self,
        to: &'a EntityId,
        kind: Option<&'a RelationKind>,
    ) -> impl Iterator<Item = &'a RelationInstance> + 'a {
        self.relations
            .iter()
            .filter(move |r| &r.to_id == to && kind.map_or(true, |k| &r.relation_type == k))
    }

    /// Resolve both endpoints of an edge through the entity table.
    pub fn resolve(&self, relation: &RelationInstance) -> Option<(&Entity, &Entity)> {
        Some((
            self.entities.get(&relation.from_id)?,
            self.entities.get(&relation.to_id)?,
        ))
    }

    // --- Persistence ---

    /// Serialize the graph to the `{entities, relation_types, relations}` JSON layout.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a graph, validating every relation against its declared type.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)?;
        Self::try_from(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn graph_with(entities: &[(&str, EntityType)]) -> WorldGraph {
        let mut graph = WorldGraph::with_builtin_relation_types();
        for (id, entity_type) in entities {
            graph.add_entity(Entity::new(EntityId::from_raw(*id), *entity_type, "def", *id));
        }
        graph
    }

    fn id(raw: &str) -> EntityId {
        EntityId::from_raw(raw)
    }

    #[test]
    fn test_add_entity_overwrites() {
        let mut graph = graph_with(&[("loc_1", EntityType::Location)]);
        let mut replacement = Entity::new(id("loc_1"), EntityType::Location, "loc_ruins", "Ruins");
        replacement.add_tag("ruins");
        graph.add_entity(replacement);

        assert_eq!(graph.entity_count(), 1);
        assert_eq!(graph.entity(&id("loc_1")).unwrap().name, "Ruins");
    }

    #[test]
    fn test_retyped_entity_loses_its_relations() {
        let mut graph = graph_with(&[
            ("fac_1", EntityType::Faction),
            ("fac_2", EntityType::Faction),
            ("loc_1", EntityType::Location),
        ]);
        graph
            .add_relation(&id("fac_1"), &id("loc_1"), &RelationKind::FactionLocatedIn)
            .unwrap();
        graph
            .add_relation(&id("fac_2"), &id("loc_1"), &RelationKind::FactionLocatedIn)
            .unwrap();

        // same type keeps its edges
        graph.add_entity(Entity::new(id("fac_2"), EntityType::Faction, "def", "Renamed"));
        assert_eq!(graph.relations().len(), 2);

        graph.add_entity(Entity::new(id("fac_1"), EntityType::Character, "def", "fac_1"));
        assert_eq!(graph.relations().len(), 1);
        assert_eq!(graph.outgoing(&id("fac_1"), None).count(), 0);

        let reloaded = WorldGraph::from_json(&graph.to_json().unwrap()).unwrap();
        assert_eq!(reloaded.relations().len(), 1);
    }

    #[test]
    fn test_add_relation_validates() {
        let mut graph = graph_with(&[
            ("fac_1", EntityType::Faction),
            ("loc_1", EntityType::Location),
        ]);

        graph
            .add_relation(&id("fac_1"), &id("loc_1"), &RelationKind::FactionLocatedIn)
            .unwrap();
        // duplicate edges are collapsed
        graph
            .add_relation(&id("fac_1"), &id("loc_1"), &RelationKind::FactionLocatedIn)
            .unwrap();
        assert_eq!(graph.relations().len(), 1);

        let mismatch = graph.add_relation(&id("loc_1"), &id("fac_1"), &RelationKind::FactionLocatedIn);
        assert!(matches!(mismatch, Err(WorldError::TypeMismatch { .. })));

        let unknown = graph.add_relation(&id("fac_1"), &id("loc_1"), &RelationKind::from("haunts"));
        assert!(matches!(unknown, Err(WorldError::UnknownRelationType(_))));

        let missing = graph.add_relation(&id("fac_1"), &id("loc_9"), &RelationKind::FactionLocatedIn);
        assert!(matches!(missing, Err(WorldError::EntityNotFound(_))));
        assert_eq!(graph.relations().len(), 1);
    }

    #[test]
    fn test_symmetric_relation_lookup() {
        let mut graph = graph_with(&[("fac_1", EntityType::Faction), ("fac_2", EntityType::Faction)]);
        graph
            .add_relation(&id("fac_1"), &id("fac_2"), &RelationKind::AlliedWith)
            .unwrap();

        assert!(graph.has_relation(&id("fac_2"), &id("fac_1"), &RelationKind::AlliedWith));
        assert!(!graph.has_relation(&id("fac_2"), &id("fac_1"), &RelationKind::AbsorbedBy));
    }

    #[test]
    fn test_remove_outgoing() {
        let mut graph = graph_with(&[
            ("fac_1", EntityType::Faction),
            ("bel_1", EntityType::Belief),
            ("bel_2", EntityType::Belief),
        ]);
        graph.add_relation(&id("fac_1"), &id("bel_1"), &RelationKind::BelievesIn).unwrap();
        graph.add_relation(&id("bel_1"), &id("bel_2"), &RelationKind::OpposesBelief).unwrap();

        assert_eq!(graph.remove_outgoing(&id("fac_1"), &RelationKind::BelievesIn), 1);
        assert_eq!(graph.relations().len(), 1);
        assert_eq!(graph.incoming(&id("bel_2"), None).count(), 1);
    }

    #[test]
    fn test_register_relation_type_conflict() {
        let mut graph = WorldGraph::new();
        let trade = RelationType::new("trades_with", EntityType::Faction, EntityType::Faction, "", true);
        graph.register_relation_type(trade.clone()).unwrap();
        graph.register_relation_type(trade).unwrap();

        let clash = RelationType::new("trades_with", EntityType::Faction, EntityType::Location, "", false);
        assert!(matches!(
            graph.register_relation_type(clash),
            Err(WorldError::DuplicateRelationType(_))
        ));
    }

    const TYPES: [EntityType; 6] = [
        EntityType::Location,
        EntityType::Resource,
        EntityType::Faction,
        EntityType::Character,
        EntityType::Belief,
        EntityType::Event,
    ];

    proptest! {
        #[test]
        fn prop_relations_always_typed(
            types in prop::collection::vec(0usize..TYPES.len(), 2..12),
            edges in prop::collection::vec((0usize..12, 0usize..12, 0usize..RelationKind::BUILTIN.len()), 0..40),
        ) {
            let mut graph = WorldGraph::with_builtin_relation_types();
            for (i, t) in types.iter().enumerate() {
                graph.add_entity(Entity::new(EntityId::from_raw(format!("e_{i}")), TYPES[*t], "def", "x"));
            }

            for (from, to, kind) in edges {
                let from = EntityId::from_raw(format!("e_{}", from % types.len()));
                let to = EntityId::from_raw(format!("e_{}", to % types.len()));
                let _ = graph.add_relation(&from, &to, &RelationKind::BUILTIN[kind]);
            }

            for relation in graph.relations() {
                let relation_type = graph.relation_type(&relation.relation_type).unwrap();
                let (from, to) = graph.resolve(relation).unwrap();
                prop_assert_eq!(from.entity_type, relation_type.from_type);
                prop_assert_eq!(to.entity_type, relation_type.to_type);
            }
        }
    }
}
