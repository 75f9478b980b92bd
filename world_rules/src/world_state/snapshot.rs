//! Persistence layout of a world graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{RelationInstance, RelationType, WorldGraph};
use crate::entities::{Entity, EntityId};
use crate::error::WorldError;

/// `{entities, relation_types, relations}` as written to disk.
///
/// Loading goes through [`WorldGraph::try_from`], which rebuilds the entity
/// table first and then re-adds each relation by id, so the loaded relations
/// resolve to the table's own records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: BTreeMap<EntityId, Entity>,
    pub relation_types: BTreeMap<String, RelationType>,
    pub relations: Vec<RelationInstance>,
}

impl From<WorldGraph> for GraphSnapshot {
    fn from(graph: WorldGraph) -> Self {
        Self {
            entities: graph.entities,
            relation_types: graph
                .relation_types
                .into_iter()
                .map(|(kind, rt)| (kind.to_string(), rt))
                .collect(),
            relations: graph.relations,
        }
    }
}

impl TryFrom<GraphSnapshot> for WorldGraph {
    type Error = WorldError;

    fn try_from(snapshot: GraphSnapshot) -> Result<Self, Self::Error> {
        let mut graph = WorldGraph::new();
        for (_, entity) in snapshot.entities {
            graph.add_entity(entity);
        }
        for (_, relation_type) in snapshot.relation_types {
            graph.register_relation_type(relation_type)?;
        }
        for relation in snapshot.relations {
            graph.add_relation(&relation.from_id, &relation.to_id, &relation.relation_type)?;
        }
        Ok(graph)
    }
}

impl WorldGraph {
    /// Copy of the graph without entities carrying any of `exclude_tags`,
    /// and without relations touching them.
    pub fn filtered(&self, exclude_tags: &[&str]) -> GraphSnapshot {
        let entities: BTreeMap<EntityId, Entity> = self
            .entities
            .iter()
            .filter(|(_, e)| !e.has_any_tag(exclude_tags))
            .map(|(id, e)| (id.clone(), e.clone()))
            .collect();
        let relations = self
            .relations
            .iter()
            .filter(|r| entities.contains_key(&r.from_id) && entities.contains_key(&r.to_id))
            .cloned()
            .collect();

        GraphSnapshot {
            entities,
            relation_types: self
                .relation_types
                .iter()
                .map(|(kind, rt)| (kind.to_string(), rt.clone()))
                .collect(),
            relations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityType;
    use crate::world_state::RelationKind;

    fn sample_graph() -> WorldGraph {
        let mut graph = WorldGraph::with_builtin_relation_types();
        graph.add_entity(Entity::new(
            EntityId::from_raw("fac_1"),
            EntityType::Faction,
            "fac_elves",
            "Silver Grove",
        ));
        graph.add_entity(
            Entity::new(EntityId::from_raw("loc_1"), EntityType::Location, "loc_town", "Lindon")
                .with_tags(["forest"]),
        );
        graph
            .add_relation(
                &EntityId::from_raw("fac_1"),
                &EntityId::from_raw("loc_1"),
                &RelationKind::FactionLocatedIn,
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_round_trip_shares_entity_records() {
        let json = sample_graph().to_json().unwrap();
        let loaded = WorldGraph::from_json(&json).unwrap();

        assert_eq!(loaded.entity_count(), 2);
        assert_eq!(loaded.relations().len(), 1);

        let relation = &loaded.relations()[0];
        let (from, to) = loaded.resolve(relation).unwrap();
        let table_from = loaded.entity(&EntityId::from_raw("fac_1")).unwrap();
        let table_to = loaded.entity(&EntityId::from_raw("loc_1")).unwrap();
        assert!(std::ptr::eq(from, table_from));
        assert!(std::ptr::eq(to, table_to));
    }

    #[test]
    fn test_snapshot_layout() {
        let value = serde_json::to_value(sample_graph()).unwrap();
        assert!(value["entities"]["fac_1"].is_object());
        assert_eq!(value["entities"]["fac_1"]["type"], "Faction");
        assert_eq!(value["relation_types"]["leads"]["from_type"], "Character");
        assert_eq!(value["relations"][0]["relation_type_id"], "faction_located_in");
    }

    #[test]
    fn test_load_rejects_dangling_relation() {
        let mut value = serde_json::to_value(sample_graph()).unwrap();
        value["relations"][0]["to_id"] = serde_json::Value::String("loc_404".into());
        let err = WorldGraph::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, WorldError::EntityNotFound(_)));
    }

    #[test]
    fn test_filtered_drops_tagged_entities() {
        let snapshot = sample_graph().filtered(&["forest"]);
        assert_eq!(snapshot.entities.len(), 1);
        assert!(snapshot.relations.is_empty());
    }
}
