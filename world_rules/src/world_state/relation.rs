//! Typed relations between entities.

use serde::{Deserialize, Serialize};

use crate::entities::{Entity, EntityId, EntityType};
use crate::error::{Result, WorldError};

/// Identifier of a relation type.
///
/// Every relation the simulation creates has a builtin variant; tooling can
/// register further types at runtime as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationKind {
    LocatedIn,
    FactionLocatedIn,
    Leads,
    Joined,
    InvolvedIn,
    BeliefAtWar,
    ActiveParticipant,
    PartOfGlobal,
    ResolvedAs,
    AffectedBy,
    FeaturedIn,
    OccurredAt,
    AlliedWith,
    FledTo,
    AbsorbedBy,
    ExpandedTo,
    SplinteredFrom,
    BelievesIn,
    OpposesBelief,
    Custom(String),
}

impl RelationKind {
    pub const BUILTIN: [RelationKind; 19] = [
        RelationKind::LocatedIn,
        RelationKind::FactionLocatedIn,
        RelationKind::Leads,
        RelationKind::Joined,
        RelationKind::InvolvedIn,
        RelationKind::BeliefAtWar,
        RelationKind::ActiveParticipant,
        RelationKind::PartOfGlobal,
        RelationKind::ResolvedAs,
        RelationKind::AffectedBy,
        RelationKind::FeaturedIn,
        RelationKind::OccurredAt,
        RelationKind::AlliedWith,
        RelationKind::FledTo,
        RelationKind::AbsorbedBy,
        RelationKind::ExpandedTo,
        RelationKind::SplinteredFrom,
        RelationKind::BelievesIn,
        RelationKind::OpposesBelief,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            RelationKind::LocatedIn => "located_in",
            RelationKind::FactionLocatedIn => "faction_located_in",
            RelationKind::Leads => "leads",
            RelationKind::Joined => "joined",
            RelationKind::InvolvedIn => "involved_in",
            RelationKind::BeliefAtWar => "belief_at_war",
            RelationKind::ActiveParticipant => "active_participant",
            RelationKind::PartOfGlobal => "part_of_global",
            RelationKind::ResolvedAs => "resolved_as",
            RelationKind::AffectedBy => "affected_by",
            RelationKind::FeaturedIn => "featured_in",
            RelationKind::OccurredAt => "occurred_at",
            RelationKind::AlliedWith => "allied_with",
            RelationKind::FledTo => "fled_to",
            RelationKind::AbsorbedBy => "absorbed_by",
            RelationKind::ExpandedTo => "expanded_to",
            RelationKind::SplinteredFrom => "splintered_from",
            RelationKind::BelievesIn => "believes_in",
            RelationKind::OpposesBelief => "opposes_belief",
            RelationKind::Custom(id) => id,
        }
    }

    /// Endpoint types, description and symmetry of a builtin relation.
    fn builtin_signature(&self) -> Option<(EntityType, EntityType, &'static str, bool)> {
        use EntityType::*;
        let signature = match self {
            RelationKind::LocatedIn => (Resource, Location, "Resource is found at a location", false),
            RelationKind::FactionLocatedIn => (Faction, Location, "Faction resides at a location", false),
            RelationKind::Leads => (Character, Faction, "Character leads a faction", false),
            RelationKind::Joined => (Character, Faction, "Character serves a faction", false),
            RelationKind::InvolvedIn => (Faction, Conflict, "Faction takes part in a conflict", false),
            RelationKind::BeliefAtWar => (Belief, GlobalConflict, "Belief wages a holy war", false),
            RelationKind::ActiveParticipant => (Faction, GlobalConflict, "Faction fights in a global war", false),
            RelationKind::PartOfGlobal => (Conflict, GlobalConflict, "Local conflict belongs to a global war", false),
            RelationKind::ResolvedAs => (Conflict, Event, "Conflict ended in an event", false),
            RelationKind::AffectedBy => (Faction, Event, "Faction was affected by an event", false),
            RelationKind::FeaturedIn => (Character, Event, "Character appears in an event", false),
            RelationKind::OccurredAt => (Event, Location, "Event took place at a location", false),
            RelationKind::AlliedWith => (Faction, Faction, "Factions are allied", true),
            RelationKind::FledTo => (Faction, Location, "Faction fled to a location", false),
            RelationKind::AbsorbedBy => (Faction, Faction, "Faction was absorbed by another", false),
            RelationKind::ExpandedTo => (Faction, Location, "Faction founded a branch at a location", false),
            RelationKind::SplinteredFrom => (Faction, Faction, "Branch faction split from its origin", false),
            RelationKind::BelievesIn => (Faction, Belief, "Faction follows a belief", false),
            RelationKind::OpposesBelief => (Belief, Belief, "Beliefs are at odds", true),
            RelationKind::Custom(_) => return None,
        };
        Some(signature)
    }
}

impl From<String> for RelationKind {
    fn from(raw: String) -> Self {
        RelationKind::BUILTIN
            .iter()
            .find(|kind| kind.as_str() == raw)
            .cloned()
            .unwrap_or(RelationKind::Custom(raw))
    }
}

impl From<&str> for RelationKind {
    fn from(raw: &str) -> Self {
        RelationKind::from(raw.to_string())
    }
}

impl From<RelationKind> for String {
    fn from(kind: RelationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares which entity types a relation id may connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationType {
    pub id: RelationKind,
    pub from_type: EntityType,
    pub to_type: EntityType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_symmetric: bool,
}

impl RelationType {
    pub fn new(
        id: impl Into<RelationKind>,
        from_type: EntityType,
        to_type: EntityType,
        description: impl Into<String>,
        is_symmetric: bool,
    ) -> Self {
        Self {
            id: id.into(),
            from_type,
            to_type,
            description: description.into(),
            is_symmetric,
        }
    }

    /// The declaration of a builtin relation, `None` for custom kinds.
    pub fn builtin(kind: &RelationKind) -> Option<Self> {
        kind.builtin_signature()
            .map(|(from, to, description, symmetric)| {
                Self::new(kind.clone(), from, to, description, symmetric)
            })
    }
}

/// A directed edge between two entities, stored by id.
///
/// Endpoints are resolved through the owning graph on every access, so an
/// instance never holds a copy of entity state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInstance {
    pub from_id: EntityId,
    pub to_id: EntityId,
    #[serde(rename = "relation_type_id")]
    pub relation_type: RelationKind,
}

impl RelationInstance {
    /// Build an edge, rejecting endpoints whose types do not match the declaration.
    pub fn new(from: &Entity, to: &Entity, relation_type: &RelationType) -> Result<Self> {
        if from.entity_type != relation_type.from_type || to.entity_type != relation_type.to_type {
            return Err(WorldError::TypeMismatch {
                relation: relation_type.id.to_string(),
                expected_from: relation_type.from_type,
                expected_to: relation_type.to_type,
                actual_from: from.entity_type,
                actual_to: to.entity_type,
            });
        }

        Ok(Self {
            from_id: from.id.clone(),
            to_id: to.id.clone(),
            relation_type: relation_type.id.clone(),
        })
    }

    /// Whether this edge touches `id` at either end.
    pub fn touches(&self, id: &EntityId) -> bool {
        &self.from_id == id || &self.to_id == id
    }
}
