//! Narrative events emitted by the simulation systems.
//!
//! Every system returns the [`EventRecord`]s it produced; the matching Event
//! entities live in the world graph so later epochs can reference them.

mod importance;

pub use importance::*;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use world_rules::EntityId;

/// What happened. Serialized in snake_case, e.g. `leader_death`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LeaderDeath,
    LeaderAppointed,
    LeaderFate,
    ResourceDepleted,
    ResourceRegrowth,
    ResourceDiscovered,
    Famine,
    ReligionFounded,
    ReligionConversion,
    ReligionAdopted,
    GlobalWarStart,
    CivilWarStart,
    ConflictStart,
    RaidStart,
    BossSpawn,
    ConflictResolved,
    RaidSuccessLoot,
    RaidSuccessPlunder,
    RaidRepelled,
    NatureReclaim,
    Transformation,
    Discovery,
    Expansion,
    CriticalError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LeaderDeath => "leader_death",
            EventKind::LeaderAppointed => "leader_appointed",
            EventKind::LeaderFate => "leader_fate",
            EventKind::ResourceDepleted => "resource_depleted",
            EventKind::ResourceRegrowth => "resource_regrowth",
            EventKind::ResourceDiscovered => "resource_discovered",
            EventKind::Famine => "famine",
            EventKind::ReligionFounded => "religion_founded",
            EventKind::ReligionConversion => "religion_conversion",
            EventKind::ReligionAdopted => "religion_adopted",
            EventKind::GlobalWarStart => "global_war_start",
            EventKind::CivilWarStart => "civil_war_start",
            EventKind::ConflictStart => "conflict_start",
            EventKind::RaidStart => "raid_start",
            EventKind::BossSpawn => "boss_spawn",
            EventKind::ConflictResolved => "conflict_resolved",
            EventKind::RaidSuccessLoot => "raid_success_loot",
            EventKind::RaidSuccessPlunder => "raid_success_plunder",
            EventKind::RaidRepelled => "raid_repelled",
            EventKind::NatureReclaim => "nature_reclaim",
            EventKind::Transformation => "transformation",
            EventKind::Discovery => "discovery",
            EventKind::Expansion => "expansion",
            EventKind::CriticalError => "critical_error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the epoch's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Id of the Event entity in the graph. Synthetic records have none.
    pub id: Option<EntityId>,
    pub kind: EventKind,
    pub epoch: u32,
    pub summary: String,
    pub location_id: Option<EntityId>,
    pub participants: Vec<EntityId>,
    /// Filled in by the optional importance pass.
    pub importance: Option<Importance>,
}

impl EventRecord {
    /// A record that has no Event entity behind it, such as an epoch failure.
    pub fn synthetic(kind: EventKind, epoch: u32, summary: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            epoch,
            summary: summary.into(),
            location_id: None,
            participants: Vec::new(),
            importance: None,
        }
    }
}

/// Everything needed to register an event in the graph.
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub kind: EventKind,
    pub summary: String,
    pub primary: Option<EntityId>,
    pub secondary: Vec<EntityId>,
    /// Explicit location; inferred from the participants when absent.
    pub location: Option<EntityId>,
    pub data: Vec<(String, Value)>,
}

impl EventSpec {
    pub fn new(kind: EventKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            primary: None,
            secondary: Vec::new(),
            location: None,
            data: Vec::new(),
        }
    }

    pub fn primary(mut self, id: &EntityId) -> Self {
        self.primary = Some(id.clone());
        self
    }

    pub fn secondary(mut self, id: &EntityId) -> Self {
        self.secondary.push(id.clone());
        self
    }

    pub fn location(mut self, id: &EntityId) -> Self {
        self.location = Some(id.clone());
        self
    }

    pub fn data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.push((key.to_string(), value.into()));
        self
    }

    /// Primary followed by secondaries, without duplicates.
    pub fn participants(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = Vec::new();
        for id in self.primary.iter().chain(self.secondary.iter()) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}
