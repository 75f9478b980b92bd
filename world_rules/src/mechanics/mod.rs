//! Simulation mechanics: rarities, conflict states, outcomes and seasons.

use serde::{Deserialize, Serialize};

/// Rarity tiers for resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
        }
    }
}

/// Lifecycle of a Conflict entity: `active -> resolved` or `active -> aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Active,
    Resolved,
    Aborted,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Active => "active",
            ConflictStatus::Resolved => "resolved",
            ConflictStatus::Aborted => "aborted",
        }
    }

    /// Parse a status stored in an entity payload.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(ConflictStatus::Active),
            "resolved" => Some(ConflictStatus::Resolved),
            "aborted" => Some(ConflictStatus::Aborted),
            _ => None,
        }
    }
}

/// How a conflict ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictOutcome {
    Truce,
    Absorption,
    Flight,
    NewSettlement,
    Destruction,
    RaidSuccessLoot,
    RaidSuccessPlunder,
    RaidRepelled,
}

impl ConflictOutcome {
    /// Outcomes available to non-raid conflicts.
    pub const WEIGHTED: [ConflictOutcome; 5] = [
        ConflictOutcome::Truce,
        ConflictOutcome::Absorption,
        ConflictOutcome::Flight,
        ConflictOutcome::NewSettlement,
        ConflictOutcome::Destruction,
    ];

    /// Base weight of a non-raid outcome. Raid outcomes are never drawn by weight.
    pub fn base_weight(&self) -> u32 {
        match self {
            ConflictOutcome::Truce => 20,
            ConflictOutcome::Absorption => 40,
            ConflictOutcome::Flight => 20,
            ConflictOutcome::NewSettlement => 15,
            ConflictOutcome::Destruction => 5,
            _ => 0,
        }
    }

    /// Weight under a religious crusade: no truce, more bloodshed.
    pub fn crusade_weight(&self) -> u32 {
        match self {
            ConflictOutcome::Truce => 0,
            ConflictOutcome::Destruction => self.base_weight() + 15,
            ConflictOutcome::Absorption => self.base_weight() + 5,
            _ => self.base_weight(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictOutcome::Truce => "truce",
            ConflictOutcome::Absorption => "absorption",
            ConflictOutcome::Flight => "flight",
            ConflictOutcome::NewSettlement => "new_settlement",
            ConflictOutcome::Destruction => "destruction",
            ConflictOutcome::RaidSuccessLoot => "raid_success_loot",
            ConflictOutcome::RaidSuccessPlunder => "raid_success_plunder",
            ConflictOutcome::RaidRepelled => "raid_repelled",
        }
    }
}

/// Why two parties came to blows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeReason {
    Resources,
    Power,
    Territory,
    ReligiousCrusade,
    Rebellion,
    Plunder,
    Survival,
}

impl DisputeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeReason::Resources => "resources",
            DisputeReason::Power => "power",
            DisputeReason::Territory => "territory",
            DisputeReason::ReligiousCrusade => "religious_crusade",
            DisputeReason::Rebellion => "rebellion",
            DisputeReason::Plunder => "plunder",
            DisputeReason::Survival => "survival",
        }
    }

    /// Definition id given to Conflict entities spawned for this reason.
    pub fn definition_id(&self) -> String {
        format!("conflict_{}", self.as_str())
    }
}

/// Seasons cycle once every four epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Season {
    #[default]
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Season in effect during `epoch`.
    pub fn for_epoch(epoch: u32) -> Self {
        match epoch % 4 {
            0 => Season::Spring,
            1 => Season::Summer,
            2 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    /// Importance multiplier applied to events recorded in this season.
    pub fn importance_multiplier(&self) -> f64 {
        match self {
            Season::Spring => 1.0,
            Season::Summer => 1.1,
            Season::Autumn => 1.0,
            Season::Winter => 1.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crusade_weights() {
        assert_eq!(ConflictOutcome::Truce.crusade_weight(), 0);
        assert_eq!(ConflictOutcome::Destruction.crusade_weight(), 20);
        assert_eq!(ConflictOutcome::Absorption.crusade_weight(), 45);
        assert_eq!(ConflictOutcome::Flight.crusade_weight(), 20);

        let total: u32 = ConflictOutcome::WEIGHTED.iter().map(|o| o.base_weight()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_status_parse() {
        for status in [
            ConflictStatus::Active,
            ConflictStatus::Resolved,
            ConflictStatus::Aborted,
        ] {
            assert_eq!(ConflictStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConflictStatus::parse("pending"), None);
    }

    #[test]
    fn test_season_cycle() {
        assert_eq!(Season::for_epoch(0), Season::Spring);
        assert_eq!(Season::for_epoch(7), Season::Winter);
        assert!(Season::Winter.importance_multiplier() > Season::Spring.importance_multiplier());
    }

    #[test]
    fn test_dispute_definition_id() {
        assert_eq!(
            DisputeReason::ReligiousCrusade.definition_id(),
            "conflict_religious_crusade"
        );
    }
}
