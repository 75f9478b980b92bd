//! Importance weighting - an optional presentation pass over an epoch's events.

use rand::Rng;
use serde::{Deserialize, Serialize};
use world_rules::Season;

use super::{EventKind, EventRecord};

/// Score at or above which an event is `Major`.
pub const MAJOR_THRESHOLD: f64 = 7.0;
/// Score at or above which an event is `Average`.
pub const AVERAGE_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceTier {
    Major,
    Average,
    Minor,
}

impl ImportanceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= MAJOR_THRESHOLD {
            ImportanceTier::Major
        } else if score >= AVERAGE_THRESHOLD {
            ImportanceTier::Average
        } else {
            ImportanceTier::Minor
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Importance {
    pub score: f64,
    pub tier: ImportanceTier,
}

impl EventKind {
    /// Base importance of an event kind before seasonal and random adjustment.
    pub fn base_importance(&self) -> f64 {
        match self {
            EventKind::CriticalError => 10.0,
            EventKind::GlobalWarStart => 9.0,
            EventKind::ReligionFounded => 8.0,
            EventKind::CivilWarStart | EventKind::BossSpawn => 7.0,
            EventKind::LeaderDeath | EventKind::Famine | EventKind::ConflictResolved => 6.0,
            EventKind::ConflictStart | EventKind::RaidSuccessLoot | EventKind::LeaderFate => 5.0,
            EventKind::RaidStart
            | EventKind::RaidSuccessPlunder
            | EventKind::ReligionConversion
            | EventKind::Transformation => 4.0,
            EventKind::RaidRepelled
            | EventKind::ReligionAdopted
            | EventKind::NatureReclaim
            | EventKind::Expansion
            | EventKind::Discovery => 3.0,
            EventKind::LeaderAppointed
            | EventKind::ResourceDepleted
            | EventKind::ResourceDiscovered => 2.0,
            EventKind::ResourceRegrowth => 1.0,
        }
    }
}

/// Score, tier and sort the events of one epoch, most important first.
///
/// score = base(kind) x season multiplier x jitter in [0.8, 1.2]. The sort is
/// stable, so equal scores keep their call order.
pub fn weigh_events<R: Rng>(events: &mut [EventRecord], epoch: u32, rng: &mut R) {
    let season = Season::for_epoch(epoch).importance_multiplier();

    for event in events.iter_mut() {
        let jitter = rng.gen_range(0.8..=1.2);
        let score = event.kind.base_importance() * season * jitter;
        event.importance = Some(Importance {
            score,
            tier: ImportanceTier::from_score(score),
        });
    }

    events.sort_by(|a, b| {
        let score = |e: &EventRecord| e.importance.map(|i| i.score).unwrap_or(0.0);
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
