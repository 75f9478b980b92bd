//! Known keys of the entity `data` payload and the gameplay tags the systems read.
//!
//! The payload stays schema-less on disk; these constants are the stable
//! contract between the generator, the simulation systems and front ends.

// Shared
pub const CULTURE_VECTOR: &str = "culture_vector";
pub const ROLE: &str = "role";
pub const LIMITS: &str = "limits";

// Spatial
pub const COORD: &str = "coord";
pub const NEIGHBOR_BIOMES: &str = "neighbor_biomes";
pub const SLOT_INDEX: &str = "spatial_slot_index";
pub const LOCAL_COORD: &str = "local_coord";
pub const ABS_COORD: &str = "abs_coord";
pub const X: &str = "x";
pub const Y: &str = "y";
pub const LAST_MOVED_AT: &str = "last_moved_at";

// Factions and characters
pub const CREATURE_TYPE: &str = "creature_type";
pub const DEFAULT_BELIEF: &str = "default_belief";
pub const FACTION_ID: &str = "faction_id";
pub const ABSORBED_BY: &str = "absorbed_by";
pub const TRAITS: &str = "traits";

// Resources
pub const RARITY: &str = "rarity";
pub const RENEWABLE: &str = "renewable";

// Beliefs
pub const MODIFIERS: &str = "modifiers";
pub const ORIGIN_FACTION_ID: &str = "origin_faction_id";
pub const NAMING_STYLE: &str = "naming_style";
pub const DEITY_NAME: &str = "deity_name";
pub const VARIATION: &str = "variation";

// Conflicts
pub const STATUS: &str = "status";
pub const PARTICIPANTS: &str = "participants";
pub const LOCATION_ID: &str = "location_id";
pub const REASON_ID: &str = "reason_id";
pub const EPOCH_STARTED: &str = "epoch_started";
pub const CULTURAL_TENSION: &str = "cultural_tension";
pub const IS_RAID: &str = "is_raid";
pub const OUTCOME: &str = "outcome";
pub const WAR_KIND: &str = "war_kind";
pub const INITIATOR_BELIEF: &str = "initiator_belief";
pub const TARGET_BELIEF: &str = "target_belief";

// Locations
pub const DESTROYED_IN_EPOCH: &str = "destroyed_in_epoch";
pub const LAST_CONFLICT_EPOCH: &str = "last_conflict_epoch";

// Events
pub const EPOCH: &str = "epoch";
pub const EVENT_KIND: &str = "event_kind";
pub const SUMMARY: &str = "summary";

pub const TAG_DEAD: &str = "dead";
pub const TAG_INACTIVE: &str = "inactive";
pub const TAG_ABSORBED: &str = "absorbed";
pub const TAG_FLED: &str = "fled";
pub const TAG_RUINS: &str = "ruins";
pub const TAG_DEPLETED: &str = "depleted";
pub const TAG_STARVED: &str = "starved";
pub const TAG_OVERCROWDED: &str = "overcrowded";
pub const TAG_ALLIED: &str = "allied";
pub const TAG_REBEL: &str = "rebel";
pub const TAG_BOSS: &str = "boss";
pub const TAG_HOSTILE: &str = "hostile";
pub const TAG_BURIED: &str = "buried";
pub const TAG_STOLEN: &str = "stolen";
pub const TAG_WILD: &str = "wild";
pub const TAG_DISCOVERED: &str = "discovered";
pub const TAG_TRANSFORMED: &str = "transformed";
pub const TAG_COASTAL: &str = "coastal";
pub const TAG_EDGE_ONLY: &str = "edge_only";
pub const TAG_NO_EDGE: &str = "no_edge";
pub const TAG_UNDER_SIEGE: &str = "under_siege";
pub const TAG_DISASTER: &str = "disaster";
pub const TAG_EXILED: &str = "exiled";
pub const TAG_WANDERING: &str = "wandering";
pub const TAG_BANDITS: &str = "bandits";
