//! # Narrative Core
//!
//! Procedural world generation and epoch-by-epoch simulation on top of the
//! `world_rules` graph. A world is laid out on a grid, populated from
//! templates and then advanced one epoch at a time; every epoch returns the
//! narrative events it produced.
//!
//! ## Core Components
//!
//! - **layout**: Biome placement on a grid with adjacency constraints
//! - **generator**: Turns a layout into biomes, locations, resources and factions
//! - **query**: The single read/write gateway to the world graph
//! - **systems**: Lifecycle, belief, conflict and transformation rules
//! - **engine**: Runs the systems in a fixed order each epoch
//! - **events**: Event records and the optional importance pass
//! - **config**: Tunables loaded from TOML
//!
//! ## Design Philosophy
//!
//! - **Graph-Driven**: All state lives in the entity graph; systems hold nothing between epochs
//! - **Reproducible**: A single seeded RNG drives every random choice
//! - **Forgiving**: One broken entity is skipped, not allowed to end the epoch

pub mod config;
pub mod engine;
pub mod events;
pub mod generator;
pub mod layout;
pub mod query;
pub mod systems;

#[cfg(test)]
mod test_support;

pub use config::SimulationConfig;
pub use engine::NarrativeEngine;
pub use events::*;
pub use generator::WorldGenerator;
pub use layout::{SpatialLayout, SpatialLayoutGenerator};
pub use query::{EntityQuery, WorldMetadata, WorldQueryService};
pub use systems::EpochContext;
