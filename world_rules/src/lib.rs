//! # World Rules
//!
//! The world model crate: entities, typed relations, culture vectors and the
//! archetype templates that every generator and simulation system reads.
//! It owns no simulation logic; `narrative_core` drives the world forward.

pub mod entities;
pub mod error;
pub mod mechanics;
pub mod naming;
pub mod templates;
pub mod world_state;

pub use entities::*;
pub use error::{Result, WorldError};
pub use mechanics::*;
pub use naming::*;
pub use templates::*;
pub use world_state::*;
