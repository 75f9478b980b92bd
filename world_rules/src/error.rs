//! Error types shared by the world model and everything built on top of it.

use thiserror::Error;

use crate::entities::{EntityId, EntityType};

/// Errors raised by graph, template and persistence operations.
///
/// `TypeMismatch` is a hard validation failure. The not-found variants are
/// soft: query paths turn them into `None`, write paths log and skip.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error(
        "relation '{relation}' expects {expected_from:?} -> {expected_to:?}, got {actual_from:?} -> {actual_to:?}"
    )]
    TypeMismatch {
        relation: String,
        expected_from: EntityType,
        expected_to: EntityType,
        actual_from: EntityType,
        actual_to: EntityType,
    },

    #[error("unknown relation type '{0}'")]
    UnknownRelationType(String),

    #[error("relation type '{0}' is already registered")]
    DuplicateRelationType(String),

    #[error("entity '{0}' not found")]
    EntityNotFound(EntityId),

    #[error("{kind} template '{id}' not found")]
    TemplateNotFound { kind: &'static str, id: String },

    #[error("'{parent}' is at capacity ({capacity})")]
    CapacityExceeded { parent: EntityId, capacity: u32 },

    #[error("spatial layout has no occupied cells")]
    EmptyLayout,

    #[error("snapshot error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl WorldError {
    /// Whether the error is a soft failure that callers may degrade around.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            WorldError::UnknownRelationType(_)
                | WorldError::EntityNotFound(_)
                | WorldError::TemplateNotFound { .. }
                | WorldError::CapacityExceeded { .. }
        )
    }
}

/// Result alias used across the world crates.
pub type Result<T> = std::result::Result<T, WorldError>;
