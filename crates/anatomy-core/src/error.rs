//! Error types for body graph operations

use hecs::Entity;
use thiserror::Error;

use crate::components::{PartType, SlotRef};

/// Why an attach was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingPart,
    MissingSlot,
    Occupied(Entity),
    TypeMismatch { accepts: PartType, found: PartType },
    /// The slot lives on the candidate or somewhere below it
    Cycle,
    ContainerRefused,
}

/// Structural errors. None of these leave the graph partially mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    #[error("Slot {id:?} already exists on {owner:?}")]
    DuplicateSlot { owner: Entity, id: String },

    #[error("Cannot attach {part:?} to {slot:?}: {reason:?}")]
    InvalidAttachment {
        part: Entity,
        slot: SlotRef,
        reason: Rejection,
    },

    #[error("{0:?} is not attached to anything")]
    NotAttached(Entity),

    #[error("{entity:?} has no {component} component")]
    UnresolvedComponent {
        entity: Entity,
        component: &'static str,
    },
}

impl BodyError {
    pub(crate) fn unresolved(entity: Entity, component: &'static str) -> Self {
        BodyError::UnresolvedComponent { entity, component }
    }
}

/// Errors decoding or encoding a replication payload
#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Errors loading a [`crate::config::BodyConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
