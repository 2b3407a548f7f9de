//! Anatomy Core - Body Composition Engine
//!
//! Models a creature's body as a rooted graph of attachable parts. A body
//! owns a root slot; each part owns named child slots that hold further
//! parts, and organ slots that hold organs. Attaching or detaching parts
//! keeps the graph acyclic, recomputes locomotion from the legs that are
//! still functional and knocks the creature over when it loses them.
//!
//! # Architecture
//!
//! Everything lives in a `hecs` world:
//! - **Entities**: Bodies, parts, organs, decorative markers
//! - **Components**: Pure data ([`components::Body`], [`components::BodyPart`], ...)
//! - **Systems**: Graph operations, traversal, locomotion and stance logic
//!
//! Containment, movement, stance animation and placement are reached
//! through the traits in [`collaborators`], so a host engine can plug its
//! own implementations in.
//!
//! # Example
//!
//! ```rust
//! use anatomy_core::prelude::*;
//!
//! let mut system = BodySystem::new();
//! let body = system.spawn_body(Some(2));
//! let root = system.create_slot(body, "torso", Some(PartType::Torso)).unwrap();
//! let torso = system.spawn_part(BodyPart::new(PartType::Torso).vital());
//! system.attach(torso, &root).unwrap();
//!
//! let leg_slot = system.create_slot(torso, "left leg", Some(PartType::Leg)).unwrap();
//! let leg = system.spawn_part(BodyPart::new(PartType::Leg));
//! system.attach(leg, &leg_slot).unwrap();
//!
//! assert_eq!(system.part(leg).unwrap().body, Some(body));
//! ```

pub mod collaborators;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod replication;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::collaborators::Collaborators;
    pub use crate::components::*;
    pub use crate::config::BodyConfig;
    pub use crate::engine::BodySystem;
    pub use crate::error::{BodyError, Rejection};
    pub use crate::systems::{BodyEvent, SurfaceKind};
}
