//! Systems - logic that operates on components

mod events;
mod graph;
mod locomotion;
mod organs;
mod stance;
mod surface;
mod traversal;

pub use events::*;
pub use locomotion::*;
pub use stance::{after_attach, after_detach, should_fall, stance};
pub use traversal::*;
