//! Component definitions for the body graph.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod body;
mod common;
mod slot;

pub use body::*;
pub use common::*;
pub use slot::*;
