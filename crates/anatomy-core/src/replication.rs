//! Replication bridge - mirrors authoritative body state to observers
//!
//! The authority projects each changed part into an immutable [`PartState`]
//! record and ships a batch of them as one bincode payload. Observers apply
//! the records verbatim; no invariant is re-checked on their side.

use std::collections::{BTreeMap, HashSet};

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::error::ReplicationError;

/// Version number for the payload format (increment when format changes)
const STATE_VERSION: u32 = 1;

/// Everything an observer needs to mirror one body part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartState {
    pub body: Option<Entity>,
    pub original_body: Option<Entity>,
    pub parent_slot: Option<SlotRef>,
    pub children: BTreeMap<String, PartSlot>,
    pub organs: BTreeMap<String, OrganSlot>,
    pub part_type: PartType,
    pub is_vital: bool,
    pub symmetry: Symmetry,
    pub attachment: Option<Entity>,
    pub container: Option<ContainerRef>,
    pub incisable: bool,
    pub incised: bool,
    pub opened: bool,
    pub endo_skeleton: bool,
    pub exo_skeleton: bool,
    pub endo_opened: bool,
    pub exo_opened: bool,
}

impl From<&BodyPart> for PartState {
    fn from(part: &BodyPart) -> Self {
        Self {
            body: part.body,
            original_body: part.original_body,
            parent_slot: part.parent_slot.clone(),
            children: part.children.clone(),
            organs: part.organs.clone(),
            part_type: part.part_type,
            is_vital: part.is_vital,
            symmetry: part.symmetry,
            attachment: part.attachment,
            container: part.container.clone(),
            incisable: part.incisable,
            incised: part.incised,
            opened: part.opened,
            endo_skeleton: part.endo_skeleton,
            exo_skeleton: part.exo_skeleton,
            endo_opened: part.endo_opened,
            exo_opened: part.exo_opened,
        }
    }
}

impl PartState {
    /// Overwrite every replicated field of `part`
    pub fn apply_to(self, part: &mut BodyPart) {
        part.body = self.body;
        part.original_body = self.original_body;
        part.parent_slot = self.parent_slot;
        part.children = self.children;
        part.organs = self.organs;
        part.part_type = self.part_type;
        part.is_vital = self.is_vital;
        part.symmetry = self.symmetry;
        part.attachment = self.attachment;
        part.container = self.container;
        part.incisable = self.incisable;
        part.incised = self.incised;
        part.opened = self.opened;
        part.endo_skeleton = self.endo_skeleton;
        part.exo_skeleton = self.exo_skeleton;
        part.endo_opened = self.endo_opened;
        part.exo_opened = self.exo_opened;
    }

    pub fn into_part(self) -> BodyPart {
        let mut part = BodyPart::new(self.part_type);
        self.apply_to(&mut part);
        part
    }
}

/// Replicated fields of a body root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub root: Option<PartSlot>,
    pub required_legs: u32,
    pub stance: Stance,
}

impl From<&Body> for BodyState {
    fn from(body: &Body) -> Self {
        Self {
            root: body.root.clone(),
            required_legs: body.required_legs,
            stance: body.stance,
        }
    }
}

impl From<BodyState> for Body {
    fn from(state: BodyState) -> Self {
        Self {
            root: state.root,
            required_legs: state.required_legs,
            stance: state.stance,
        }
    }
}

/// One entry of a sync batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateUpdate {
    Part { entity: Entity, state: PartState },
    Body { entity: Entity, state: BodyState },
    Removed { entity: Entity },
}

/// A versioned batch of updates, the unit sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub version: u32,
    pub updates: Vec<StateUpdate>,
}

pub fn get_part_state(world: &World, part: Entity) -> Option<PartState> {
    world.get::<&BodyPart>(part).ok().map(|p| PartState::from(&*p))
}

/// Overwrite a part's fields, adding the component if the entity lacks it.
/// Returns `false` if the entity does not exist.
pub fn handle_part_state(world: &mut World, part: Entity, state: PartState) -> bool {
    if let Ok(mut existing) = world.get::<&mut BodyPart>(part) {
        state.apply_to(&mut existing);
        return true;
    }
    world.insert_one(part, state.into_part()).is_ok()
}

pub fn get_body_state(world: &World, body: Entity) -> Option<BodyState> {
    world.get::<&Body>(body).ok().map(|b| BodyState::from(&*b))
}

pub fn handle_body_state(world: &mut World, body: Entity, state: BodyState) -> bool {
    world.insert_one(body, Body::from(state)).is_ok()
}

pub fn encode(payload: &StatePayload) -> Result<Vec<u8>, ReplicationError> {
    Ok(bincode::serialize(payload)?)
}

pub fn decode(bytes: &[u8]) -> Result<StatePayload, ReplicationError> {
    let payload: StatePayload = bincode::deserialize(bytes)?;
    if payload.version != STATE_VERSION {
        return Err(ReplicationError::VersionMismatch {
            expected: STATE_VERSION,
            found: payload.version,
        });
    }
    Ok(payload)
}

/// Apply a decoded batch to an observer world. Updates for entities the
/// observer doesn't know are skipped; returns how many were applied.
pub fn apply_payload(world: &mut World, payload: StatePayload) -> usize {
    let mut applied = 0;
    for update in payload.updates {
        let ok = match update {
            StateUpdate::Part { entity, state } => handle_part_state(world, entity, state),
            StateUpdate::Body { entity, state } => handle_body_state(world, entity, state),
            StateUpdate::Removed { entity } => world.despawn(entity).is_ok(),
        };
        if ok {
            applied += 1;
        }
    }
    applied
}

/// Tracks which entities changed since the last sync
#[derive(Debug, Clone, Default)]
pub struct ReplicationBridge {
    dirty: HashSet<Entity>,
    removed: Vec<Entity>,
}

impl ReplicationBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self, entity: Entity) {
        self.dirty.insert(entity);
    }

    pub fn mark_removed(&mut self, entity: Entity) {
        self.dirty.remove(&entity);
        self.removed.push(entity);
    }

    pub fn is_dirty(&self, entity: Entity) -> bool {
        self.dirty.contains(&entity)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Drain the dirty set into a payload, in a stable entity order
    pub fn collect(&mut self, world: &World) -> StatePayload {
        let mut dirty: Vec<Entity> = self.dirty.drain().collect();
        dirty.sort_by_key(|e| e.to_bits());

        let mut updates = Vec::with_capacity(dirty.len() + self.removed.len());
        for entity in dirty {
            if let Some(state) = get_part_state(world, entity) {
                updates.push(StateUpdate::Part { entity, state });
            } else if let Some(state) = get_body_state(world, entity) {
                updates.push(StateUpdate::Body { entity, state });
            }
        }
        updates.extend(
            self.removed
                .drain(..)
                .map(|entity| StateUpdate::Removed { entity }),
        );

        StatePayload {
            version: STATE_VERSION,
            updates,
        }
    }
}
