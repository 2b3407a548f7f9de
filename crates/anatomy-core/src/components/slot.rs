//! Slot types: typed attachment points owned by a part or a body root.
//!
//! Slots are stored by value inside their owner. Other entities refer to a
//! slot through a [`SlotRef`], never through a pointer.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::PartType;

/// Address of a slot: the entity that owns it plus the slot id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub owner: Entity,
    pub id: String,
}

impl SlotRef {
    pub fn new(owner: Entity, id: impl Into<String>) -> Self {
        Self {
            owner,
            id: id.into(),
        }
    }
}

/// Address of a named container on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    pub owner: Entity,
    pub name: String,
}

/// Attachment point for a body part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSlot {
    pub id: String,
    /// Part (or body, for the root slot) this slot belongs to
    pub owner: Entity,
    /// `None` accepts any part type
    pub accepts: Option<PartType>,
    pub occupant: Option<Entity>,
    /// Decorative marker entity (prosthetic mount, bandage, ...)
    pub attachment: Option<Entity>,
    pub cauterized: bool,
}

impl PartSlot {
    pub fn new(id: impl Into<String>, owner: Entity, accepts: Option<PartType>) -> Self {
        Self {
            id: id.into(),
            owner,
            accepts,
            occupant: None,
            attachment: None,
            cauterized: false,
        }
    }

    pub fn slot_ref(&self) -> SlotRef {
        SlotRef::new(self.owner, self.id.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    /// Whether a part of the given type may occupy this slot
    pub fn accepts_type(&self, part_type: PartType) -> bool {
        self.accepts.map_or(true, |t| t == part_type)
    }

    pub fn is_foot_slot(&self) -> bool {
        self.accepts == Some(PartType::Foot)
    }
}

/// Attachment point for an organ. Organs are leaves; they never own slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganSlot {
    pub id: String,
    pub owner: Entity,
    pub occupant: Option<Entity>,
}

impl OrganSlot {
    pub fn new(id: impl Into<String>, owner: Entity) -> Self {
        Self {
            id: id.into(),
            owner,
            occupant: None,
        }
    }

    pub fn slot_ref(&self) -> SlotRef {
        SlotRef::new(self.owner, self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    #[test]
    fn test_wildcard_slot_accepts_everything() {
        let mut world = World::new();
        let owner = world.spawn(());
        let slot = PartSlot::new("any", owner, None);
        assert!(slot.accepts_type(PartType::Leg));
        assert!(slot.accepts_type(PartType::Head));
    }

    #[test]
    fn test_typed_slot() {
        let mut world = World::new();
        let owner = world.spawn(());
        let slot = PartSlot::new("foot", owner, Some(PartType::Foot));
        assert!(slot.accepts_type(PartType::Foot));
        assert!(!slot.accepts_type(PartType::Hand));
        assert!(slot.is_foot_slot());
        assert!(slot.is_empty());
        assert_eq!(slot.slot_ref(), SlotRef::new(owner, "foot"));
    }
}
