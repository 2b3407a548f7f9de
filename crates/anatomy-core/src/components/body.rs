//! Body, part and organ components.

use std::collections::BTreeMap;

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::{Color, ContainerRef, OrganSlot, PartSlot, SlotRef};

/// Kind of body part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartType {
    Other,
    Torso,
    Head,
    Arm,
    Hand,
    Leg,
    Foot,
    Tail,
}

impl PartType {
    /// Parts whose presence feeds locomotion and stance
    pub fn affects_locomotion(self) -> bool {
        matches!(self, PartType::Leg | PartType::Foot)
    }
}

/// Left/right symmetry tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symmetry {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    #[default]
    Standing,
    Fallen,
}

/// Root component of a creature's body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Slot holding the root part (usually a torso)
    pub root: Option<PartSlot>,
    /// Number of legs a full-speed body has. Speed is divided by this,
    /// not by the number of legs actually present.
    pub required_legs: u32,
    pub stance: Stance,
}

impl Body {
    pub fn new(required_legs: u32) -> Self {
        Self {
            root: None,
            required_legs,
            stance: Stance::Standing,
        }
    }

    pub fn root_part(&self) -> Option<Entity> {
        self.root.as_ref().and_then(|slot| slot.occupant)
    }
}

/// A node of the body graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPart {
    pub part_type: PartType,
    pub is_vital: bool,
    pub symmetry: Symmetry,
    /// Child part slots, keyed by slot id
    pub children: BTreeMap<String, PartSlot>,
    /// Organ slots, keyed by slot id
    pub organs: BTreeMap<String, OrganSlot>,
    pub parent_slot: Option<SlotRef>,
    /// Body this part is currently reachable from
    pub body: Option<Entity>,
    /// Last body this part belonged to; provenance only
    pub original_body: Option<Entity>,
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

impl BodyPart {
    pub fn new(part_type: PartType) -> Self {
        Self {
            part_type,
            is_vital: false,
            symmetry: Symmetry::None,
            children: BTreeMap::new(),
            organs: BTreeMap::new(),
            parent_slot: None,
            body: None,
            original_body: None,
            attachment: None,
            container: None,
            incisable: false,
            incised: false,
            opened: false,
            endo_skeleton: false,
            exo_skeleton: false,
            endo_opened: false,
            exo_opened: false,
        }
    }

    pub fn vital(mut self) -> Self {
        self.is_vital = true;
        self
    }

    pub fn with_symmetry(mut self, symmetry: Symmetry) -> Self {
        self.symmetry = symmetry;
        self
    }

    pub fn incisable(mut self) -> Self {
        self.incisable = true;
        self
    }

    pub fn with_endo_skeleton(mut self) -> Self {
        self.endo_skeleton = true;
        self
    }

    pub fn with_exo_skeleton(mut self) -> Self {
        self.exo_skeleton = true;
        self
    }

    pub fn is_attached(&self) -> bool {
        self.parent_slot.is_some()
    }

    /// A leg stands on its feet: every foot slot it declares must be filled.
    /// Legs without foot slots always count.
    pub fn is_functional_leg(&self) -> bool {
        self.part_type == PartType::Leg
            && self
                .children
                .values()
                .filter(|slot| slot.is_foot_slot())
                .all(|slot| slot.occupant.is_some())
    }
}

/// Leaf node living in an organ slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Organ {
    pub body: Option<Entity>,
    pub parent_slot: Option<SlotRef>,
}

/// Movement stats. On a leg: that leg's contribution. On a body: the aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementSpeedModifier {
    pub base_walk_speed: f32,
    pub base_sprint_speed: f32,
    pub acceleration: f32,
}

impl MovementSpeedModifier {
    pub fn new(walk: f32, sprint: f32, acceleration: f32) -> Self {
        Self {
            base_walk_speed: walk,
            base_sprint_speed: sprint,
            acceleration,
        }
    }
}

/// Skin data on a living body
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanoidAppearance {
    pub skin_color: Color,
}

/// Appearance snapshot taken when a part leaves its body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartAppearance {
    pub original_body: Option<Entity>,
    pub color: Color,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    #[test]
    fn test_leg_without_foot_slot_is_functional() {
        let leg = BodyPart::new(PartType::Leg);
        assert!(leg.is_functional_leg());
    }

    #[test]
    fn test_leg_with_empty_foot_slot() {
        let mut world = World::new();
        let owner = world.spawn(());
        let mut leg = BodyPart::new(PartType::Leg);
        leg.children.insert(
            "foot".into(),
            PartSlot::new("foot", owner, Some(PartType::Foot)),
        );
        assert!(!leg.is_functional_leg());

        let foot = world.spawn(());
        if let Some(slot) = leg.children.get_mut("foot") {
            slot.occupant = Some(foot);
        }
        assert!(leg.is_functional_leg());
    }

    #[test]
    fn test_arm_is_never_a_functional_leg() {
        assert!(!BodyPart::new(PartType::Arm).is_functional_leg());
    }

    #[test]
    fn test_new_body_is_standing() {
        let body = Body::new(2);
        assert_eq!(body.stance, Stance::Standing);
        assert_eq!(body.root_part(), None);
    }
}
