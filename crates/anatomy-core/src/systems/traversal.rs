//! Read-only walks over the body graph
//!
//! Every walk is a lazy depth-first iterator over the live world. They
//! borrow the world immutably, so the graph cannot be mutated while one is
//! being consumed. Callers that need to mutate mid-walk collect first.
//! Calling the function again restarts the walk from the current graph.

use hecs::{Component, Entity, World};

use crate::components::{Body, BodyPart, Organ, PartSlot, PartType};

fn child_slots(world: &World, part: Entity) -> Vec<PartSlot> {
    world
        .get::<&BodyPart>(part)
        .map(|p| p.children.values().rev().cloned().collect())
        .unwrap_or_default()
}

fn child_parts(world: &World, part: Entity) -> Vec<Entity> {
    world
        .get::<&BodyPart>(part)
        .map(|p| {
            p.children
                .values()
                .rev()
                .filter_map(|slot| slot.occupant)
                .collect()
        })
        .unwrap_or_default()
}

fn is_part(world: &World, entity: Entity) -> bool {
    world.get::<&BodyPart>(entity).is_ok()
}

/// Pre-order walk of every part below a part (the part itself excluded)
pub struct PartChildren<'w> {
    world: &'w World,
    stack: Vec<Entity>,
}

impl Iterator for PartChildren<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while let Some(entity) = self.stack.pop() {
            if !is_part(self.world, entity) {
                continue;
            }
            self.stack.extend(child_parts(self.world, entity));
            return Some(entity);
        }
        None
    }
}

pub fn part_children(world: &World, part: Entity) -> PartChildren<'_> {
    PartChildren {
        world,
        stack: child_parts(world, part),
    }
}

/// Pre-order walk of every part slot below a part. Each slot is followed by
/// the slots of the part it holds.
pub struct PartAllSlots<'w> {
    world: &'w World,
    stack: Vec<PartSlot>,
}

impl Iterator for PartAllSlots<'_> {
    type Item = PartSlot;

    fn next(&mut self) -> Option<PartSlot> {
        let slot = self.stack.pop()?;
        if let Some(child) = slot.occupant {
            self.stack.extend(child_slots(self.world, child));
        }
        Some(slot)
    }
}

pub fn part_all_slots(world: &World, part: Entity) -> PartAllSlots<'_> {
    PartAllSlots {
        world,
        stack: child_slots(world, part),
    }
}

/// Organs held directly by a part
pub fn part_organs(world: &World, part: Entity) -> impl Iterator<Item = Entity> + '_ {
    let occupants: Vec<Entity> = world
        .get::<&BodyPart>(part)
        .map(|p| p.organs.values().filter_map(|slot| slot.occupant).collect())
        .unwrap_or_default();
    occupants
        .into_iter()
        .filter(move |organ| world.get::<&Organ>(*organ).is_ok())
}

/// Organs held by a part or anything below it
pub fn subtree_organs(world: &World, part: Entity) -> impl Iterator<Item = Entity> + '_ {
    std::iter::once(part)
        .chain(part_children(world, part))
        .flat_map(move |p| part_organs(world, p))
}

/// The parent slot's owner followed by every occupied child slot
pub fn adjacent_parts(world: &World, part: Entity) -> impl Iterator<Item = Entity> + '_ {
    let (parent, children) = match world.get::<&BodyPart>(part) {
        Ok(p) => (
            p.parent_slot.as_ref().map(|slot| slot.owner),
            p.children
                .values()
                .filter_map(|slot| slot.occupant)
                .collect::<Vec<_>>(),
        ),
        Err(_) => (None, Vec::new()),
    };
    parent.into_iter().chain(children)
}

/// Adjacent parts that carry a `T`, paired with a copy of it
pub fn adjacent_parts_with<T: Component + Clone>(world: &World, part: Entity) -> Vec<(Entity, T)> {
    adjacent_parts(world, part)
        .filter_map(|e| world.get::<&T>(e).ok().map(|c| (e, (*c).clone())))
        .collect()
}

/// Organs of a part that carry a `T`, paired with a copy of it
pub fn part_organs_with<T: Component + Clone>(world: &World, part: Entity) -> Vec<(Entity, T)> {
    part_organs(world, part)
        .filter_map(|e| world.get::<&T>(e).ok().map(|c| (e, (*c).clone())))
        .collect()
}

fn root_part(world: &World, body: Entity) -> Option<Entity> {
    world.get::<&Body>(body).ok().and_then(|b| b.root_part())
}

/// Every part of a body, root first
pub fn body_children(world: &World, body: Entity) -> PartChildren<'_> {
    PartChildren {
        world,
        stack: root_part(world, body).into_iter().collect(),
    }
}

pub fn body_children_of_type(
    world: &World,
    body: Entity,
    part_type: PartType,
) -> impl Iterator<Item = Entity> + '_ {
    body_children(world, body).filter(move |part| {
        world
            .get::<&BodyPart>(*part)
            .map_or(false, |p| p.part_type == part_type)
    })
}

pub fn body_has_child_of_type(world: &World, body: Entity, part_type: PartType) -> bool {
    body_children_of_type(world, body, part_type).next().is_some()
}

/// Whether `part` currently belongs to `body`
pub fn body_has_part(world: &World, body: Entity, part: Entity) -> bool {
    world
        .get::<&BodyPart>(part)
        .map_or(false, |p| p.body == Some(body))
}

/// The root slot followed by every slot below it
pub fn body_all_slots(world: &World, body: Entity) -> PartAllSlots<'_> {
    let root = world
        .get::<&Body>(body)
        .ok()
        .and_then(|b| b.root.clone());
    PartAllSlots {
        world,
        stack: root.into_iter().collect(),
    }
}

pub fn body_organs(world: &World, body: Entity) -> impl Iterator<Item = Entity> + '_ {
    body_children(world, body).flat_map(move |p| part_organs(world, p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::OrganSlot;

    fn link(world: &mut World, parent: Entity, id: &str, child: Entity, t: PartType) {
        let mut slot = PartSlot::new(id, parent, Some(t));
        slot.occupant = Some(child);
        world
            .get::<&mut BodyPart>(parent)
            .unwrap()
            .children
            .insert(id.to_string(), slot.clone());
        world.get::<&mut BodyPart>(child).unwrap().parent_slot = Some(slot.slot_ref());
    }

    /// torso -> (arm -> hand), (leg -> foot)
    fn build(world: &mut World) -> (Entity, [Entity; 5]) {
        let body = world.spawn((Body::new(2),));
        let torso = world.spawn((BodyPart::new(PartType::Torso),));
        let arm = world.spawn((BodyPart::new(PartType::Arm),));
        let hand = world.spawn((BodyPart::new(PartType::Hand),));
        let leg = world.spawn((BodyPart::new(PartType::Leg),));
        let foot = world.spawn((BodyPart::new(PartType::Foot),));

        link(world, torso, "a_arm", arm, PartType::Arm);
        link(world, torso, "b_leg", leg, PartType::Leg);
        link(world, arm, "hand", hand, PartType::Hand);
        link(world, leg, "foot", foot, PartType::Foot);

        let mut root = PartSlot::new("torso", body, Some(PartType::Torso));
        root.occupant = Some(torso);
        world.get::<&mut Body>(body).unwrap().root = Some(root);

        (body, [torso, arm, hand, leg, foot])
    }

    #[test]
    fn test_part_children_preorder() {
        let mut world = World::new();
        let (_, [torso, arm, hand, leg, foot]) = build(&mut world);

        let order: Vec<_> = part_children(&world, torso).collect();
        assert_eq!(order, vec![arm, hand, leg, foot]);

        // Restartable
        assert_eq!(part_children(&world, torso).count(), 4);
        assert_eq!(part_children(&world, hand).count(), 0);
    }

    #[test]
    fn test_body_walks() {
        let mut world = World::new();
        let (body, [torso, _, _, leg, _]) = build(&mut world);

        assert_eq!(body_children(&world, body).next(), Some(torso));
        assert_eq!(body_children(&world, body).count(), 5);
        assert_eq!(
            body_children_of_type(&world, body, PartType::Leg).collect::<Vec<_>>(),
            vec![leg]
        );
        assert!(!body_has_child_of_type(&world, body, PartType::Tail));

        let slots: Vec<_> = body_all_slots(&world, body).map(|s| s.id).collect();
        assert_eq!(slots, vec!["torso", "a_arm", "hand", "b_leg", "foot"]);
    }

    #[test]
    fn test_adjacent_parts() {
        let mut world = World::new();
        let (_, [torso, arm, hand, leg, _]) = build(&mut world);

        let around_arm: Vec<_> = adjacent_parts(&world, arm).collect();
        assert_eq!(around_arm, vec![torso, hand]);

        let around_torso: Vec<_> = adjacent_parts(&world, torso).collect();
        assert_eq!(around_torso, vec![arm, leg]);

        let with_parts = adjacent_parts_with::<BodyPart>(&world, arm);
        assert_eq!(with_parts.len(), 2);
    }

    #[test]
    fn test_organ_walks() {
        let mut world = World::new();
        let (body, [torso, arm, ..]) = build(&mut world);
        let heart = world.spawn((Organ::default(),));
        let not_an_organ = world.spawn(());

        let mut slot = OrganSlot::new("heart", torso);
        slot.occupant = Some(heart);
        let mut bogus = OrganSlot::new("bogus", arm);
        bogus.occupant = Some(not_an_organ);
        world
            .get::<&mut BodyPart>(torso)
            .unwrap()
            .organs
            .insert("heart".into(), slot);
        world
            .get::<&mut BodyPart>(arm)
            .unwrap()
            .organs
            .insert("bogus".into(), bogus);

        assert_eq!(part_organs(&world, torso).collect::<Vec<_>>(), vec![heart]);
        assert_eq!(part_organs(&world, arm).count(), 0);
        assert_eq!(subtree_organs(&world, torso).collect::<Vec<_>>(), vec![heart]);
        assert_eq!(body_organs(&world, body).count(), 1);
        assert_eq!(part_organs_with::<Organ>(&world, torso).len(), 1);
    }
}
