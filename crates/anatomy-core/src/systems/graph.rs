//! Part graph - attach, detach, orphan and delete
//!
//! Attach and detach are atomic with respect to the graph invariants: an
//! attach is validated in full before anything moves, and if the containment
//! insert still fails the candidate's previous binding is restored. Side effects
//! (events, locomotion, stance, appearance, placement) run only once the
//! graph change is committed.

use hecs::Entity;
use rand::Rng;

use super::events::BodyEvent;
use super::locomotion::update_movement_speed;
use super::stance;
use super::traversal::{part_children, subtree_organs};
use crate::components::*;
use crate::engine::BodySystem;
use crate::error::{BodyError, Rejection};

/// A binding that was structurally undone but whose side effects have not
/// run yet
struct Unbound {
    part: Entity,
    part_type: PartType,
    slot: SlotRef,
    old_body: Option<Entity>,
    old_container: Option<ContainerRef>,
    /// The part and every part below it, with their previous provenance
    previous_origins: Vec<(Entity, Option<Entity>)>,
    organs: Vec<Entity>,
    touches_legs: bool,
}

impl BodySystem {
    /// Add a slot to a part, or the root slot to a body
    pub fn create_slot(
        &mut self,
        owner: Entity,
        slot_id: &str,
        accepts: Option<PartType>,
    ) -> Result<SlotRef, BodyError> {
        let duplicate = || BodyError::DuplicateSlot {
            owner,
            id: slot_id.to_string(),
        };
        let slot = PartSlot::new(slot_id, owner, accepts);
        let mut owner_body = None;

        if let Ok(mut part) = self.world.get::<&mut BodyPart>(owner) {
            if part.children.contains_key(slot_id) {
                return Err(duplicate());
            }
            part.children.insert(slot_id.to_string(), slot);
            owner_body = part.body;
        } else if let Ok(mut body) = self.world.get::<&mut Body>(owner) {
            if body.root.is_some() {
                return Err(duplicate());
            }
            body.root = Some(slot);
        } else {
            return Err(BodyError::unresolved(owner, "BodyPart"));
        }

        self.collaborators
            .containers
            .ensure_container(owner, &self.config.container_id);
        self.replication.mark_dirty(owner);
        log::debug!("created slot {:?} on {:?}", slot_id, owner);

        // An empty foot slot can take a leg out of service
        if let (Some(body), Some(PartType::Foot)) = (owner_body, accepts) {
            update_movement_speed(
                &mut self.world,
                self.collaborators.movement.as_mut(),
                body,
            );
            stance::after_detach(
                &mut self.world,
                self.collaborators.stance.as_mut(),
                &mut self.events,
                body,
            );
            self.replication.mark_dirty(body);
        }
        Ok(SlotRef::new(owner, slot_id))
    }

    /// Copy of the slot a reference points at
    pub fn slot(&self, slot: &SlotRef) -> Option<PartSlot> {
        if let Ok(part) = self.world.get::<&BodyPart>(slot.owner) {
            return part.children.get(&slot.id).cloned();
        }
        let body = self.world.get::<&Body>(slot.owner).ok()?;
        body.root.as_ref().filter(|root| root.id == slot.id).cloned()
    }

    pub(crate) fn with_slot_mut<R>(
        &mut self,
        slot: &SlotRef,
        f: impl FnOnce(&mut PartSlot) -> R,
    ) -> Option<R> {
        if let Ok(mut part) = self.world.get::<&mut BodyPart>(slot.owner) {
            return part.children.get_mut(&slot.id).map(f);
        }
        let mut body = self.world.get::<&mut Body>(slot.owner).ok()?;
        body.root.as_mut().filter(|root| root.id == slot.id).map(f)
    }

    fn remove_slot(&mut self, slot: &SlotRef) {
        if let Ok(mut part) = self.world.get::<&mut BodyPart>(slot.owner) {
            part.children.remove(&slot.id);
        } else if let Ok(mut body) = self.world.get::<&mut Body>(slot.owner) {
            if body.root.as_ref().map_or(false, |root| root.id == slot.id) {
                body.root = None;
            }
        }
    }

    /// Body a slot owner belongs to: the body itself for a root slot,
    /// otherwise whatever body sits at the top of the owner's chain.
    pub(crate) fn resolve_body(&self, owner: Entity) -> Option<Entity> {
        self.ancestors(owner)
            .into_iter()
            .find(|e| self.world.get::<&Body>(*e).is_ok())
    }

    /// `entity` followed by every slot owner above it
    fn ancestors(&self, entity: Entity) -> Vec<Entity> {
        let mut chain = vec![entity];
        let mut current = entity;
        // Bounded in case a corrupt replica ever contains a loop
        for _ in 0..self.world.len() {
            let parent = match self.world.get::<&BodyPart>(current) {
                Ok(part) => part.parent_slot.as_ref().map(|slot| slot.owner),
                Err(_) => None,
            };
            match parent {
                Some(p) if !chain.contains(&p) => {
                    chain.push(p);
                    current = p;
                }
                _ => break,
            }
        }
        chain
    }

    fn check_attach(&self, part: Entity, slot: &SlotRef) -> Result<(), Rejection> {
        let part_type = self
            .world
            .get::<&BodyPart>(part)
            .map(|p| p.part_type)
            .map_err(|_| Rejection::MissingPart)?;
        let target = self.slot(slot).ok_or(Rejection::MissingSlot)?;

        if let Some(occupant) = target.occupant {
            return Err(Rejection::Occupied(occupant));
        }
        if let Some(accepts) = target.accepts {
            if accepts != part_type {
                return Err(Rejection::TypeMismatch {
                    accepts,
                    found: part_type,
                });
            }
        }
        if self.ancestors(slot.owner).contains(&part) {
            return Err(Rejection::Cycle);
        }

        let containers = &self.collaborators.containers;
        let container_id = &self.config.container_id;
        if !containers.has_container(slot.owner, container_id)
            || !containers.can_insert(slot.owner, container_id, part)
        {
            return Err(Rejection::ContainerRefused);
        }
        Ok(())
    }

    /// Whether `attach(part, slot)` would succeed
    pub fn can_attach(&self, part: Entity, slot: &SlotRef) -> bool {
        self.check_attach(part, slot).is_ok()
    }

    /// Attach a part to a slot, moving it out of any slot it currently holds
    pub fn attach(&mut self, part: Entity, slot: &SlotRef) -> Result<(), BodyError> {
        if let Err(reason) = self.check_attach(part, slot) {
            log::warn!("rejected attach of {:?} to {:?}: {:?}", part, slot, reason);
            return Err(BodyError::InvalidAttachment {
                part,
                slot: slot.clone(),
                reason,
            });
        }

        // The target slot is known to be empty, so only the candidate moves
        let unbound = self.unbind(part);

        let container_id = self.config.container_id.clone();
        if !self
            .collaborators
            .containers
            .insert(slot.owner, &container_id, part)
        {
            log::error!(
                "container on {:?} refused {:?} after accepting it; restoring",
                slot.owner,
                part
            );
            if let Some(binding) = unbound {
                self.rebind(binding);
            }
            return Err(BodyError::InvalidAttachment {
                part,
                slot: slot.clone(),
                reason: Rejection::ContainerRefused,
            });
        }

        if let Some(binding) = unbound {
            self.finish_detach(binding, false);
        }

        self.bind(part, slot, container_id);
        Ok(())
    }

    fn bind(&mut self, part: Entity, slot: &SlotRef, container_id: String) {
        self.with_slot_mut(slot, |s| s.occupant = Some(part));
        let body = self.resolve_body(slot.owner);

        let part_type = {
            let Ok(mut p) = self.world.get::<&mut BodyPart>(part) else {
                return;
            };
            p.parent_slot = Some(slot.clone());
            p.body = body;
            p.container = Some(ContainerRef {
                owner: slot.owner,
                name: container_id,
            });
            p.part_type
        };

        let subtree: Vec<Entity> = part_children(&self.world, part).collect();
        let organs: Vec<Entity> = subtree_organs(&self.world, part).collect();
        let mut touches_legs = part_type.affects_locomotion();
        for child in &subtree {
            if let Ok(mut p) = self.world.get::<&mut BodyPart>(*child) {
                p.body = body;
                touches_legs |= p.part_type.affects_locomotion();
            }
            self.replication.mark_dirty(*child);
        }
        for organ in &organs {
            if let Ok(mut o) = self.world.get::<&mut Organ>(*organ) {
                o.body = body;
            }
        }
        self.replication.mark_dirty(part);
        self.replication.mark_dirty(slot.owner);
        log::debug!("attached {:?} to {:?} (body {:?})", part, slot, body);

        let Some(body) = body else {
            return;
        };
        if touches_legs {
            update_movement_speed(
                &mut self.world,
                self.collaborators.movement.as_mut(),
                body,
            );
            stance::after_attach(
                &mut self.world,
                self.collaborators.stance.as_mut(),
                &mut self.events,
                body,
            );
        }
        self.events.publish(BodyEvent::PartAdded {
            body,
            slot: slot.clone(),
            part,
            part_type,
        });
        self.events.publish_all(
            organs
                .into_iter()
                .map(|organ| BodyEvent::OrganAddedToBody { organ, body }),
        );
        self.replication.mark_dirty(body);
    }

    /// Structurally undo a part's binding. No events, no side effects.
    fn unbind(&mut self, part: Entity) -> Option<Unbound> {
        let (slot, old_body, old_container, part_type, own_origin) = {
            let mut p = self.world.get::<&mut BodyPart>(part).ok()?;
            let slot = p.parent_slot.take()?;
            let old_body = p.body.take();
            let own_origin = p.original_body;
            if old_body.is_some() {
                p.original_body = old_body;
            }
            (slot, old_body, p.container.take(), p.part_type, own_origin)
        };
        self.with_slot_mut(&slot, |s| s.occupant = None);

        let mut previous_origins = vec![(part, own_origin)];
        let mut touches_legs = part_type.affects_locomotion();
        let subtree: Vec<Entity> = part_children(&self.world, part).collect();
        for child in subtree {
            if let Ok(mut p) = self.world.get::<&mut BodyPart>(child) {
                previous_origins.push((child, p.original_body));
                touches_legs |= p.part_type.affects_locomotion();
                if let Some(body) = p.body.take() {
                    p.original_body = Some(body);
                }
            }
        }
        let organs: Vec<Entity> = subtree_organs(&self.world, part).collect();
        for organ in &organs {
            if let Ok(mut o) = self.world.get::<&mut Organ>(*organ) {
                o.body = None;
            }
        }
        self.collaborators
            .containers
            .remove(slot.owner, &self.config.container_id, part);

        Some(Unbound {
            part,
            part_type,
            slot,
            old_body,
            old_container,
            previous_origins,
            organs,
            touches_legs,
        })
    }

    /// Reverse of [`Self::unbind`], used when an attach has to be rolled back
    fn rebind(&mut self, binding: Unbound) {
        self.with_slot_mut(&binding.slot, |s| s.occupant = Some(binding.part));
        self.collaborators
            .containers
            .insert(binding.slot.owner, &self.config.container_id, binding.part);
        for (entity, origin) in &binding.previous_origins {
            if let Ok(mut p) = self.world.get::<&mut BodyPart>(*entity) {
                p.body = binding.old_body;
                p.original_body = *origin;
            }
        }
        if let Ok(mut p) = self.world.get::<&mut BodyPart>(binding.part) {
            p.parent_slot = Some(binding.slot.clone());
            p.container = binding.old_container.clone();
        }
        for organ in &binding.organs {
            if let Ok(mut o) = self.world.get::<&mut Organ>(*organ) {
                o.body = binding.old_body;
            }
        }
    }

    /// Side effects of a committed detach
    fn finish_detach(&mut self, binding: Unbound, release: bool) {
        let part = binding.part;
        for (entity, _) in &binding.previous_origins {
            self.replication.mark_dirty(*entity);
        }
        self.replication.mark_dirty(binding.slot.owner);

        if release {
            self.release_into_free_space(part);
        }
        log::debug!(
            "detached {:?} from {:?} (body {:?})",
            part,
            binding.slot,
            binding.old_body
        );

        let Some(old_body) = binding.old_body else {
            return;
        };
        self.events.publish(BodyEvent::PartRemoved {
            body: old_body,
            slot: binding.slot.clone(),
            part,
            part_type: binding.part_type,
        });
        if binding.touches_legs {
            update_movement_speed(
                &mut self.world,
                self.collaborators.movement.as_mut(),
                old_body,
            );
            stance::after_detach(
                &mut self.world,
                self.collaborators.stance.as_mut(),
                &mut self.events,
                old_body,
            );
        }
        self.events.publish_all(
            binding
                .organs
                .iter()
                .map(|&organ| BodyEvent::OrganRemovedFromBody { organ, old_body }),
        );
        self.capture_appearance(part, old_body);
        self.replication.mark_dirty(old_body);
    }

    fn release_into_free_space(&mut self, part: Entity) {
        let transform = self.collaborators.transform.as_mut();
        transform.attach_to_free_space(&mut self.world, part);

        let offset = self.config.drop_offset;
        if !offset.is_finite() || offset <= 0.0 {
            return;
        }
        if let Some(coords) = transform.coordinates(&self.world, part) {
            let nudge = Vec3::new(
                self.rng.gen_range(-offset..=offset),
                self.rng.gen_range(-offset..=offset),
                0.0,
            );
            transform.set_coordinates(&mut self.world, part, coords + nudge);
        }
    }

    /// Keep the old body's skin tone on a part that has no appearance yet
    fn capture_appearance(&mut self, part: Entity, old_body: Entity) {
        if self.world.get::<&PartAppearance>(part).is_ok() {
            return;
        }
        let Some(skin) = self
            .world
            .get::<&HumanoidAppearance>(old_body)
            .ok()
            .map(|a| a.skin_color)
        else {
            return;
        };
        let _ = self.world.insert_one(
            part,
            PartAppearance {
                original_body: Some(old_body),
                color: skin,
            },
        );
    }

    /// Detach a part from its slot. The part keeps its own subtree.
    pub fn detach(&mut self, part: Entity) -> Result<(), BodyError> {
        if self.world.get::<&BodyPart>(part).is_err() {
            return Err(BodyError::unresolved(part, "BodyPart"));
        }
        let binding = self.unbind(part).ok_or(BodyError::NotAttached(part))?;
        self.finish_detach(binding, true);
        Ok(())
    }

    /// Detach a part and put it down at `coords`
    pub fn drop_part_at(&mut self, part: Entity, coords: Vec3) -> Result<(), BodyError> {
        self.detach(part)?;
        self.collaborators
            .transform
            .set_coordinates(&mut self.world, part, coords);
        Ok(())
    }

    /// Create a wildcard slot on `owner` and attach `part` to it. The slot is
    /// removed again if the attach is refused.
    pub fn create_slot_and_attach(
        &mut self,
        owner: Entity,
        slot_id: &str,
        part: Entity,
    ) -> Result<SlotRef, BodyError> {
        let slot = self.create_slot(owner, slot_id, None)?;
        if let Err(e) = self.attach(part, &slot) {
            self.remove_slot(&slot);
            return Err(e);
        }
        Ok(slot)
    }

    fn direct_children(&self, part: Entity) -> Vec<Entity> {
        self.world
            .get::<&BodyPart>(part)
            .map(|p| p.children.values().filter_map(|s| s.occupant).collect())
            .unwrap_or_default()
    }

    /// Detach a part and each of its direct children. Grandchildren stay on
    /// their own parents.
    pub fn orphan(&mut self, part: Entity) -> Result<(), BodyError> {
        if self.world.get::<&BodyPart>(part).is_err() {
            return Err(BodyError::unresolved(part, "BodyPart"));
        }
        if let Err(e) = self.detach(part) {
            if e != BodyError::NotAttached(part) {
                return Err(e);
            }
        }
        for child in self.direct_children(part) {
            let _ = self.detach(child);
        }
        Ok(())
    }

    /// Detach and destroy a part. Its direct children are dropped and its
    /// organs are released, not destroyed. Returns `false` if the part was
    /// already gone.
    pub fn delete_part(&mut self, part: Entity) -> bool {
        if self.orphan(part).is_err() {
            return false;
        }
        let organs: Vec<Entity> = super::traversal::part_organs(&self.world, part).collect();
        for organ in organs {
            if let Ok(mut o) = self.world.get::<&mut Organ>(organ) {
                o.parent_slot = None;
                o.body = None;
            }
        }
        self.destroy(part);
        true
    }

    /// Detach a part and destroy it together with everything below it,
    /// organs included
    pub fn delete_part_recursive(&mut self, part: Entity) -> bool {
        if self.world.get::<&BodyPart>(part).is_err() {
            return false;
        }
        let _ = self.detach(part);
        let organs: Vec<Entity> = subtree_organs(&self.world, part).collect();
        let subtree: Vec<Entity> = part_children(&self.world, part).collect();
        for entity in organs.into_iter().chain(subtree).chain(std::iter::once(part)) {
            self.destroy(entity);
        }
        true
    }

    fn destroy(&mut self, entity: Entity) {
        self.collaborators.containers.remove_owner(entity);
        // Organs never reach observers, so there is nothing to retract
        let replicated = self.world.get::<&Organ>(entity).is_err();
        if self.world.despawn(entity).is_ok() {
            if replicated {
                self.replication.mark_removed(entity);
            }
            log::debug!("destroyed {:?}", entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{Collaborators, ContainerManager, ContainerService};
    use crate::config::BodyConfig;

    fn system() -> BodySystem {
        BodySystem::with_config(
            BodyConfig {
                seed: Some(42),
                ..Default::default()
            },
            Collaborators::default(),
        )
    }

    /// Body with a torso in its root slot
    fn body_with_torso(system: &mut BodySystem) -> (Entity, Entity) {
        let body = system.spawn_body(None);
        let root = system.create_slot(body, "torso", Some(PartType::Torso)).unwrap();
        let torso = system.spawn_part(BodyPart::new(PartType::Torso));
        system.attach(torso, &root).unwrap();
        (body, torso)
    }

    #[test]
    fn test_duplicate_slot() {
        let mut system = system();
        let (body, torso) = body_with_torso(&mut system);

        system.create_slot(torso, "left arm", Some(PartType::Arm)).unwrap();
        assert!(matches!(
            system.create_slot(torso, "left arm", None),
            Err(BodyError::DuplicateSlot { .. })
        ));
        assert!(matches!(
            system.create_slot(body, "second root", None),
            Err(BodyError::DuplicateSlot { .. })
        ));

        let organ = system.spawn_organ();
        assert!(matches!(
            system.create_slot(organ, "x", None),
            Err(BodyError::UnresolvedComponent { .. })
        ));
    }

    #[test]
    fn test_attach_sets_body_on_subtree() {
        let mut system = system();
        let (body, torso) = body_with_torso(&mut system);

        let arm = system.spawn_part(BodyPart::new(PartType::Arm));
        let hand_slot = system.create_slot(arm, "hand", Some(PartType::Hand)).unwrap();
        let hand = system.spawn_part(BodyPart::new(PartType::Hand));
        system.attach(hand, &hand_slot).unwrap();
        assert_eq!(system.part(hand).unwrap().body, None);

        let arm_slot = system.create_slot(torso, "left arm", Some(PartType::Arm)).unwrap();
        system.attach(arm, &arm_slot).unwrap();

        assert_eq!(system.part(arm).unwrap().body, Some(body));
        assert_eq!(system.part(hand).unwrap().body, Some(body));
        assert_eq!(system.part(arm).unwrap().parent_slot, Some(arm_slot.clone()));
        assert_eq!(system.slot(&arm_slot).unwrap().occupant, Some(arm));
        assert!(system
            .containers()
            .contains(torso, &system.config().container_id, arm));
    }

    #[test]
    fn test_attach_rejections_leave_graph_untouched() {
        let mut system = system();
        let (_, torso) = body_with_torso(&mut system);
        let sub = system.events.subscribe();

        let leg_slot = system.create_slot(torso, "left leg", Some(PartType::Leg)).unwrap();
        let arm = system.spawn_part(BodyPart::new(PartType::Arm));

        assert!(!system.can_attach(arm, &leg_slot));
        assert!(matches!(
            system.attach(arm, &leg_slot),
            Err(BodyError::InvalidAttachment {
                reason: Rejection::TypeMismatch { .. },
                ..
            })
        ));

        let missing = SlotRef::new(torso, "nope");
        assert!(matches!(
            system.attach(arm, &missing),
            Err(BodyError::InvalidAttachment {
                reason: Rejection::MissingSlot,
                ..
            })
        ));

        assert_eq!(system.slot(&leg_slot).unwrap().occupant, None);
        assert_eq!(system.part(arm).unwrap().parent_slot, None);
        assert!(system.events.drain(sub).is_empty());
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut system = system();
        let (_, torso) = body_with_torso(&mut system);

        let arm_slot = system.create_slot(torso, "arm", None).unwrap();
        let arm = system.spawn_part(BodyPart::new(PartType::Arm));
        system.attach(arm, &arm_slot).unwrap();
        let hand_slot = system.create_slot(arm, "hand", None).unwrap();

        // The torso may not hang below its own arm
        assert!(matches!(
            system.attach(torso, &hand_slot),
            Err(BodyError::InvalidAttachment {
                reason: Rejection::Cycle,
                ..
            })
        ));
        let own_slot = system.create_slot(arm, "self", None).unwrap();
        assert!(!system.can_attach(arm, &own_slot));
    }

    #[test]
    fn test_occupied_slot_is_refused() {
        let mut system = system();
        let (_, torso) = body_with_torso(&mut system);
        let slot = system.create_slot(torso, "tail", Some(PartType::Tail)).unwrap();
        let first = system.spawn_part(BodyPart::new(PartType::Tail));
        let second = system.spawn_part(BodyPart::new(PartType::Tail));
        system.attach(first, &slot).unwrap();

        assert!(matches!(
            system.attach(second, &slot),
            Err(BodyError::InvalidAttachment {
                reason: Rejection::Occupied(e),
                ..
            }) if e == first
        ));
    }

    #[test]
    fn test_reattach_moves_part() {
        let mut system = system();
        let (_, torso) = body_with_torso(&mut system);
        let a = system.create_slot(torso, "a", Some(PartType::Arm)).unwrap();
        let b = system.create_slot(torso, "b", Some(PartType::Arm)).unwrap();
        let arm = system.spawn_part(BodyPart::new(PartType::Arm));

        system.attach(arm, &a).unwrap();
        system.attach(arm, &b).unwrap();

        assert_eq!(system.slot(&a).unwrap().occupant, None);
        assert_eq!(system.slot(&b).unwrap().occupant, Some(arm));
        assert_eq!(system.part(arm).unwrap().parent_slot, Some(b));
    }

    #[test]
    fn test_detach_records_provenance() {
        let mut system = system();
        let (body, torso) = body_with_torso(&mut system);
        let slot = system.create_slot(torso, "arm", None).unwrap();
        let arm = system.spawn_part(BodyPart::new(PartType::Arm));
        system.attach(arm, &slot).unwrap();

        system.detach(arm).unwrap();
        let detached = system.part(arm).unwrap();
        assert_eq!(detached.body, None);
        assert_eq!(detached.original_body, Some(body));
        assert_eq!(detached.parent_slot, None);
        assert_eq!(detached.container, None);

        assert_eq!(system.detach(arm), Err(BodyError::NotAttached(arm)));
    }

    #[test]
    fn test_detach_captures_skin() {
        let mut system = system();
        let (body, torso) = body_with_torso(&mut system);
        let skin = Color::rgb(0.8, 0.6, 0.5);
        system
            .world_mut()
            .insert_one(body, HumanoidAppearance { skin_color: skin })
            .unwrap();
        let slot = system.create_slot(torso, "arm", None).unwrap();
        let arm = system.spawn_part(BodyPart::new(PartType::Arm));
        system.attach(arm, &slot).unwrap();

        system.detach(arm).unwrap();
        let appearance = *system.world().get::<&PartAppearance>(arm).unwrap();
        assert_eq!(appearance.color, skin);
        assert_eq!(appearance.original_body, Some(body));
    }

    #[test]
    fn test_drop_part_at() {
        let mut system = system();
        let (_, torso) = body_with_torso(&mut system);
        let slot = system.create_slot(torso, "head", None).unwrap();
        let head = system.spawn_part(BodyPart::new(PartType::Head));
        system.attach(head, &slot).unwrap();

        let target = Vec3::new(10.0, 3.0, 0.0);
        system.drop_part_at(head, target).unwrap();
        let transform = *system.world().get::<&Transform>(head).unwrap();
        assert_eq!(transform.position, target);
        assert!(transform.is_free());
    }

    #[test]
    fn test_non_finite_drop_offset_leaves_part_in_place() {
        for drop_offset in [f32::NAN, f32::INFINITY] {
            let mut system = BodySystem::with_config(
                BodyConfig {
                    drop_offset,
                    seed: Some(3),
                    ..Default::default()
                },
                Collaborators::default(),
            );
            let (_, torso) = body_with_torso(&mut system);
            let slot = system.create_slot(torso, "leg", Some(PartType::Leg)).unwrap();
            let leg = system.spawn_part(BodyPart::new(PartType::Leg));
            system.attach(leg, &slot).unwrap();

            assert_eq!(system.detach(leg), Ok(()));
            let transform = *system.world().get::<&Transform>(leg).unwrap();
            assert_eq!(transform.position, Vec3::default());
        }
    }

    #[test]
    fn test_new_foot_slot_takes_leg_out_of_service() {
        let mut system = system();
        let (body, torso) = body_with_torso(&mut system);
        let slot = system.create_slot(torso, "leg", Some(PartType::Leg)).unwrap();
        let leg = system.spawn_part(BodyPart::new(PartType::Leg));
        system
            .world_mut()
            .insert_one(leg, MovementSpeedModifier::new(4.0, 6.0, 1.0))
            .unwrap();
        system.attach(leg, &slot).unwrap();
        assert_eq!(
            system.movement_speed(body),
            Some(MovementSpeedModifier::new(2.0, 3.0, 0.5))
        );

        system.create_slot(leg, "foot", Some(PartType::Foot)).unwrap();
        assert_eq!(
            system.movement_speed(body),
            Some(MovementSpeedModifier::default())
        );
        assert_eq!(system.stance(body), Some(Stance::Fallen));
    }

    #[test]
    fn test_destroyed_organs_are_not_retracted() {
        let mut system = system();
        let (_, torso) = body_with_torso(&mut system);
        let slot = system.create_slot(torso, "tail", None).unwrap();
        let tail = system.spawn_part(BodyPart::new(PartType::Tail));
        system.attach(tail, &slot).unwrap();
        system.create_organ_slot(tail, "gland").unwrap();
        let gland = system.spawn_organ();
        system.insert_organ(gland, tail, "gland").unwrap();
        system.sync();

        assert!(system.delete_part_recursive(tail));
        let removed: Vec<Entity> = system
            .sync()
            .updates
            .into_iter()
            .filter_map(|u| match u {
                crate::replication::StateUpdate::Removed { entity } => Some(entity),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![tail]);
    }

    #[test]
    fn test_create_slot_and_attach_cleans_up() {
        let mut system = system();
        let (_, torso) = body_with_torso(&mut system);
        let organ = system.spawn_organ();

        assert!(system.create_slot_and_attach(torso, "bogus", organ).is_err());
        assert!(system.slot(&SlotRef::new(torso, "bogus")).is_none());

        let tail = system.spawn_part(BodyPart::new(PartType::Tail));
        let slot = system.create_slot_and_attach(torso, "tail", tail).unwrap();
        assert_eq!(system.slot(&slot).unwrap().occupant, Some(tail));
    }

    /// Refuses the second insert of anything, after claiming it would accept
    struct FlakyContainers {
        inner: ContainerManager,
        inserts: usize,
    }

    impl ContainerService for FlakyContainers {
        fn ensure_container(&mut self, owner: Entity, name: &str) {
            self.inner.ensure_container(owner, name)
        }
        fn has_container(&self, owner: Entity, name: &str) -> bool {
            self.inner.has_container(owner, name)
        }
        fn can_insert(&self, owner: Entity, name: &str, item: Entity) -> bool {
            self.inner.can_insert(owner, name, item)
        }
        fn insert(&mut self, owner: Entity, name: &str, item: Entity) -> bool {
            self.inserts += 1;
            self.inserts != 3 && self.inner.insert(owner, name, item)
        }
        fn remove(&mut self, owner: Entity, name: &str, item: Entity) -> bool {
            self.inner.remove(owner, name, item)
        }
        fn contains(&self, owner: Entity, name: &str, item: Entity) -> bool {
            self.inner.contains(owner, name, item)
        }
        fn remove_owner(&mut self, owner: Entity) {
            self.inner.remove_owner(owner)
        }
    }

    #[test]
    fn test_failed_insert_rolls_back() {
        let collaborators = Collaborators::default().with_containers(FlakyContainers {
            inner: ContainerManager::new(),
            inserts: 0,
        });
        let mut system = BodySystem::with_config(BodyConfig::default(), collaborators);
        let (body, torso) = body_with_torso(&mut system); // insert #1
        let a = system.create_slot(torso, "a", None).unwrap();
        let b = system.create_slot(torso, "b", None).unwrap();
        let arm = system.spawn_part(BodyPart::new(PartType::Arm));
        system.attach(arm, &a).unwrap(); // insert #2
        let sub = system.events.subscribe();

        // insert #3 fails after validation passed
        assert!(system.attach(arm, &b).is_err());
        assert_eq!(system.slot(&a).unwrap().occupant, Some(arm));
        assert_eq!(system.slot(&b).unwrap().occupant, None);
        let restored = system.part(arm).unwrap();
        assert_eq!(restored.parent_slot, Some(a));
        assert_eq!(restored.body, Some(body));
        assert!(system.events.drain(sub).is_empty());
    }
}
