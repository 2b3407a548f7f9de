//! Organ slots - organs are leaves hung off a part

use hecs::Entity;

use super::events::BodyEvent;
use crate::components::{BodyPart, Organ, OrganSlot, SlotRef};
use crate::engine::BodySystem;
use crate::error::{BodyError, Rejection};

impl BodySystem {
    pub fn create_organ_slot(&mut self, part: Entity, slot_id: &str) -> Result<SlotRef, BodyError> {
        {
            let mut p = self
                .world
                .get::<&mut BodyPart>(part)
                .map_err(|_| BodyError::unresolved(part, "BodyPart"))?;
            if p.organs.contains_key(slot_id) {
                return Err(BodyError::DuplicateSlot {
                    owner: part,
                    id: slot_id.to_string(),
                });
            }
            p.organs
                .insert(slot_id.to_string(), OrganSlot::new(slot_id, part));
        }
        self.replication.mark_dirty(part);
        Ok(SlotRef::new(part, slot_id))
    }

    /// Put an organ into an organ slot, taking it out of any slot it holds
    pub fn insert_organ(&mut self, organ: Entity, part: Entity, slot_id: &str) -> Result<(), BodyError> {
        let slot = SlotRef::new(part, slot_id);
        let refuse = |reason| BodyError::InvalidAttachment {
            part: organ,
            slot: slot.clone(),
            reason,
        };
        if self.world.get::<&Organ>(organ).is_err() {
            return Err(refuse(Rejection::MissingPart));
        }
        let host_body = {
            let p = self
                .world
                .get::<&BodyPart>(part)
                .map_err(|_| BodyError::unresolved(part, "BodyPart"))?;
            let target = p
                .organs
                .get(slot_id)
                .ok_or_else(|| refuse(Rejection::MissingSlot))?;
            if let Some(occupant) = target.occupant {
                return Err(refuse(Rejection::Occupied(occupant)));
            }
            p.body
        };

        if self.organ(organ).and_then(|o| o.parent_slot).is_some() {
            self.remove_organ(organ)?;
        }

        if let Ok(mut p) = self.world.get::<&mut BodyPart>(part) {
            if let Some(target) = p.organs.get_mut(slot_id) {
                target.occupant = Some(organ);
            }
        }
        if let Ok(mut o) = self.world.get::<&mut Organ>(organ) {
            o.parent_slot = Some(slot.clone());
            o.body = host_body;
        }
        self.replication.mark_dirty(part);

        if let Some(body) = host_body {
            self.events.publish(BodyEvent::OrganAddedToBody { organ, body });
        }
        log::debug!("inserted organ {:?} into {:?}", organ, slot);
        Ok(())
    }

    /// Take an organ out of its slot. The organ entity survives.
    pub fn remove_organ(&mut self, organ: Entity) -> Result<(), BodyError> {
        let (slot, old_body) = {
            let mut o = self
                .world
                .get::<&mut Organ>(organ)
                .map_err(|_| BodyError::unresolved(organ, "Organ"))?;
            let slot = o.parent_slot.take().ok_or(BodyError::NotAttached(organ))?;
            (slot, o.body.take())
        };

        if let Ok(mut p) = self.world.get::<&mut BodyPart>(slot.owner) {
            if let Some(s) = p.organs.get_mut(&slot.id) {
                if s.occupant == Some(organ) {
                    s.occupant = None;
                }
            }
        }
        self.replication.mark_dirty(slot.owner);

        if let Some(old_body) = old_body {
            self.events
                .publish(BodyEvent::OrganRemovedFromBody { organ, old_body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PartType;

    #[test]
    fn test_organ_lifecycle() {
        let mut system = BodySystem::new();
        let body = system.spawn_body(None);
        let root = system.create_slot(body, "torso", None).unwrap();
        let torso = system.spawn_part(BodyPart::new(PartType::Torso));
        system.attach(torso, &root).unwrap();
        system.create_organ_slot(torso, "heart").unwrap();
        assert!(matches!(
            system.create_organ_slot(torso, "heart"),
            Err(BodyError::DuplicateSlot { .. })
        ));

        let sub = system.events.subscribe();
        let heart = system.spawn_organ();
        system.insert_organ(heart, torso, "heart").unwrap();
        assert_eq!(system.organ(heart).unwrap().body, Some(body));
        assert_eq!(
            system.events.drain(sub),
            vec![BodyEvent::OrganAddedToBody { organ: heart, body }]
        );

        let other = system.spawn_organ();
        assert!(system.insert_organ(other, torso, "heart").is_err());

        system.remove_organ(heart).unwrap();
        assert_eq!(system.organ(heart).unwrap(), Organ::default());
        assert_eq!(
            system.events.drain(sub),
            vec![BodyEvent::OrganRemovedFromBody {
                organ: heart,
                old_body: body
            }]
        );
        assert_eq!(system.remove_organ(heart), Err(BodyError::NotAttached(heart)));
    }

    #[test]
    fn test_organ_follows_part_out_of_body() {
        let mut system = BodySystem::new();
        let body = system.spawn_body(None);
        let root = system.create_slot(body, "torso", None).unwrap();
        let torso = system.spawn_part(BodyPart::new(PartType::Torso));
        system.attach(torso, &root).unwrap();
        let head_slot = system.create_slot(torso, "head", Some(PartType::Head)).unwrap();
        let head = system.spawn_part(BodyPart::new(PartType::Head));
        system.create_organ_slot(head, "brain").unwrap();
        let brain = system.spawn_organ();
        system.insert_organ(brain, head, "brain").unwrap();
        assert_eq!(system.organ(brain).unwrap().body, None);

        system.attach(head, &head_slot).unwrap();
        assert_eq!(system.organ(brain).unwrap().body, Some(body));

        let sub = system.events.subscribe();
        system.detach(head).unwrap();
        assert_eq!(system.organ(brain).unwrap().body, None);
        assert!(system
            .events
            .drain(sub)
            .contains(&BodyEvent::OrganRemovedFromBody {
                organ: brain,
                old_body: body
            }));
    }
}
