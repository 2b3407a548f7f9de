//! Surface state and decorative markers on parts and slots
//!
//! None of these change the graph's shape. Each setter returns whether the
//! value actually changed; an event is published only when it did.

use hecs::Entity;

use super::events::{BodyEvent, SurfaceKind};
use crate::components::{BodyPart, SlotRef};
use crate::engine::BodySystem;
use crate::error::{BodyError, Rejection};

impl BodySystem {
    fn set_surface(&mut self, part: Entity, kind: SurfaceKind, value: bool) -> Result<bool, BodyError> {
        let body = {
            let mut p = self
                .world
                .get::<&mut BodyPart>(part)
                .map_err(|_| BodyError::unresolved(part, "BodyPart"))?;
            let capable = match kind {
                SurfaceKind::Incised | SurfaceKind::Opened => p.incisable,
                SurfaceKind::EndoOpened => p.endo_skeleton,
                SurfaceKind::ExoOpened => p.exo_skeleton,
            };
            if !capable {
                return Ok(false);
            }
            let flag = match kind {
                SurfaceKind::Incised => &mut p.incised,
                SurfaceKind::Opened => &mut p.opened,
                SurfaceKind::EndoOpened => &mut p.endo_opened,
                SurfaceKind::ExoOpened => &mut p.exo_opened,
            };
            if *flag == value {
                return Ok(false);
            }
            *flag = value;
            p.body
        };

        self.replication.mark_dirty(part);
        self.events.publish(BodyEvent::SurfaceChanged {
            body,
            part,
            kind,
            value,
        });
        Ok(true)
    }

    /// Only applies to incisable parts
    pub fn set_part_incised(&mut self, part: Entity, incised: bool) -> Result<bool, BodyError> {
        self.set_surface(part, SurfaceKind::Incised, incised)
    }

    /// Only applies to incisable parts
    pub fn set_part_opened(&mut self, part: Entity, opened: bool) -> Result<bool, BodyError> {
        self.set_surface(part, SurfaceKind::Opened, opened)
    }

    pub fn set_endo_opened(&mut self, part: Entity, opened: bool) -> Result<bool, BodyError> {
        self.set_surface(part, SurfaceKind::EndoOpened, opened)
    }

    pub fn set_exo_opened(&mut self, part: Entity, opened: bool) -> Result<bool, BodyError> {
        self.set_surface(part, SurfaceKind::ExoOpened, opened)
    }

    fn missing_slot(slot: &SlotRef) -> BodyError {
        BodyError::InvalidAttachment {
            part: slot.owner,
            slot: slot.clone(),
            reason: Rejection::MissingSlot,
        }
    }

    pub fn set_slot_cauterized(&mut self, slot: &SlotRef, cauterized: bool) -> Result<bool, BodyError> {
        let changed = self
            .with_slot_mut(slot, |s| {
                let changed = s.cauterized != cauterized;
                s.cauterized = cauterized;
                changed
            })
            .ok_or_else(|| Self::missing_slot(slot))?;
        if changed {
            self.replication.mark_dirty(slot.owner);
            let body = self.resolve_body(slot.owner);
            self.events.publish(BodyEvent::SlotCauterized {
                body,
                slot: slot.clone(),
                cauterized,
            });
        }
        Ok(changed)
    }

    fn replace_slot_attachment(
        &mut self,
        slot: &SlotRef,
        attachment: Option<Entity>,
    ) -> Result<bool, BodyError> {
        let changed = self
            .with_slot_mut(slot, |s| match (s.attachment, attachment) {
                (Some(_), Some(_)) | (None, None) => false,
                _ => {
                    s.attachment = attachment;
                    true
                }
            })
            .ok_or_else(|| Self::missing_slot(slot))?;
        if changed {
            self.replication.mark_dirty(slot.owner);
            let body = self.resolve_body(slot.owner);
            self.events.publish(BodyEvent::SlotAttachmentChanged {
                body,
                slot: slot.clone(),
                attachment,
            });
        }
        Ok(changed)
    }

    /// Hang a marker on a slot. Refused (returns `false`) if one is already there.
    pub fn set_slot_attachment(&mut self, slot: &SlotRef, marker: Entity) -> Result<bool, BodyError> {
        self.replace_slot_attachment(slot, Some(marker))
    }

    pub fn clear_slot_attachment(&mut self, slot: &SlotRef) -> Result<bool, BodyError> {
        self.replace_slot_attachment(slot, None)
    }

    fn replace_part_attachment(
        &mut self,
        part: Entity,
        attachment: Option<Entity>,
    ) -> Result<bool, BodyError> {
        let (changed, body) = {
            let mut p = self
                .world
                .get::<&mut BodyPart>(part)
                .map_err(|_| BodyError::unresolved(part, "BodyPart"))?;
            let changed = match (p.attachment, attachment) {
                (Some(_), Some(_)) | (None, None) => false,
                _ => {
                    p.attachment = attachment;
                    true
                }
            };
            (changed, p.body)
        };
        if changed {
            self.replication.mark_dirty(part);
            self.events.publish(BodyEvent::PartAttachmentChanged {
                body,
                part,
                attachment,
            });
        }
        Ok(changed)
    }

    /// Hang a marker on a part. Refused (returns `false`) if one is already there.
    pub fn set_part_attachment(&mut self, part: Entity, marker: Entity) -> Result<bool, BodyError> {
        self.replace_part_attachment(part, Some(marker))
    }

    pub fn clear_part_attachment(&mut self, part: Entity) -> Result<bool, BodyError> {
        self.replace_part_attachment(part, None)
    }
}
