//! Structural events - notifications raised when the body graph changes
//!
//! The graph never calls into appearance, AI or damage code. It publishes a
//! [`BodyEvent`] and every subscriber drains its own queue on its own schedule.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::components::{PartType, SlotRef, Stance};

/// Which surface flag changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceKind {
    Incised,
    Opened,
    EndoOpened,
    ExoOpened,
}

/// A structural change to the body graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyEvent {
    /// A part joined a body's graph
    PartAdded {
        body: Entity,
        slot: SlotRef,
        part: Entity,
        part_type: PartType,
    },
    /// A part left a body's graph
    PartRemoved {
        body: Entity,
        slot: SlotRef,
        part: Entity,
        part_type: PartType,
    },
    OrganAddedToBody {
        organ: Entity,
        body: Entity,
    },
    OrganRemovedFromBody {
        organ: Entity,
        old_body: Entity,
    },
    SlotAttachmentChanged {
        body: Option<Entity>,
        slot: SlotRef,
        attachment: Option<Entity>,
    },
    SlotCauterized {
        body: Option<Entity>,
        slot: SlotRef,
        cauterized: bool,
    },
    PartAttachmentChanged {
        body: Option<Entity>,
        part: Entity,
        attachment: Option<Entity>,
    },
    SurfaceChanged {
        body: Option<Entity>,
        part: Entity,
        kind: SurfaceKind,
        value: bool,
    },
    StanceChanged {
        body: Entity,
        stance: Stance,
    },
}

impl BodyEvent {
    /// The body this event is addressed to, if any
    pub fn body(&self) -> Option<Entity> {
        match self {
            BodyEvent::PartAdded { body, .. }
            | BodyEvent::PartRemoved { body, .. }
            | BodyEvent::OrganAddedToBody { body, .. }
            | BodyEvent::StanceChanged { body, .. } => Some(*body),
            BodyEvent::OrganRemovedFromBody { old_body, .. } => Some(*old_body),
            BodyEvent::SlotAttachmentChanged { body, .. }
            | BodyEvent::SlotCauterized { body, .. }
            | BodyEvent::PartAttachmentChanged { body, .. }
            | BodyEvent::SurfaceChanged { body, .. } => *body,
        }
    }

    /// The organ this event is addressed to, for organ lifecycle events
    pub fn organ(&self) -> Option<Entity> {
        match self {
            BodyEvent::OrganAddedToBody { organ, .. }
            | BodyEvent::OrganRemovedFromBody { organ, .. } => Some(*organ),
            _ => None,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(u32);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Subscriber {
    id: u32,
    queue: Vec<BodyEvent>,
}

/// Fan-out queue of structural events.
///
/// Every published event is copied into each subscriber's queue. Events are
/// also counted so tests can assert that nothing was emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u32,
    published: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> SubscriberId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            queue: Vec::new(),
        });
        SubscriberId(id)
    }

    pub fn unsubscribe(&mut self, subscriber: SubscriberId) {
        self.subscribers.retain(|s| s.id != subscriber.0);
    }

    pub fn publish(&mut self, event: BodyEvent) {
        log::trace!("publish {:?}", event);
        self.published += 1;
        for subscriber in &mut self.subscribers {
            subscriber.queue.push(event.clone());
        }
    }

    pub(crate) fn publish_all(&mut self, events: impl IntoIterator<Item = BodyEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Take every event queued for this subscriber
    pub fn drain(&mut self, subscriber: SubscriberId) -> Vec<BodyEvent> {
        self.subscribers
            .iter_mut()
            .find(|s| s.id == subscriber.0)
            .map(|s| std::mem::take(&mut s.queue))
            .unwrap_or_default()
    }

    /// Number of events waiting for this subscriber
    pub fn pending(&self, subscriber: SubscriberId) -> usize {
        self.subscribers
            .iter()
            .find(|s| s.id == subscriber.0)
            .map_or(0, |s| s.queue.len())
    }

    /// Total events published since creation
    pub fn published(&self) -> u64 {
        self.published
    }
}
