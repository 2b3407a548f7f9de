//! Stance - decides whether a body stands or lies on the ground
//!
//! A body falls when it has no legs or when none of its legs is functional.
//! It only gets back up as the result of an attach that gives it a
//! functional leg again; nothing else stands a body up.

use hecs::{Entity, World};

use super::events::{BodyEvent, EventBus};
use super::traversal::body_children_of_type;
use crate::collaborators::StanceService;
use crate::components::{Body, BodyPart, PartType, Stance};

/// Zero legs, or every leg missing a foot
pub fn should_fall(world: &World, body: Entity) -> bool {
    let mut legs = body_children_of_type(world, body, PartType::Leg).peekable();
    if legs.peek().is_none() {
        return true;
    }
    legs.all(|leg| {
        world
            .get::<&BodyPart>(leg)
            .map_or(true, |p| !p.is_functional_leg())
    })
}

pub fn stance(world: &World, body: Entity) -> Option<Stance> {
    world.get::<&Body>(body).ok().map(|b| b.stance)
}

fn transition(
    world: &mut World,
    service: &mut dyn StanceService,
    events: &mut EventBus,
    body: Entity,
    to: Stance,
) -> bool {
    {
        let Ok(mut body_comp) = world.get::<&mut Body>(body) else {
            return false;
        };
        if body_comp.stance == to {
            return false;
        }
        body_comp.stance = to;
    }

    log::info!("body {:?} is now {:?}", body, to);
    match to {
        Stance::Standing => service.stand(world, body),
        Stance::Fallen => service.down(world, body),
    }
    events.publish(BodyEvent::StanceChanged { body, stance: to });
    true
}

/// Run after a leg or foot left the body. Returns `true` on a transition.
pub fn after_detach(
    world: &mut World,
    service: &mut dyn StanceService,
    events: &mut EventBus,
    body: Entity,
) -> bool {
    if should_fall(world, body) {
        return transition(world, service, events, body, Stance::Fallen);
    }
    false
}

/// Run after a leg or foot joined the body. Returns `true` on a transition.
pub fn after_attach(
    world: &mut World,
    service: &mut dyn StanceService,
    events: &mut EventBus,
    body: Entity,
) -> bool {
    if !should_fall(world, body) {
        return transition(world, service, events, body, Stance::Standing);
    }
    false
}
