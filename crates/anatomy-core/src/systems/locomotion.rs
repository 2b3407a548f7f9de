//! Locomotion - derives a body's base speed from the legs it stands on

use hecs::{Entity, World};

use super::traversal::body_all_slots;
use crate::collaborators::MovementService;
use crate::components::{Body, BodyPart, MovementSpeedModifier, PartType};

/// Legs that count towards speed: occupants of Leg slots with every foot
/// slot filled
pub fn functional_legs(world: &World, body: Entity) -> Vec<Entity> {
    body_all_slots(world, body)
        .filter(|slot| slot.accepts == Some(PartType::Leg))
        .filter_map(|slot| slot.occupant)
        .filter(|leg| {
            world
                .get::<&BodyPart>(*leg)
                .map_or(false, |p| p.is_functional_leg())
        })
        .collect()
}

/// Sum of leg contributions divided by the body's required leg count.
///
/// Returns `None` when the body can't hold a speed: no body component, no
/// movement modifier, or `required_legs == 0`. An empty root slot has no legs
/// and yields zero.
pub fn compute_movement_speed(world: &World, body: Entity) -> Option<MovementSpeedModifier> {
    let required_legs = world.get::<&Body>(body).ok()?.required_legs;
    if required_legs == 0 || world.get::<&MovementSpeedModifier>(body).is_err() {
        return None;
    }

    let mut total = MovementSpeedModifier::default();
    for leg in functional_legs(world, body) {
        // A leg without a modifier adds nothing
        let Ok(modifier) = world.get::<&MovementSpeedModifier>(leg) else {
            continue;
        };
        total.base_walk_speed += modifier.base_walk_speed;
        total.base_sprint_speed += modifier.base_sprint_speed;
        total.acceleration += modifier.acceleration;
    }

    let divisor = required_legs as f32;
    Some(MovementSpeedModifier::new(
        total.base_walk_speed / divisor,
        total.base_sprint_speed / divisor,
        total.acceleration / divisor,
    ))
}

/// Recompute and push the body's speed. Returns `false` if it was skipped.
pub fn update_movement_speed(
    world: &mut World,
    movement: &mut dyn MovementService,
    body: Entity,
) -> bool {
    let Some(speed) = compute_movement_speed(world, body) else {
        return false;
    };
    log::debug!(
        "body {:?} speed -> walk {:.2} sprint {:.2} accel {:.2}",
        body,
        speed.base_walk_speed,
        speed.base_sprint_speed,
        speed.acceleration
    );
    movement.change_base_speed(
        world,
        body,
        speed.base_walk_speed,
        speed.base_sprint_speed,
        speed.acceleration,
    );
    true
}
