//! Interfaces to the subsystems the body graph depends on.
//!
//! The graph talks to containment, movement, stance and transform code only
//! through these traits. Each trait has a default implementation that keeps
//! its state in the hecs world or in memory, which is what the engine uses
//! unless the caller injects something else via [`Collaborators`].

use std::collections::HashMap;

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

use crate::components::{MovementSpeedModifier, Transform, Vec3};

/// Physical containment of parts inside their slot owner
pub trait ContainerService {
    fn ensure_container(&mut self, owner: Entity, name: &str);
    fn has_container(&self, owner: Entity, name: &str) -> bool;
    /// Must be `true` only if a following `insert` of the same item succeeds
    fn can_insert(&self, owner: Entity, name: &str, item: Entity) -> bool;
    fn insert(&mut self, owner: Entity, name: &str, item: Entity) -> bool;
    fn remove(&mut self, owner: Entity, name: &str, item: Entity) -> bool;
    fn contains(&self, owner: Entity, name: &str, item: Entity) -> bool;
    /// Forget every container owned by a destroyed entity
    fn remove_owner(&mut self, owner: Entity);
}

/// Receives the aggregate speed computed from a body's legs
pub trait MovementService {
    fn change_base_speed(
        &mut self,
        world: &mut World,
        body: Entity,
        walk: f32,
        sprint: f32,
        acceleration: f32,
    );
}

/// Notified when a body falls over or gets back up
pub trait StanceService {
    fn stand(&mut self, world: &mut World, body: Entity);
    fn down(&mut self, world: &mut World, body: Entity);
}

/// Places entities in the world
pub trait TransformService {
    /// Detach the entity from whatever carries it and leave it loose
    fn attach_to_free_space(&mut self, world: &mut World, entity: Entity);
    fn set_coordinates(&mut self, world: &mut World, entity: Entity, coords: Vec3);
    fn coordinates(&self, world: &World, entity: Entity) -> Option<Vec3>;
}

/// A named container on an owner entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    pub items: Vec<Entity>,
    /// `None` is unbounded
    pub capacity: Option<usize>,
}

impl Container {
    fn has_room(&self) -> bool {
        self.capacity.map_or(true, |cap| self.items.len() < cap)
    }
}

/// In-memory containers keyed by `(owner, name)`
#[derive(Debug, Clone, Default)]
pub struct ContainerManager {
    containers: HashMap<(Entity, String), Container>,
}

impl ContainerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: Entity, name: &str) -> Option<&Container> {
        self.containers.get(&(owner, name.to_string()))
    }

    /// Limit how many items a container may hold, creating it if needed
    pub fn set_capacity(&mut self, owner: Entity, name: &str, capacity: Option<usize>) {
        self.containers
            .entry((owner, name.to_string()))
            .or_default()
            .capacity = capacity;
    }
}

impl ContainerService for ContainerManager {
    fn ensure_container(&mut self, owner: Entity, name: &str) {
        self.containers.entry((owner, name.to_string())).or_default();
    }

    fn has_container(&self, owner: Entity, name: &str) -> bool {
        self.get(owner, name).is_some()
    }

    fn can_insert(&self, owner: Entity, name: &str, item: Entity) -> bool {
        if owner == item {
            return false;
        }
        match self.get(owner, name) {
            Some(container) => container.items.contains(&item) || container.has_room(),
            None => false,
        }
    }

    fn insert(&mut self, owner: Entity, name: &str, item: Entity) -> bool {
        if !self.can_insert(owner, name, item) {
            return false;
        }
        let container = self.containers.entry((owner, name.to_string())).or_default();
        if !container.items.contains(&item) {
            container.items.push(item);
        }
        true
    }

    fn remove(&mut self, owner: Entity, name: &str, item: Entity) -> bool {
        match self.containers.get_mut(&(owner, name.to_string())) {
            Some(container) => {
                let before = container.items.len();
                container.items.retain(|e| *e != item);
                container.items.len() != before
            }
            None => false,
        }
    }

    fn contains(&self, owner: Entity, name: &str, item: Entity) -> bool {
        self.get(owner, name)
            .map_or(false, |c| c.items.contains(&item))
    }

    fn remove_owner(&mut self, owner: Entity) {
        self.containers.retain(|(o, _), _| *o != owner);
    }
}

/// Writes the aggregate into the body's own [`MovementSpeedModifier`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentMovement;

impl MovementService for ComponentMovement {
    fn change_base_speed(
        &mut self,
        world: &mut World,
        body: Entity,
        walk: f32,
        sprint: f32,
        acceleration: f32,
    ) {
        if let Ok(mut movement) = world.get::<&mut MovementSpeedModifier>(body) {
            *movement = MovementSpeedModifier::new(walk, sprint, acceleration);
        }
    }
}

/// Stance sink that does nothing; the stance itself lives on [`crate::components::Body`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStance;

impl StanceService for NoopStance {
    fn stand(&mut self, _world: &mut World, _body: Entity) {}
    fn down(&mut self, _world: &mut World, _body: Entity) {}
}

/// Stores placement in a [`Transform`] component
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentTransform;

impl TransformService for ComponentTransform {
    fn attach_to_free_space(&mut self, world: &mut World, entity: Entity) {
        if let Ok(mut transform) = world.get::<&mut Transform>(entity) {
            transform.parent = None;
            return;
        }
        let _ = world.insert_one(entity, Transform::default());
    }

    fn set_coordinates(&mut self, world: &mut World, entity: Entity, coords: Vec3) {
        if let Ok(mut transform) = world.get::<&mut Transform>(entity) {
            transform.position = coords;
            return;
        }
        let _ = world.insert_one(entity, Transform::at(coords));
    }

    fn coordinates(&self, world: &World, entity: Entity) -> Option<Vec3> {
        world.get::<&Transform>(entity).ok().map(|t| t.position)
    }
}

/// Everything the body system calls out to
pub struct Collaborators {
    pub containers: Box<dyn ContainerService>,
    pub movement: Box<dyn MovementService>,
    pub stance: Box<dyn StanceService>,
    pub transform: Box<dyn TransformService>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            containers: Box::new(ContainerManager::new()),
            movement: Box::new(ComponentMovement),
            stance: Box::new(NoopStance),
            transform: Box::new(ComponentTransform),
        }
    }
}

impl Collaborators {
    pub fn with_containers(mut self, containers: impl ContainerService + 'static) -> Self {
        self.containers = Box::new(containers);
        self
    }

    pub fn with_movement(mut self, movement: impl MovementService + 'static) -> Self {
        self.movement = Box::new(movement);
        self
    }

    pub fn with_stance(mut self, stance: impl StanceService + 'static) -> Self {
        self.stance = Box::new(stance);
        self
    }

    pub fn with_transform(mut self, transform: impl TransformService + 'static) -> Self {
        self.transform = Box::new(transform);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_capacity() {
        let mut world = World::new();
        let owner = world.spawn(());
        let a = world.spawn(());
        let b = world.spawn(());

        let mut containers = ContainerManager::new();
        assert!(!containers.can_insert(owner, "body_part", a));

        containers.set_capacity(owner, "body_part", Some(1));
        assert!(containers.insert(owner, "body_part", a));
        // Re-inserting a contained item is fine, a second item is not
        assert!(containers.can_insert(owner, "body_part", a));
        assert!(!containers.can_insert(owner, "body_part", b));

        assert!(containers.remove(owner, "body_part", a));
        assert!(containers.insert(owner, "body_part", b));
        assert!(containers.contains(owner, "body_part", b));
    }

    #[test]
    fn test_container_refuses_itself() {
        let mut world = World::new();
        let owner = world.spawn(());
        let mut containers = ContainerManager::new();
        containers.ensure_container(owner, "body_part");
        assert!(!containers.can_insert(owner, "body_part", owner));
    }

    #[test]
    fn test_component_movement_requires_modifier() {
        let mut world = World::new();
        let with = world.spawn((MovementSpeedModifier::default(),));
        let without = world.spawn(());

        let mut movement = ComponentMovement;
        movement.change_base_speed(&mut world, with, 1.0, 2.0, 3.0);
        movement.change_base_speed(&mut world, without, 1.0, 2.0, 3.0);

        assert_eq!(
            *world.get::<&MovementSpeedModifier>(with).unwrap(),
            MovementSpeedModifier::new(1.0, 2.0, 3.0)
        );
        assert!(world.get::<&MovementSpeedModifier>(without).is_err());
    }

    #[test]
    fn test_component_transform() {
        let mut world = World::new();
        let carrier = world.spawn(());
        let e = world.spawn((Transform {
            position: Vec3::new(1.0, 0.0, 0.0),
            parent: Some(carrier),
        },));

        let mut transform = ComponentTransform;
        transform.attach_to_free_space(&mut world, e);
        assert!(world.get::<&Transform>(e).unwrap().is_free());

        transform.set_coordinates(&mut world, e, Vec3::new(5.0, 5.0, 0.0));
        assert_eq!(
            transform.coordinates(&world, e),
            Some(Vec3::new(5.0, 5.0, 0.0))
        );
    }
}
