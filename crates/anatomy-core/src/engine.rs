//! Body system - owns the body graph and is the only sanctioned way to mutate it

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::collaborators::{Collaborators, ContainerService};
use crate::components::*;
use crate::config::BodyConfig;
use crate::error::ReplicationError;
use crate::replication::{self, ReplicationBridge, StatePayload};
use crate::systems::EventBus;

/// Main entry point.
///
/// Holds the ECS world (the arena every body, part and organ lives in), the
/// collaborator interfaces, the event bus and the replication dirty set.
/// Every graph mutation goes through `&mut self`, so there is exactly one
/// writer per tick and no traversal can outlive a mutation.
pub struct BodySystem {
    pub(crate) world: World,
    /// Structural event fan-out
    pub events: EventBus,
    pub(crate) replication: ReplicationBridge,
    pub(crate) collaborators: Collaborators,
    pub(crate) config: BodyConfig,
    pub(crate) rng: StdRng,
}

impl BodySystem {
    pub fn new() -> Self {
        Self::with_config(BodyConfig::default(), Collaborators::default())
    }

    pub fn with_config(config: BodyConfig, collaborators: Collaborators) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            world: World::new(),
            events: EventBus::new(),
            replication: ReplicationBridge::new(),
            collaborators,
            config,
            rng,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access for components outside the body graph (speed
    /// modifiers, appearance, ...). Slot, part and organ fields must only be
    /// changed through `BodySystem` operations.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn config(&self) -> &BodyConfig {
        &self.config
    }

    pub fn containers(&self) -> &dyn ContainerService {
        self.collaborators.containers.as_ref()
    }

    /// Spawn a creature with an empty body. `required_legs` falls back to the
    /// configured default.
    pub fn spawn_body(&mut self, required_legs: Option<u32>) -> Entity {
        let legs = required_legs.unwrap_or(self.config.default_required_legs);
        let body = self.world.spawn((
            Body::new(legs),
            MovementSpeedModifier::default(),
            Transform::default(),
        ));
        self.replication.mark_dirty(body);
        log::debug!("spawned body {:?} ({} legs required)", body, legs);
        body
    }

    /// Spawn a loose part. Graph fields of `part` are reset; build its slots
    /// afterwards with [`BodySystem::create_slot`].
    pub fn spawn_part(&mut self, mut part: BodyPart) -> Entity {
        part.children.clear();
        part.organs.clear();
        part.parent_slot = None;
        part.body = None;
        part.original_body = None;
        part.container = None;
        let entity = self.world.spawn((part, Transform::default()));
        self.replication.mark_dirty(entity);
        entity
    }

    pub fn spawn_organ(&mut self) -> Entity {
        self.world.spawn((Organ::default(), Transform::default()))
    }

    pub fn part(&self, part: Entity) -> Option<BodyPart> {
        self.world.get::<&BodyPart>(part).ok().map(|p| (*p).clone())
    }

    pub fn body(&self, body: Entity) -> Option<Body> {
        self.world.get::<&Body>(body).ok().map(|b| (*b).clone())
    }

    pub fn organ(&self, organ: Entity) -> Option<Organ> {
        self.world.get::<&Organ>(organ).ok().map(|o| (*o).clone())
    }

    pub fn stance(&self, body: Entity) -> Option<Stance> {
        crate::systems::stance(&self.world, body)
    }

    pub fn movement_speed(&self, entity: Entity) -> Option<MovementSpeedModifier> {
        self.world.get::<&MovementSpeedModifier>(entity).ok().map(|m| *m)
    }

    pub fn is_dirty(&self, entity: Entity) -> bool {
        self.replication.is_dirty(entity)
    }

    /// Drain everything changed since the last sync into one payload
    pub fn sync(&mut self) -> StatePayload {
        self.replication.collect(&self.world)
    }

    pub fn sync_encoded(&mut self) -> Result<Vec<u8>, ReplicationError> {
        let payload = self.sync();
        replication::encode(&payload)
    }
}

impl Default for BodySystem {
    fn default() -> Self {
        Self::new()
    }
}
