//! EntityPool: recycles entities built by a factory.
//!
//! Idle entities sit disabled (but initialized) in insertion order; `rent`
//! hands out the oldest one and enables it. Released entities keep their
//! tags, values and behaviours, so callers reset whatever they need in a
//! behaviour's `enable`/`disable` hooks.

use crate::entity::Entity;
use crate::entity_collection::EntityCollection;
use tracing::{debug, trace};

pub struct EntityPool {
    factory: Box<dyn FnMut() -> Entity>,
    idle: EntityCollection<Entity>,
    rented: EntityCollection<Entity>,
    created: usize,
}

impl EntityPool {
    pub fn new<F>(factory: F) -> Self
    where
        F: FnMut() -> Entity + 'static,
    {
        Self::with_capacity(0, factory)
    }

    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_CAPACITY`](crate::MAX_CAPACITY).
    pub fn with_capacity<F>(capacity: usize, factory: F) -> Self
    where
        F: FnMut() -> Entity + 'static,
    {
        Self {
            factory: Box::new(factory),
            idle: EntityCollection::with_capacity(capacity),
            rented: EntityCollection::with_capacity(capacity),
            created: 0,
        }
    }

    fn create(&mut self) -> Entity {
        let entity = (self.factory)();
        self.created += 1;
        trace!(entity = %entity.id(), created = self.created, "pool created entity");
        entity
    }

    /// Ensures at least `count` idle entities, each initialized.
    pub fn prewarm(&mut self, count: usize) {
        let before = self.idle.len();
        while self.idle.len() < count {
            let entity = self.create();
            entity.init();
            self.idle.add(entity);
        }
        if self.idle.len() > before {
            debug!(added = self.idle.len() - before, idle = self.idle.len(), "pool prewarmed");
        }
    }

    /// Takes the oldest idle entity (or builds one) and enables it.
    pub fn rent(&mut self) -> Entity {
        let entity = match self.idle.first().cloned() {
            Some(entity) => {
                self.idle.remove(&entity);
                entity
            }
            None => self.create(),
        };
        entity.enable();
        self.rented.add(entity.clone());
        trace!(entity = %entity.id(), rented = self.rented.len(), "entity rented");
        entity
    }

    /// Disables `entity` and parks it. `false` if it was not rented from this pool.
    pub fn release(&mut self, entity: &Entity) -> bool {
        let Some(entity) = self.rented.take(entity) else {
            return false;
        };
        entity.disable();
        trace!(entity = %entity.id(), idle = self.idle.len() + 1, "entity released");
        self.idle.add(entity);
        true
    }

    pub fn is_rented(&self, entity: &Entity) -> bool {
        self.rented.contains(entity)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn rented_count(&self) -> usize {
        self.rented.len()
    }

    /// Entities built by the factory over the pool's lifetime.
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Disposes idle entities and forgets rented ones; rented entities are
    /// left as they are and can no longer be released here.
    pub fn clear(&mut self) {
        for entity in self.idle.iter() {
            entity.dispose();
        }
        debug!(
            disposed = self.idle.len(),
            forgotten = self.rented.len(),
            "pool cleared"
        );
        self.idle.clear();
        self.rented.clear();
    }
}

impl core::fmt::Debug for EntityPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityPool")
            .field("idle", &self.idle.len())
            .field("rented", &self.rented.len())
            .field("created", &self.created)
            .finish()
    }
}
