//! EntityWorld: named, ordered set of entities driven through one lifecycle.
//!
//! The world keeps two flags, `spawned` and `enabled`, and brings every
//! entity it holds to the matching state. Entities added later adopt the
//! current state; removed entities are wound down to `Created`.

use crate::config::WorldConfig;
use crate::entity::{Entity, EntityId};
use crate::entity_collection::{EntityCollection, Iter};
use crate::error::CollectionError;
use crate::filter::{EntityFilter, FilterLink, Trigger};
use crate::observers::Observers;
use tracing::{debug, trace};

pub struct EntityWorld {
    name: String,
    entities: EntityCollection<Entity>,
    filters: Vec<FilterLink>,
    spawned: bool,
    enabled: bool,
}

impl EntityWorld {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: EntityCollection::new(),
            filters: Vec::new(),
            spawned: false,
            enabled: false,
        }
    }

    pub fn from_config(config: &WorldConfig) -> Result<Self, CollectionError> {
        let entities = EntityCollection::try_with_capacity(config.initial_capacity)?
            .with_match_mode(config.match_mode);
        debug!(
            world = %config.name,
            capacity = entities.capacity(),
            match_mode = ?config.match_mode,
            "world created"
        );
        Ok(Self {
            name: config.name.clone(),
            entities,
            filters: Vec::new(),
            spawned: false,
            enabled: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Linear scan in insertion order.
    pub fn find(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn iter(&self) -> Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn entities(&self) -> &EntityCollection<Entity> {
        &self.entities
    }

    /// Adds `entity` and brings it to the world's state. Returns `false`
    /// if it is already present.
    pub fn add(&mut self, entity: Entity) -> bool {
        if !self.entities.add(entity.clone()) {
            return false;
        }
        trace!(world = %self.name, entity = %entity.id(), "entity added");
        if self.enabled {
            entity.enable();
        } else if self.spawned {
            entity.init();
        }
        true
    }

    /// Removes `entity` and disposes it. Returns `false` if it was not present.
    pub fn remove(&mut self, entity: &Entity) -> bool {
        match self.entities.take(entity) {
            Some(removed) => {
                trace!(world = %self.name, entity = %removed.id(), "entity removed");
                removed.dispose();
                true
            }
            None => false,
        }
    }

    /// Disposes and removes every entity.
    pub fn clear(&mut self) {
        if self.entities.is_empty() {
            return;
        }
        for entity in self.entities.iter() {
            entity.dispose();
        }
        debug!(world = %self.name, count = self.entities.len(), "world cleared");
        self.entities.clear();
    }

    pub fn spawn(&mut self) {
        if self.spawned {
            return;
        }
        self.spawned = true;
        debug!(world = %self.name, entities = self.entities.len(), "world spawned");
        for entity in self.entities.iter() {
            entity.init();
        }
    }

    /// Spawns first if needed.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.spawn();
        self.enabled = true;
        debug!(world = %self.name, "world enabled");
        for entity in self.entities.iter() {
            entity.enable();
        }
    }

    pub fn update(&self, dt: f32) {
        if !self.enabled {
            return;
        }
        for entity in self.entities.iter() {
            entity.update(dt);
        }
    }

    pub fn fixed_update(&self, dt: f32) {
        if !self.enabled {
            return;
        }
        for entity in self.entities.iter() {
            entity.fixed_update(dt);
        }
    }

    pub fn late_update(&self, dt: f32) {
        if !self.enabled {
            return;
        }
        for entity in self.entities.iter() {
            entity.late_update(dt);
        }
    }

    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        debug!(world = %self.name, "world disabled");
        for entity in self.entities.iter() {
            entity.disable();
        }
    }

    /// Disables first if needed, then disposes every entity. Entities stay
    /// in the world and are initialized again on the next `spawn`.
    pub fn despawn(&mut self) {
        if !self.spawned {
            return;
        }
        self.disable();
        self.spawned = false;
        debug!(world = %self.name, "world despawned");
        for entity in self.entities.iter() {
            entity.dispose();
        }
    }

    pub fn on_added(&mut self) -> &mut Observers<Entity> {
        self.entities.on_added()
    }

    pub fn on_removed(&mut self) -> &mut Observers<Entity> {
        self.entities.on_removed()
    }

    pub fn on_state_changed(&mut self) -> &mut Observers<()> {
        self.entities.on_state_changed()
    }

    /// Builds a filter over this world's entities.
    ///
    /// Dropping the filter silences it at once. Its two callbacks on the
    /// world's `on_added`/`on_removed` lists are removed on the next call
    /// to `filter` or [`prune_filters`](Self::prune_filters), so building
    /// short-lived filters does not grow those lists.
    pub fn filter<P>(&mut self, predicate: P, triggers: Vec<Box<dyn Trigger>>) -> EntityFilter
    where
        P: Fn(&Entity) -> bool + 'static,
    {
        self.prune_filters();
        let filter = EntityFilter::attach(&mut self.entities, predicate, triggers);
        self.filters.extend(filter.link());
        filter
    }

    /// Detaches a filter built by [`filter`](Self::filter) on this world.
    pub fn detach_filter(&mut self, filter: &mut EntityFilter) {
        self.filters.retain(|link| !link.is_for(filter));
        filter.detach(&mut self.entities);
    }

    /// Unhooks every filter built here that has since been dropped.
    /// Returns how many were removed.
    pub fn prune_filters(&mut self) -> usize {
        let before = self.filters.len();
        let (dead, live): (Vec<FilterLink>, Vec<FilterLink>) =
            self.filters.drain(..).partition(FilterLink::is_dead);
        self.filters = live;
        for link in dead {
            link.unhook(&mut self.entities);
        }
        let pruned = before - self.filters.len();
        if pruned > 0 {
            trace!(world = %self.name, pruned, "dropped filters unhooked");
        }
        pruned
    }

    /// Filters built here that are still alive or not yet pruned.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }
}

impl core::fmt::Debug for EntityWorld {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityWorld")
            .field("name", &self.name)
            .field("len", &self.entities.len())
            .field("filters", &self.filters.len())
            .field("spawned", &self.spawned)
            .field("enabled", &self.enabled)
            .finish()
    }
}
