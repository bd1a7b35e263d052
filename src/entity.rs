//! Entity: shared handle bundling tags, typed values and behaviours.
//!
//! An `Entity` is an `Rc` handle with identity semantics: clones compare
//! equal and hash alike, two separately created entities never do, even
//! with identical contents. That is what lets entities live in
//! [`EntityCollection`](crate::EntityCollection)s owned by a world, a
//! filter and a pool at the same time.
//!
//! Single-threaded: entities are `!Send`/`!Sync`.

use crate::behaviour::Behaviour;
use crate::observers::{Observers, SubscriptionKey};
use crate::reentrancy::DispatchGuard;
use core::any::{Any, TypeId};
use core::cell::{Cell, RefCell};
use core::fmt;
use core::hash::{Hash, Hasher};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type TagKey = i32;
pub type ValueKey = i32;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique entity identifier, allocated in creation order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        EntityId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle position. Transitions only move one step at a time:
/// `Created -> Initialized -> Enabled` and back.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityState {
    Created,
    Initialized,
    Enabled,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityEventKind {
    TagAdded(TagKey),
    TagDeleted(TagKey),
    ValueAdded(ValueKey),
    ValueDeleted(ValueKey),
    ValueChanged(ValueKey),
    BehaviourAdded(TypeId),
    BehaviourDeleted(TypeId),
    StateChanged(EntityState),
}

/// Change notification delivered to entity subscribers.
#[derive(Clone, Debug)]
pub struct EntityEvent {
    pub entity: Entity,
    pub kind: EntityEventKind,
}

struct Attached {
    type_id: TypeId,
    behaviour: Box<dyn Behaviour>,
}

struct EntityInner {
    id: EntityId,
    name: RefCell<String>,
    state: Cell<EntityState>,
    tags: RefCell<HashSet<TagKey>>,
    values: RefCell<HashMap<ValueKey, Box<dyn Any>>>,
    behaviours: RefCell<Vec<Attached>>,
    events: RefCell<Observers<EntityEvent>>,
    // Events raised by hooks wait here until the behaviour list is released.
    deferring: Cell<bool>,
    pending: RefCell<Vec<EntityEventKind>>,
    dispatch: DispatchGuard,
}

struct DeferEvents<'a>(&'a Cell<bool>);

impl<'a> DeferEvents<'a> {
    fn new(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DeferEvents<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(EntityInner {
                id: EntityId::next(),
                name: RefCell::new(name.into()),
                state: Cell::new(EntityState::Created),
                tags: RefCell::new(HashSet::new()),
                values: RefCell::new(HashMap::new()),
                behaviours: RefCell::new(Vec::new()),
                events: RefCell::new(Observers::new()),
                deferring: Cell::new(false),
                pending: RefCell::new(Vec::new()),
                dispatch: DispatchGuard::new(),
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.inner.name.borrow_mut() = name.into();
    }

    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- events ----

    /// Registers `callback` for every change on this entity.
    ///
    /// Callbacks run synchronously after the change is applied. They must
    /// not subscribe/unsubscribe on, or mutate, the entity that is
    /// emitting. A callback that captures a clone of this same entity
    /// keeps it alive until unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionKey
    where
        F: FnMut(&EntityEvent) + 'static,
    {
        self.inner.events.borrow_mut().subscribe(callback)
    }

    pub fn unsubscribe(&self, key: SubscriptionKey) -> bool {
        self.inner.events.borrow_mut().unsubscribe(key)
    }

    pub fn unsubscribe_all(&self) {
        self.inner.events.borrow_mut().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.events.borrow().len()
    }

    fn emit(&self, kind: EntityEventKind) {
        if self.inner.deferring.get() {
            self.inner.pending.borrow_mut().push(kind);
            return;
        }
        let event = EntityEvent {
            entity: self.clone(),
            kind,
        };
        self.inner.events.borrow_mut().emit(&event);
    }

    // ---- tags ----

    pub fn has_tag(&self, key: TagKey) -> bool {
        self.inner.tags.borrow().contains(&key)
    }

    pub fn add_tag(&self, key: TagKey) -> bool {
        let added = self.inner.tags.borrow_mut().insert(key);
        if added {
            self.emit(EntityEventKind::TagAdded(key));
        }
        added
    }

    pub fn del_tag(&self, key: TagKey) -> bool {
        let removed = self.inner.tags.borrow_mut().remove(&key);
        if removed {
            self.emit(EntityEventKind::TagDeleted(key));
        }
        removed
    }

    pub fn tag_count(&self) -> usize {
        self.inner.tags.borrow().len()
    }

    /// Tags in ascending key order.
    pub fn tags(&self) -> Vec<TagKey> {
        let mut tags: Vec<TagKey> = self.inner.tags.borrow().iter().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Deletes every tag, reporting each in ascending key order.
    pub fn clear_tags(&self) {
        let mut removed: Vec<TagKey> = self.inner.tags.borrow_mut().drain().collect();
        removed.sort_unstable();
        for key in removed {
            self.emit(EntityEventKind::TagDeleted(key));
        }
    }

    // ---- values ----

    pub fn has_value(&self, key: ValueKey) -> bool {
        self.inner.values.borrow().contains_key(&key)
    }

    /// Inserts a value only if `key` is free.
    pub fn add_value<T: 'static>(&self, key: ValueKey, value: T) -> bool {
        {
            let mut values = self.inner.values.borrow_mut();
            if values.contains_key(&key) {
                return false;
            }
            values.insert(key, Box::new(value));
        }
        self.emit(EntityEventKind::ValueAdded(key));
        true
    }

    /// Inserts or replaces the value under `key`, whatever its previous type.
    pub fn set_value<T: 'static>(&self, key: ValueKey, value: T) {
        let replaced = self
            .inner
            .values
            .borrow_mut()
            .insert(key, Box::new(value))
            .is_some();
        if replaced {
            self.emit(EntityEventKind::ValueChanged(key));
        } else {
            self.emit(EntityEventKind::ValueAdded(key));
        }
    }

    /// Clones the value under `key`. `None` when absent or of another type.
    pub fn value<T: Clone + 'static>(&self, key: ValueKey) -> Option<T> {
        self.inner
            .values
            .borrow()
            .get(&key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Runs `f` on the value under `key` without cloning it.
    pub fn with_value<T: 'static, R>(&self, key: ValueKey, f: impl FnOnce(&T) -> R) -> Option<R> {
        let values = self.inner.values.borrow();
        values.get(&key).and_then(|v| v.downcast_ref::<T>()).map(f)
    }

    pub fn del_value(&self, key: ValueKey) -> bool {
        let removed = self.inner.values.borrow_mut().remove(&key).is_some();
        if removed {
            self.emit(EntityEventKind::ValueDeleted(key));
        }
        removed
    }

    pub fn value_count(&self) -> usize {
        self.inner.values.borrow().len()
    }

    pub fn clear_values(&self) {
        let mut removed: Vec<ValueKey> = self
            .inner
            .values
            .borrow_mut()
            .drain()
            .map(|(k, _)| k)
            .collect();
        removed.sort_unstable();
        for key in removed {
            self.emit(EntityEventKind::ValueDeleted(key));
        }
    }

    // ---- behaviours ----

    /// Attaches `behaviour`, bringing it up to the entity's current state
    /// (`init` if initialized, `init` + `enable` if enabled).
    pub fn add_behaviour<B: Behaviour>(&self, mut behaviour: B) {
        let state = self.state();
        {
            let _scope = self.inner.dispatch.enter("add_behaviour");
            if state >= EntityState::Initialized {
                behaviour.init(self);
            }
            if state == EntityState::Enabled {
                behaviour.enable(self);
            }
        }
        self.inner.behaviours.borrow_mut().push(Attached {
            type_id: TypeId::of::<B>(),
            behaviour: Box::new(behaviour),
        });
        self.emit(EntityEventKind::BehaviourAdded(TypeId::of::<B>()));
    }

    pub fn has_behaviour<B: Behaviour>(&self) -> bool {
        let id = TypeId::of::<B>();
        self.inner.behaviours.borrow().iter().any(|a| a.type_id == id)
    }

    /// Detaches the first behaviour of type `B`, winding it down from the
    /// entity's current state (`disable` if enabled, `dispose` if initialized).
    pub fn del_behaviour<B: Behaviour>(&self) -> bool {
        let id = TypeId::of::<B>();
        let detached = {
            let mut behaviours = self.inner.behaviours.borrow_mut();
            match behaviours.iter().position(|a| a.type_id == id) {
                Some(pos) => behaviours.remove(pos),
                None => return false,
            }
        };
        let mut behaviour = detached.behaviour;
        let state = self.state();
        {
            let _scope = self.inner.dispatch.enter("del_behaviour");
            if state == EntityState::Enabled {
                behaviour.disable(self);
            }
            if state >= EntityState::Initialized {
                behaviour.dispose(self);
            }
        }
        drop(behaviour);
        self.emit(EntityEventKind::BehaviourDeleted(id));
        true
    }

    pub fn behaviour_count(&self) -> usize {
        self.inner.behaviours.borrow().len()
    }

    // ---- lifecycle ----

    pub fn state(&self) -> EntityState {
        self.inner.state.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.state() >= EntityState::Initialized
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == EntityState::Enabled
    }

    /// `true` while one of this entity's lifecycle hooks is running.
    /// Always `false` in release builds.
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatch.is_dispatching()
    }

    /// Runs `f` on every behaviour in order. Events raised by the hooks
    /// are delivered, in order, once the behaviour list is released.
    fn dispatch(&self, hook: &'static str, mut f: impl FnMut(&mut Box<dyn Behaviour>, &Entity)) {
        {
            let _scope = self.inner.dispatch.enter(hook);
            let _defer = DeferEvents::new(&self.inner.deferring);
            let mut behaviours = self.inner.behaviours.borrow_mut();
            for attached in behaviours.iter_mut() {
                f(&mut attached.behaviour, self);
            }
        }
        let queued = core::mem::take(&mut *self.inner.pending.borrow_mut());
        for kind in queued {
            self.emit(kind);
        }
    }

    fn transition(&self, to: EntityState) {
        self.inner.state.set(to);
        self.emit(EntityEventKind::StateChanged(to));
    }

    pub fn init(&self) {
        if self.state() != EntityState::Created {
            return;
        }
        self.dispatch("init", |b, e| b.init(e));
        self.transition(EntityState::Initialized);
    }

    /// Initializes first when still `Created`.
    pub fn enable(&self) {
        match self.state() {
            EntityState::Enabled => return,
            EntityState::Created => self.init(),
            EntityState::Initialized => {}
        }
        self.dispatch("enable", |b, e| b.enable(e));
        self.transition(EntityState::Enabled);
    }

    pub fn update(&self, dt: f32) {
        if self.is_enabled() {
            self.dispatch("update", |b, e| b.update(e, dt));
        }
    }

    pub fn fixed_update(&self, dt: f32) {
        if self.is_enabled() {
            self.dispatch("fixed_update", |b, e| b.fixed_update(e, dt));
        }
    }

    pub fn late_update(&self, dt: f32) {
        if self.is_enabled() {
            self.dispatch("late_update", |b, e| b.late_update(e, dt));
        }
    }

    pub fn disable(&self) {
        if self.state() != EntityState::Enabled {
            return;
        }
        self.dispatch("disable", |b, e| b.disable(e));
        self.transition(EntityState::Initialized);
    }

    /// Disables first when enabled, then returns to `Created`. Tags,
    /// values and behaviours are kept so the entity can be pooled.
    pub fn dispose(&self) {
        self.disable();
        if self.state() != EntityState::Initialized {
            return;
        }
        self.dispatch("dispose", |b, e| b.dispose(e));
        self.transition(EntityState::Created);
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.inner.id)
            .field("name", &*self.inner.name.borrow())
            .field("state", &self.inner.state.get())
            .finish()
    }
}
