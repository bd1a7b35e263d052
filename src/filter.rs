//! EntityFilter: live subset of a source collection selected by a predicate.
//!
//! The filter listens to its source's `on_added` / `on_removed` and to the
//! events of every entity currently in the source ("tracked" entities).
//! When a tracked entity emits an event matched by one of the filter's
//! [`Trigger`]s, the predicate is evaluated again and the entity is added
//! to or removed from the derived collection.
//!
//! Callbacks registered on the source and on entities hold only a `Weak`
//! reference to the filter state; once the filter is dropped they do
//! nothing. [`EntityFilter::detach`] removes them outright.

use crate::entity::{Entity, EntityEvent, EntityEventKind, EntityId, TagKey, ValueKey};
use crate::entity_collection::EntityCollection;
use crate::observers::SubscriptionKey;
use core::any::TypeId;
use core::cell::RefCell;
use core::hash::BuildHasher;
use hashbrown::HashMap;
use std::rc::{Rc, Weak};

/// Decides which entity events cause the predicate to be re-evaluated.
pub trait Trigger {
    fn matches(&self, kind: &EntityEventKind) -> bool;
}

/// Fires on tag additions and deletions, optionally for one key only.
#[derive(Copy, Clone, Debug, Default)]
pub struct TagTrigger {
    key: Option<TagKey>,
}

impl TagTrigger {
    pub fn any() -> Self {
        Self { key: None }
    }

    pub fn key(key: TagKey) -> Self {
        Self { key: Some(key) }
    }
}

impl Trigger for TagTrigger {
    fn matches(&self, kind: &EntityEventKind) -> bool {
        match kind {
            EntityEventKind::TagAdded(k) | EntityEventKind::TagDeleted(k) => {
                self.key.map_or(true, |want| want == *k)
            }
            _ => false,
        }
    }
}

/// Fires on value additions, deletions and changes, optionally for one key only.
#[derive(Copy, Clone, Debug, Default)]
pub struct ValueTrigger {
    key: Option<ValueKey>,
}

impl ValueTrigger {
    pub fn any() -> Self {
        Self { key: None }
    }

    pub fn key(key: ValueKey) -> Self {
        Self { key: Some(key) }
    }
}

impl Trigger for ValueTrigger {
    fn matches(&self, kind: &EntityEventKind) -> bool {
        match kind {
            EntityEventKind::ValueAdded(k)
            | EntityEventKind::ValueDeleted(k)
            | EntityEventKind::ValueChanged(k) => self.key.map_or(true, |want| want == *k),
            _ => false,
        }
    }
}

/// Fires when behaviours are attached or detached, optionally of one type only.
#[derive(Copy, Clone, Debug, Default)]
pub struct BehaviourTrigger {
    type_id: Option<TypeId>,
}

impl BehaviourTrigger {
    pub fn any() -> Self {
        Self { type_id: None }
    }

    pub fn of<B: 'static>() -> Self {
        Self {
            type_id: Some(TypeId::of::<B>()),
        }
    }
}

impl Trigger for BehaviourTrigger {
    fn matches(&self, kind: &EntityEventKind) -> bool {
        match kind {
            EntityEventKind::BehaviourAdded(t) | EntityEventKind::BehaviourDeleted(t) => {
                self.type_id.map_or(true, |want| want == *t)
            }
            _ => false,
        }
    }
}

/// Fires on lifecycle transitions.
#[derive(Copy, Clone, Debug, Default)]
pub struct StateTrigger;

impl Trigger for StateTrigger {
    fn matches(&self, kind: &EntityEventKind) -> bool {
        matches!(kind, EntityEventKind::StateChanged(_))
    }
}

type Predicate = Box<dyn Fn(&Entity) -> bool>;

struct FilterState {
    predicate: Predicate,
    triggers: Vec<Box<dyn Trigger>>,
    items: EntityCollection<Entity>,
    tracked: HashMap<EntityId, (Entity, SubscriptionKey)>,
}

impl FilterState {
    fn resync(&mut self, entity: &Entity) {
        if (self.predicate)(entity) {
            self.items.add(entity.clone());
        } else {
            self.items.remove(entity);
        }
    }

    fn track(state: &Rc<RefCell<FilterState>>, entity: &Entity) {
        if state.borrow().tracked.contains_key(&entity.id()) {
            return;
        }
        let weak = Rc::downgrade(state);
        let key = entity.subscribe(move |event: &EntityEvent| {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().on_event(event);
            }
        });
        let mut st = state.borrow_mut();
        st.tracked.insert(entity.id(), (entity.clone(), key));
        st.resync(entity);
    }

    fn untrack(state: &Rc<RefCell<FilterState>>, entity: &Entity) {
        let mut st = state.borrow_mut();
        if let Some((tracked, key)) = st.tracked.remove(&entity.id()) {
            tracked.unsubscribe(key);
        }
        st.items.remove(entity);
    }

    fn on_event(&mut self, event: &EntityEvent) {
        if self.triggers.iter().any(|t| t.matches(&event.kind)) {
            self.resync(&event.entity);
        }
    }

    fn release_entities(&mut self) {
        for (_, (entity, key)) in self.tracked.drain() {
            entity.unsubscribe(key);
        }
    }
}

/// Derived, insertion-ordered view of the source entities that satisfy a predicate.
///
/// Observers registered through [`subscribe_added`](Self::subscribe_added) /
/// [`subscribe_removed`](Self::subscribe_removed) run while the filter is
/// borrowed and must not call back into it.
pub struct EntityFilter {
    state: Rc<RefCell<FilterState>>,
    source_keys: Option<(SubscriptionKey, SubscriptionKey)>,
}

impl EntityFilter {
    /// Builds a filter over `source` and keeps it in sync with later
    /// additions, removals and triggered entity changes.
    pub fn attach<S, P>(
        source: &mut EntityCollection<Entity, S>,
        predicate: P,
        triggers: Vec<Box<dyn Trigger>>,
    ) -> Self
    where
        S: BuildHasher,
        P: Fn(&Entity) -> bool + 'static,
    {
        let state = Rc::new(RefCell::new(FilterState {
            predicate: Box::new(predicate),
            triggers,
            items: EntityCollection::new(),
            tracked: HashMap::new(),
        }));
        for entity in source.iter() {
            FilterState::track(&state, entity);
        }

        let weak: Weak<RefCell<FilterState>> = Rc::downgrade(&state);
        let added = source.on_added().subscribe(move |entity: &Entity| {
            if let Some(state) = weak.upgrade() {
                FilterState::track(&state, entity);
            }
        });
        let weak: Weak<RefCell<FilterState>> = Rc::downgrade(&state);
        let removed = source.on_removed().subscribe(move |entity: &Entity| {
            if let Some(state) = weak.upgrade() {
                FilterState::untrack(&state, entity);
            }
        });

        Self {
            state,
            source_keys: Some((added, removed)),
        }
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        self.state.borrow().items.contains(entity)
    }

    /// Source entities currently being watched, matching or not.
    pub fn tracked_count(&self) -> usize {
        self.state.borrow().tracked.len()
    }

    /// Snapshot of the matching entities in the order they started matching.
    pub fn to_vec(&self) -> Vec<Entity> {
        self.state.borrow().items.iter().cloned().collect()
    }

    /// Borrows the derived collection. `f` must not change any tracked
    /// entity; use [`to_vec`](Self::to_vec) for that.
    pub fn with_entities<R>(&self, f: impl FnOnce(&EntityCollection<Entity>) -> R) -> R {
        f(&self.state.borrow().items)
    }

    pub fn subscribe_added<F>(&self, callback: F) -> SubscriptionKey
    where
        F: FnMut(&Entity) + 'static,
    {
        self.state.borrow_mut().items.on_added().subscribe(callback)
    }

    pub fn subscribe_removed<F>(&self, callback: F) -> SubscriptionKey
    where
        F: FnMut(&Entity) + 'static,
    {
        self.state.borrow_mut().items.on_removed().subscribe(callback)
    }

    pub fn unsubscribe_added(&self, key: SubscriptionKey) -> bool {
        self.state.borrow_mut().items.on_added().unsubscribe(key)
    }

    pub fn unsubscribe_removed(&self, key: SubscriptionKey) -> bool {
        self.state.borrow_mut().items.on_removed().unsubscribe(key)
    }

    pub fn is_attached(&self) -> bool {
        self.source_keys.is_some()
    }

    /// Handle the source owner keeps to unhook this filter after it is dropped.
    pub(crate) fn link(&self) -> Option<FilterLink> {
        let (added, removed) = self.source_keys?;
        Some(FilterLink {
            state: Rc::downgrade(&self.state),
            added,
            removed,
        })
    }

    /// Stops following `source` and its entities, then empties the filter.
    ///
    /// `source` must be the collection the filter was attached to.
    pub fn detach<S>(&mut self, source: &mut EntityCollection<Entity, S>) {
        if let Some((added, removed)) = self.source_keys.take() {
            source.on_added().unsubscribe(added);
            source.on_removed().unsubscribe(removed);
        }
        let mut st = self.state.borrow_mut();
        st.release_entities();
        st.items.clear();
    }
}

/// Source-side record of an attached filter.
pub(crate) struct FilterLink {
    state: Weak<RefCell<FilterState>>,
    added: SubscriptionKey,
    removed: SubscriptionKey,
}

impl FilterLink {
    /// `true` once the filter itself has been dropped.
    pub(crate) fn is_dead(&self) -> bool {
        self.state.strong_count() == 0
    }

    pub(crate) fn is_for(&self, filter: &EntityFilter) -> bool {
        core::ptr::eq(self.state.as_ptr(), Rc::as_ptr(&filter.state))
    }

    /// Removes the filter's callbacks from `source`. Keys already removed
    /// by `detach` are stale and ignored.
    pub(crate) fn unhook<S>(self, source: &mut EntityCollection<Entity, S>) {
        source.on_added().unsubscribe(self.added);
        source.on_removed().unsubscribe(self.removed);
    }
}

impl Drop for EntityFilter {
    fn drop(&mut self) {
        if let Ok(mut st) = self.state.try_borrow_mut() {
            st.release_entities();
        }
    }
}

impl core::fmt::Debug for EntityFilter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let st = self.state.borrow();
        f.debug_struct("EntityFilter")
            .field("items", &st.items)
            .field("tracked", &st.tracked.len())
            .field("attached", &self.source_keys.is_some())
            .finish()
    }
}
