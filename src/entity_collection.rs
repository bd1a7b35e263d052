//! EntityCollection: insertion-ordered hash set over a flat slot arena.
//!
//! Every slot carries two independent intrusive links:
//! - `next` threads the slot into its bucket's collision chain while live,
//!   or into the free list once vacated;
//! - `left`/`right` thread live slots into one doubly-linked list in
//!   insertion order.
//!
//! Links are slot indices, so growing the arena never invalidates the
//! order list; only bucket chains are rebuilt, because `hash % capacity`
//! changes with the capacity.

use crate::error::CollectionError;
use crate::observers::Observers;
use crate::primes::{expand_prime, get_prime, MAX_CAPACITY};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::RandomState;

const NIL: usize = usize::MAX;

/// How a looked-up value is compared against slots in its collision chain.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Equal cached hashes are treated as equal values. Two distinct
    /// values whose hashes collide cannot both be stored.
    #[default]
    HashOnly,
    /// Equal cached hashes are confirmed with `==`.
    FullEquality,
}

struct Slot<E> {
    value: Option<E>,
    hash: u64,
    next: usize,
    left: usize,
    right: usize,
}

impl<E> Slot<E> {
    fn vacant() -> Self {
        Self {
            value: None,
            hash: 0,
            next: NIL,
            left: NIL,
            right: NIL,
        }
    }
}

/// Hash set with O(1) add/remove/contains that enumerates in insertion order.
///
/// Mutations notify three observer lists synchronously, after the
/// structure is consistent again: `on_added` / `on_removed` with the
/// affected value, then `on_state_changed` once per mutating call.
pub struct EntityCollection<E, S = RandomState> {
    hasher: S,
    mode: MatchMode,
    buckets: Vec<usize>,
    slots: Vec<Slot<E>>,
    capacity: usize,
    count: usize,
    free_list: usize,
    head: usize,
    tail: usize,
    on_added: Observers<E>,
    on_removed: Observers<E>,
    on_state_changed: Observers<()>,
}

impl<E> EntityCollection<E>
where
    E: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_CAPACITY`]; see
    /// [`try_with_capacity`](Self::try_with_capacity).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }

    pub fn try_with_capacity(capacity: usize) -> Result<Self, CollectionError> {
        Self::try_with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<E, S> EntityCollection<E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_CAPACITY`].
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        match Self::try_with_capacity_and_hasher(capacity, hasher) {
            Ok(collection) => collection,
            Err(err) => panic!("{err}"),
        }
    }

    /// Builds a collection whose first `capacity` adds never grow the
    /// table. A zero capacity allocates nothing until the first add.
    pub fn try_with_capacity_and_hasher(
        capacity: usize,
        hasher: S,
    ) -> Result<Self, CollectionError> {
        if capacity > MAX_CAPACITY {
            return Err(CollectionError::CapacityOverflow {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        let mut collection = Self {
            hasher,
            mode: MatchMode::default(),
            buckets: Vec::new(),
            slots: Vec::new(),
            capacity: 0,
            count: 0,
            free_list: NIL,
            head: NIL,
            tail: NIL,
            on_added: Observers::new(),
            on_removed: Observers::new(),
            on_state_changed: Observers::new(),
        };
        if capacity > 0 {
            collection.initialize(capacity);
        }
        Ok(collection)
    }

    /// Chooses how collision chains compare values.
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn match_mode(&self) -> MatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Current table size; always zero or a prime.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn initialize(&mut self, min: usize) {
        let capacity = get_prime(min);
        self.capacity = capacity;
        self.buckets = vec![NIL; capacity];
        self.slots = Vec::with_capacity(capacity);
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.capacity as u64) as usize
    }

    #[inline]
    fn matches<Q>(&self, slot: &Slot<E>, hash: u64, q: &Q) -> bool
    where
        E: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if slot.hash != hash {
            return false;
        }
        match self.mode {
            MatchMode::HashOnly => slot.value.is_some(),
            MatchMode::FullEquality => slot
                .value
                .as_ref()
                .is_some_and(|v| <E as Borrow<Q>>::borrow(v) == q),
        }
    }

    /// Returns `(predecessor, index)` of the matching slot in its chain.
    fn find<Q>(&self, q: &Q, hash: u64) -> Option<(usize, usize)>
    where
        E: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if self.count == 0 {
            return None;
        }
        let mut prev = NIL;
        let mut i = self.buckets[self.bucket_of(hash)];
        while i != NIL {
            let slot = &self.slots[i];
            if self.matches(slot, hash, q) {
                return Some((prev, i));
            }
            prev = i;
            i = slot.next;
        }
        None
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        E: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if self.count == 0 {
            return false;
        }
        self.find(q, self.make_hash(q)).is_some()
    }

    /// Appends `item` at the end of the enumeration order.
    ///
    /// Returns `false` without mutating or notifying when an equal item is
    /// already present.
    ///
    /// # Panics
    ///
    /// Panics if the table would have to grow past [`MAX_CAPACITY`].
    pub fn add(&mut self, item: E) -> bool {
        let hash = self.make_hash(&item);
        if self.find(&item, hash).is_some() {
            return false;
        }

        if self.capacity == 0 {
            self.initialize(0);
        }
        let index = if self.free_list != NIL {
            let index = self.free_list;
            self.free_list = self.slots[index].next;
            index
        } else {
            if self.slots.len() == self.capacity {
                self.grow();
            }
            self.slots.push(Slot::vacant());
            self.slots.len() - 1
        };

        let bucket = self.bucket_of(hash);
        let slot = &mut self.slots[index];
        slot.value = Some(item);
        slot.hash = hash;
        slot.next = self.buckets[bucket];
        slot.left = self.tail;
        slot.right = NIL;
        self.buckets[bucket] = index;
        if self.tail == NIL {
            self.head = index;
        } else {
            self.slots[self.tail].right = index;
        }
        self.tail = index;
        self.count += 1;

        if let Some(value) = self.slots[index].value.as_ref() {
            self.on_added.emit(value);
        }
        self.on_state_changed.emit(&());
        true
    }

    fn grow(&mut self) {
        let Some(capacity) = grown_capacity(self.capacity) else {
            panic!(
                "EntityCollection capacity overflow: cannot grow past {}",
                MAX_CAPACITY
            );
        };
        self.capacity = capacity;
        self.buckets.clear();
        self.buckets.resize(capacity, NIL);
        self.slots.reserve_exact(capacity - self.slots.len());

        // Order links stay valid; only chains depend on the modulus.
        for i in 0..self.slots.len() {
            if self.slots[i].value.is_none() {
                continue;
            }
            let bucket = (self.slots[i].hash % capacity as u64) as usize;
            self.slots[i].next = self.buckets[bucket];
            self.buckets[bucket] = i;
        }
    }

    fn unlink<Q>(&mut self, q: &Q) -> Option<E>
    where
        E: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if self.count == 0 {
            return None;
        }
        let hash = self.make_hash(q);
        let (prev, index) = self.find(q, hash)?;
        let (next, left, right) = {
            let slot = &self.slots[index];
            (slot.next, slot.left, slot.right)
        };

        if prev == NIL {
            let bucket = self.bucket_of(hash);
            self.buckets[bucket] = next;
        } else {
            self.slots[prev].next = next;
        }
        if left == NIL {
            self.head = right;
        } else {
            self.slots[left].right = right;
        }
        if right == NIL {
            self.tail = left;
        } else {
            self.slots[right].left = left;
        }

        let slot = &mut self.slots[index];
        let value = slot.value.take();
        slot.hash = 0;
        slot.left = NIL;
        slot.right = NIL;
        slot.next = self.free_list;
        self.free_list = index;
        self.count -= 1;

        if self.count == 0 {
            self.slots.clear();
            self.free_list = NIL;
            self.head = NIL;
            self.tail = NIL;
        }
        value
    }

    /// Removes the item equal to `q` and hands it back.
    pub fn take<Q>(&mut self, q: &Q) -> Option<E>
    where
        E: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let value = self.unlink(q)?;
        self.on_removed.emit(&value);
        self.on_state_changed.emit(&());
        Some(value)
    }

    /// Removes the item equal to `q`. Absent items are a no-op returning `false`.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        E: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.take(q).is_some()
    }

    /// Removes every item.
    ///
    /// Removed values are parked in a local buffer and reported through
    /// `on_removed` (in enumeration order) only after the table is empty,
    /// followed by a single `on_state_changed`. The buffer is dropped on
    /// every exit path.
    pub fn clear(&mut self) {
        if self.count == 0 {
            return;
        }
        self.buckets.fill(NIL);
        let mut removed = Vec::with_capacity(self.count);
        let mut cursor = self.head;
        while cursor != NIL {
            let slot = &mut self.slots[cursor];
            cursor = slot.right;
            if let Some(value) = slot.value.take() {
                removed.push(value);
            }
        }
        self.slots.clear();
        self.count = 0;
        self.free_list = NIL;
        self.head = NIL;
        self.tail = NIL;

        for value in &removed {
            self.on_removed.emit(value);
        }
        self.on_state_changed.emit(&());
    }

    /// Copies every item, in order, into `dst[index..]`.
    ///
    /// Nothing is written unless the whole collection fits.
    pub fn copy_to(&self, dst: &mut [E], index: usize) -> Result<(), CollectionError>
    where
        E: Clone,
    {
        if index > dst.len() {
            return Err(CollectionError::IndexOutOfRange {
                index,
                len: dst.len(),
            });
        }
        let available = dst.len() - index;
        if available < self.count {
            return Err(CollectionError::DestinationTooSmall {
                required: self.count,
                index,
                available,
            });
        }
        for (out, value) in dst[index..].iter_mut().zip(self.iter()) {
            *out = value.clone();
        }
        Ok(())
    }
}

impl<E, S> EntityCollection<E, S> {
    /// Oldest live item.
    pub fn first(&self) -> Option<&E> {
        self.slot_value(self.head)
    }

    /// Newest live item.
    pub fn last(&self) -> Option<&E> {
        self.slot_value(self.tail)
    }

    fn slot_value(&self, index: usize) -> Option<&E> {
        if index == NIL {
            return None;
        }
        self.slots[index].value.as_ref()
    }

    /// Iterates in insertion order.
    ///
    /// The shared borrow rules out structural mutation while iterating.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            slots: &self.slots,
            front: self.head,
            back: self.tail,
            remaining: self.count,
        }
    }

    pub fn on_added(&mut self) -> &mut Observers<E> {
        &mut self.on_added
    }

    pub fn on_removed(&mut self) -> &mut Observers<E> {
        &mut self.on_removed
    }

    pub fn on_state_changed(&mut self) -> &mut Observers<()> {
        &mut self.on_state_changed
    }

    /// Drops every subscriber of all three observer lists.
    pub fn unsubscribe_all(&mut self) {
        self.on_added.clear();
        self.on_removed.clear();
        self.on_state_changed.clear();
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let mut live = 0;
        for slot in &self.slots {
            if slot.value.is_some() {
                live += 1;
            }
        }
        assert_eq!(live, self.count, "count must equal occupied slots");

        let mut chained = 0;
        for (b, &head) in self.buckets.iter().enumerate() {
            let mut i = head;
            while i != NIL {
                let slot = &self.slots[i];
                assert!(slot.value.is_some(), "chain visits an empty slot");
                assert_eq!((slot.hash % self.capacity as u64) as usize, b);
                chained += 1;
                i = slot.next;
            }
        }
        assert_eq!(chained, self.count, "each live slot sits in exactly one chain");

        let mut ordered = 0;
        let mut prev = NIL;
        let mut i = self.head;
        while i != NIL {
            let slot = &self.slots[i];
            assert_eq!(slot.left, prev, "left link must mirror right link");
            prev = i;
            i = slot.right;
            ordered += 1;
        }
        assert_eq!(prev, self.tail);
        assert_eq!(ordered, self.count, "order list visits every live slot once");

        assert!(self.capacity == 0 || crate::primes::is_prime(self.capacity));
        assert!(self.slots.len() <= self.capacity);
    }
}

/// Next table size after `current`, or `None` once `MAX_CAPACITY` is reached.
fn grown_capacity(current: usize) -> Option<usize> {
    let next = expand_prime(current);
    (next > current && next <= MAX_CAPACITY).then_some(next)
}

impl<E, S> Default for EntityCollection<E, S>
where
    E: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<E, S> fmt::Debug for EntityCollection<E, S>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<E, S> Extend<E> for EntityCollection<E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}

impl<E, S> FromIterator<E> for EntityCollection<E, S>
where
    E: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut collection = Self::default();
        collection.extend(iter);
        collection
    }
}

/// Borrowing iterator in insertion order.
pub struct Iter<'a, E> {
    slots: &'a [Slot<E>],
    front: usize,
    back: usize,
    remaining: usize,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = &self.slots[self.front];
        self.front = slot.right;
        self.remaining -= 1;
        slot.value.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> DoubleEndedIterator for Iter<'_, E> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = &self.slots[self.back];
        self.back = slot.left;
        self.remaining -= 1;
        slot.value.as_ref()
    }
}

impl<E> ExactSizeIterator for Iter<'_, E> {}
impl<E> FusedIterator for Iter<'_, E> {}

impl<E> Clone for Iter<'_, E> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

/// Owning iterator in insertion order.
pub struct IntoIter<E> {
    slots: Vec<Slot<E>>,
    front: usize,
    back: usize,
    remaining: usize,
}

impl<E> Iterator for IntoIter<E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        if self.remaining == 0 {
            return None;
        }
        let slot = &mut self.slots[self.front];
        self.front = slot.right;
        self.remaining -= 1;
        slot.value.take()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> DoubleEndedIterator for IntoIter<E> {
    fn next_back(&mut self) -> Option<E> {
        if self.remaining == 0 {
            return None;
        }
        let slot = &mut self.slots[self.back];
        self.back = slot.left;
        self.remaining -= 1;
        slot.value.take()
    }
}

impl<E> ExactSizeIterator for IntoIter<E> {}
impl<E> FusedIterator for IntoIter<E> {}

impl<E, S> IntoIterator for EntityCollection<E, S> {
    type Item = E;
    type IntoIter = IntoIter<E>;

    /// Consumes the collection without notifying observers.
    fn into_iter(self) -> IntoIter<E> {
        IntoIter {
            slots: self.slots,
            front: self.head,
            back: self.tail,
            remaining: self.count,
        }
    }
}

impl<'a, E, S> IntoIterator for &'a EntityCollection<E, S> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Iter<'a, E> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::hash::Hasher;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            7
        }
    }

    fn items<E: Clone, S>(c: &EntityCollection<E, S>) -> Vec<E> {
        c.iter().cloned().collect()
    }

    /// Invariant: a duplicate add is rejected and changes nothing.
    #[test]
    fn duplicate_add_rejected() {
        let mut c = EntityCollection::new();
        assert!(c.add("A"));
        assert!(c.add("B"));
        assert!(!c.add("A"));
        assert_eq!(c.len(), 2);
        assert_eq!(items(&c), vec!["A", "B"]);
        c.assert_invariants();
    }

    /// Invariant: enumeration after adds only follows call order.
    #[test]
    fn iteration_follows_insertion_order() {
        let c: EntityCollection<i32> = (0..50).rev().collect();
        assert_eq!(items(&c), (0..50).rev().collect::<Vec<_>>());
        assert_eq!(c.first(), Some(&49));
        assert_eq!(c.last(), Some(&0));
        assert_eq!(c.iter().len(), 50);
    }

    /// Invariant: removing from the middle splices without reordering;
    /// head and tail move only when they are the removed item.
    #[test]
    fn removal_splices_order_list() {
        let mut c: EntityCollection<i32> = (1..=5).collect();
        assert!(c.remove(&3));
        assert_eq!(items(&c), vec![1, 2, 4, 5]);
        assert_eq!(c.first(), Some(&1));
        assert_eq!(c.last(), Some(&5));

        assert!(c.remove(&1));
        assert_eq!(c.first(), Some(&2));
        assert!(c.remove(&5));
        assert_eq!(c.last(), Some(&4));
        assert_eq!(items(&c), vec![2, 4]);
        c.assert_invariants();
    }

    /// Invariant: a removed then re-added item goes to the tail.
    #[test]
    fn readd_moves_to_tail() {
        let mut c = EntityCollection::new();
        c.add("A");
        c.add("B");
        assert!(c.remove("A"));
        c.add("C");
        assert_eq!(items(&c), vec!["B", "C"]);
        c.add("A");
        assert_eq!(items(&c), vec!["B", "C", "A"]);
        c.assert_invariants();
    }

    /// Invariant: freed slots are reused before the arena grows.
    #[test]
    fn free_list_reuses_slots_before_growing() {
        let mut c = EntityCollection::with_capacity(3);
        assert_eq!(c.capacity(), 3);
        c.add(1);
        c.add(2);
        c.add(3);
        c.remove(&2);
        c.add(4);
        assert_eq!(c.capacity(), 3, "reused slot must not trigger growth");
        assert_eq!(items(&c), vec![1, 3, 4]);
        c.add(5);
        assert_eq!(c.capacity(), 7);
        c.assert_invariants();
    }

    /// Invariant: growth keeps membership and order for every prior item.
    #[test]
    fn growth_preserves_contents_and_order() {
        let mut c = EntityCollection::with_capacity(0);
        assert_eq!(c.capacity(), 0);
        let mut grown = 0;
        let mut last_cap = 0;
        for i in 0..1000 {
            c.add(i);
            if c.capacity() != last_cap {
                grown += 1;
                last_cap = c.capacity();
            }
        }
        assert!(grown > 3);
        assert!(crate::primes::is_prime(c.capacity()));
        assert!((0..1000).all(|i| c.contains(&i)));
        assert_eq!(items(&c), (0..1000).collect::<Vec<_>>());
        c.assert_invariants();
    }

    /// Invariant: emptying by removal resets the arena so the next add starts fresh.
    #[test]
    fn last_removal_resets_arena() {
        let mut c = EntityCollection::with_capacity(3);
        c.add(10);
        c.add(11);
        c.remove(&10);
        c.remove(&11);
        assert!(c.is_empty());
        assert_eq!(c.first(), None);
        assert_eq!(c.last(), None);
        c.assert_invariants();
        c.add(12);
        assert_eq!(items(&c), vec![12]);
        c.assert_invariants();
    }

    #[test]
    fn remove_absent_and_on_empty_is_noop() {
        let mut c: EntityCollection<String> = EntityCollection::new();
        assert!(!c.remove("ghost"));
        c.add("x".to_string());
        assert!(!c.remove("ghost"));
        assert_eq!(c.len(), 1);
        assert_eq!(c.take("x"), Some("x".to_string()));
        assert_eq!(c.take("x"), None);
    }

    /// Invariant: add fires added then state-changed; duplicates fire nothing.
    #[test]
    fn add_and_remove_notify_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut c = EntityCollection::new();
        let l = log.clone();
        c.on_added().subscribe(move |v: &i32| l.borrow_mut().push(format!("+{v}")));
        let l = log.clone();
        c.on_removed().subscribe(move |v: &i32| l.borrow_mut().push(format!("-{v}")));
        let l = log.clone();
        c.on_state_changed().subscribe(move |_| l.borrow_mut().push("~".to_string()));

        c.add(1);
        c.add(1);
        c.remove(&1);
        c.remove(&1);
        assert_eq!(*RefCell::borrow(&log), vec!["+1", "~", "-1", "~"]);
    }

    /// Invariant: clear reports every prior item, then exactly one state change.
    #[test]
    fn clear_notifies_after_emptying() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut c = EntityCollection::new();
        c.extend(["a", "b", "c"]);
        let l = log.clone();
        c.on_removed().subscribe(move |v: &&str| l.borrow_mut().push(v.to_string()));
        let l = log.clone();
        c.on_state_changed().subscribe(move |_| l.borrow_mut().push("~".to_string()));

        c.clear();
        assert_eq!(*RefCell::borrow(&log), vec!["a", "b", "c", "~"]);
        assert!(c.is_empty());
        assert!(!c.contains("a"));

        c.clear();
        assert_eq!(RefCell::borrow(&log).len(), 4, "clearing an empty collection is silent");
        c.assert_invariants();
    }

    #[test]
    fn unsubscribe_all_silences_observers() {
        let hits = Rc::new(RefCell::new(0));
        let mut c = EntityCollection::new();
        let h = hits.clone();
        c.on_added().subscribe(move |_: &u8| *h.borrow_mut() += 1);
        let h = hits.clone();
        c.on_state_changed().subscribe(move |_| *h.borrow_mut() += 1);
        c.add(1);
        assert_eq!(*RefCell::borrow(&hits), 2);
        c.unsubscribe_all();
        c.add(2);
        assert_eq!(*RefCell::borrow(&hits), 2);
    }

    /// Invariant: with all hashes colliding, hash-only matching treats distinct
    /// items as equal, while full equality keeps them apart.
    #[test]
    fn match_mode_under_total_collision() {
        let mut fast: EntityCollection<&str, ConstBuildHasher> =
            EntityCollection::with_hasher(ConstBuildHasher);
        assert_eq!(fast.match_mode(), MatchMode::HashOnly);
        assert!(fast.add("a"));
        assert!(!fast.add("b"));
        assert!(fast.contains("b"));

        let mut exact: EntityCollection<&str, ConstBuildHasher> =
            EntityCollection::with_hasher(ConstBuildHasher)
                .with_match_mode(MatchMode::FullEquality);
        for s in ["a", "b", "c", "d", "e"] {
            assert!(exact.add(s));
        }
        assert!(!exact.add("c"));
        assert!(exact.contains("d"));
        assert!(!exact.contains("z"));
        assert!(exact.remove("c"));
        assert!(exact.remove("a"));
        assert_eq!(items(&exact), vec!["b", "d", "e"]);
        exact.assert_invariants();
    }

    #[test]
    fn copy_to_checks_space_before_writing() {
        let c: EntityCollection<i32> = [4, 5, 6].into_iter().collect();
        let mut dst = [0; 5];
        assert_eq!(
            c.copy_to(&mut dst, 3),
            Err(CollectionError::DestinationTooSmall {
                required: 3,
                index: 3,
                available: 2
            })
        );
        assert_eq!(dst, [0; 5]);
        assert_eq!(
            c.copy_to(&mut dst, 6),
            Err(CollectionError::IndexOutOfRange { index: 6, len: 5 })
        );
        c.copy_to(&mut dst, 1).unwrap();
        assert_eq!(dst, [0, 4, 5, 6, 0]);
    }

    #[test]
    fn capacity_overflow_is_an_error() {
        let err = EntityCollection::<u32>::try_with_capacity(MAX_CAPACITY + 1).unwrap_err();
        assert_eq!(
            err,
            CollectionError::CapacityOverflow {
                requested: MAX_CAPACITY + 1,
                max: MAX_CAPACITY
            }
        );
        let c = EntityCollection::<u32>::try_with_capacity(10).unwrap();
        assert_eq!(c.capacity(), 11);
    }

    #[test]
    fn double_ended_and_owning_iteration() {
        let mut c: EntityCollection<i32> = (1..=6).collect();
        c.remove(&4);
        assert_eq!(c.iter().rev().copied().collect::<Vec<_>>(), vec![6, 5, 3, 2, 1]);

        let mut it = c.iter();
        assert_eq!(it.next(), Some(&1));
        assert_eq!(it.next_back(), Some(&6));
        assert_eq!(it.len(), 3);
        assert_eq!(it.collect::<Vec<_>>(), vec![&2, &3, &5]);

        let owned: Vec<i32> = c.into_iter().collect();
        assert_eq!(owned, vec![1, 2, 3, 5, 6]);
    }

    /// Invariant: growth stops at `MAX_CAPACITY` instead of overshooting it.
    #[test]
    fn growth_is_capped_at_max_capacity() {
        assert_eq!(grown_capacity(0), Some(3));
        assert_eq!(grown_capacity(3), Some(7));
        assert_eq!(grown_capacity(MAX_CAPACITY / 2 + 10), Some(MAX_CAPACITY));
        assert_eq!(grown_capacity(MAX_CAPACITY), None);
    }

    /// Invariant: a panicking `on_removed` subscriber leaves `clear` with
    /// an empty, consistent, reusable collection.
    #[test]
    fn clear_stays_consistent_when_a_subscriber_panics() {
        let mut c: EntityCollection<i32> = (1..=3).collect();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        c.on_removed().subscribe(move |v: &i32| {
            sink.borrow_mut().push(*v);
            if *v == 2 {
                panic!("subscriber failure");
            }
        });

        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| c.clear()));
        assert!(res.is_err());
        assert_eq!(*RefCell::borrow(&seen), vec![1, 2]);
        assert!(c.is_empty());
        c.assert_invariants();

        c.unsubscribe_all();
        assert!(!c.contains(&1));
        assert!(c.add(4));
        assert!(c.add(1));
        assert!(c.contains(&4));
        assert_eq!(items(&c), vec![4, 1]);
        c.assert_invariants();
    }

    #[test]
    fn borrowed_lookup_with_str() {
        let mut c: EntityCollection<String> = EntityCollection::new();
        c.add("hello".to_string());
        assert!(c.contains("hello"));
        assert!(!c.contains("world"));
        assert_eq!(format!("{c:?}"), "{\"hello\"}");
    }
}
