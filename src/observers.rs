//! Observers: synchronous callback registry with generational subscription keys.
//!
//! Collections, entities and filters expose their change notifications as
//! `Observers<T>` lists. Subscribing returns a [`SubscriptionKey`]; a key
//! stays unique after unsubscription, so a stale key can never remove a
//! later subscriber that happens to reuse the slot.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle for one registered callback.
    pub struct SubscriptionKey;
}

type Callback<T> = Box<dyn FnMut(&T)>;

/// Ordered list of `FnMut(&T)` callbacks invoked in-line by `emit`.
///
/// Callbacks run in slot order, which equals registration order as long as
/// nothing has been unsubscribed. There is no queuing: an `emit` returns
/// only after every callback has returned.
pub struct Observers<T: ?Sized> {
    callbacks: SlotMap<SubscriptionKey, Callback<T>>,
}

impl<T: ?Sized> Observers<T> {
    pub fn new() -> Self {
        Self {
            callbacks: SlotMap::with_key(),
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionKey
    where
        F: FnMut(&T) + 'static,
    {
        self.callbacks.insert(Box::new(callback))
    }

    /// Removes one callback. Returns `false` for stale keys.
    ///
    /// Keys are only meaningful for the list that issued them.
    pub fn unsubscribe(&mut self, key: SubscriptionKey) -> bool {
        self.callbacks.remove(key).is_some()
    }

    pub fn contains(&self, key: SubscriptionKey) -> bool {
        self.callbacks.contains_key(key)
    }

    /// Drops every callback.
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// Invokes every callback with `arg`.
    pub fn emit(&mut self, arg: &T) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback(arg);
        }
    }
}

impl<T: ?Sized> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> core::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.callbacks.len())
            .finish()
    }
}
