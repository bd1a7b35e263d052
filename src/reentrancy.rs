//! Debug-only guard against re-entering entity lifecycle dispatch.
//!
//! Behaviour hooks run while the entity's behaviour list is borrowed. A
//! hook that calls back into `init`/`enable`/`update`/... on the same
//! entity would otherwise fail deep inside a `RefCell` with an opaque
//! borrow error; the guard turns that into a named panic in debug builds
//! and compiles to nothing in release builds.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

/// Per-entity dispatch tracker; `let _scope = guard.enter("update");`.
#[derive(Debug)]
pub struct DispatchGuard {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // Entities are single-threaded.
    _nosend: PhantomData<*mut ()>,
}

impl DispatchGuard {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _nosend: PhantomData,
        }
    }

    /// Marks `hook` as dispatching. Panics in debug builds if another hook
    /// on the same entity has not returned yet.
    #[inline]
    pub fn enter(&self, hook: &'static str) -> DispatchScope<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("reentrant lifecycle dispatch: `{hook}` called from within `{outer}`");
            }
            self.active.set(Some(hook));
            DispatchScope { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = hook;
            DispatchScope { _z: PhantomData }
        }
    }

    /// `true` while a hook is running. Always `false` in release builds.
    pub fn is_dispatching(&self) -> bool {
        #[cfg(debug_assertions)]
        {
            self.active.get().is_some()
        }
        #[cfg(not(debug_assertions))]
        {
            false
        }
    }
}

impl Default for DispatchGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII scope returned by [`DispatchGuard::enter`].
pub struct DispatchScope<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DispatchGuard,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchGuard;

    #[test]
    fn sequential_scopes_are_fine() {
        let g = DispatchGuard::new();
        {
            let _s = g.enter("init");
        }
        let _s = g.enter("enable");
    }

    #[cfg(debug_assertions)]
    #[test]
    fn nested_scope_panics_and_names_both_hooks() {
        let g = DispatchGuard::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _outer = g.enter("update");
            let _inner = g.enter("disable");
        }));
        let err = res.expect_err("nested dispatch must panic in debug builds");
        let msg = err
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(msg.contains("`disable` called from within `update`"), "{msg}");
    }

    #[cfg(debug_assertions)]
    #[test]
    fn scope_release_clears_state() {
        let g = DispatchGuard::new();
        {
            let _s = g.enter("init");
            assert!(g.is_dispatching());
        }
        assert!(!g.is_dispatching());
    }
}
