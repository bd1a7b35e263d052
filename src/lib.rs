//! atomic-entities: insertion-ordered entity collections and a small
//! single-threaded entity runtime built on top of them.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: an O(1) hash set that also enumerates in insertion order, and
//!   the entity machinery that keeps its working sets in one.
//! - Layers:
//!   - EntityCollection<E, S>: slot arena with bucket chains for lookup
//!     and a doubly-linked order list for enumeration. Emits
//!     `on_added` / `on_removed` / `on_state_changed`.
//!   - Entity: `Rc` handle with identity equality carrying tags, typed
//!     values, behaviours and a lifecycle (`Created -> Initialized ->
//!     Enabled`). Every change is published to subscribers.
//!   - EntityWorld / EntityLoop: a named collection driven through the
//!     lifecycle, and a fixed-timestep ticker for it.
//!   - EntityFilter / EntityPool: derived live subsets and recycling,
//!     both kept as EntityCollections.
//!
//! Constraints
//! - Single-threaded: entities are `!Send`/`!Sync`.
//! - Notifications are synchronous and fire after the structure is
//!   consistent again; there is no event queue.
//! - Observers must not mutate the collection that is notifying them.
//!   The `&mut` receiver of every mutating method makes that a borrow
//!   error for direct access.
//!
//! Matching
//! - Collision chains compare the cached 64-bit hash. The default
//!   `MatchMode::HashOnly` stops there, so two distinct values with equal
//!   hashes cannot coexist. `MatchMode::FullEquality` confirms with `==`.
//!
//! Growth
//! - Capacities are primes (`primes::get_prime` / `expand_prime`);
//!   growth at least doubles. Growing rebuilds bucket chains only; the
//!   order list is index based and survives unchanged.
//!
//! Reentrancy
//! - Lifecycle hooks run with the entity's behaviour list borrowed. A
//!   debug-only `DispatchGuard` turns nested lifecycle calls on the same
//!   entity into a panic naming both hooks.
//!
//! Ambient stack
//! - Errors: `thiserror` enums in `error`.
//! - Logging: `tracing` in the world, loop and pool; the collection itself
//!   never logs and no subscriber is installed.
//! - Configuration: `serde` + `toml` via `RuntimeConfig::from_toml_str`.

mod behaviour;
mod config;
mod entity;
pub mod entity_collection;
mod entity_collection_proptest;
mod entity_loop;
pub mod error;
mod filter;
mod observers;
mod pool;
pub mod primes;
mod reentrancy;
mod world;

// Public surface
pub use behaviour::Behaviour;
pub use config::{LoopConfig, RuntimeConfig, WorldConfig};
pub use entity::{Entity, EntityEvent, EntityEventKind, EntityId, EntityState, TagKey, ValueKey};
pub use entity_collection::{EntityCollection, IntoIter, Iter, MatchMode};
pub use entity_loop::{EntityLoop, TickReport};
pub use error::{CollectionError, ConfigError, LoopError};
pub use filter::{BehaviourTrigger, EntityFilter, StateTrigger, TagTrigger, Trigger, ValueTrigger};
pub use observers::{Observers, SubscriptionKey};
pub use pool::EntityPool;
pub use primes::MAX_CAPACITY;
pub use world::EntityWorld;
