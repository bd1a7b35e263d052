//! Behaviour: lifecycle hooks attached to an entity.

use crate::entity::Entity;

/// Logic attached to an [`Entity`]. Every hook defaults to a no-op.
///
/// Hooks receive the owning entity and may read or change its tags and
/// values. They must not call lifecycle methods (`init`, `enable`,
/// `update`, ...) or add/remove behaviours on that same entity; debug
/// builds panic when they do.
pub trait Behaviour: 'static {
    fn init(&mut self, _entity: &Entity) {}

    fn enable(&mut self, _entity: &Entity) {}

    fn update(&mut self, _entity: &Entity, _dt: f32) {}

    fn fixed_update(&mut self, _entity: &Entity, _dt: f32) {}

    fn late_update(&mut self, _entity: &Entity, _dt: f32) {}

    fn disable(&mut self, _entity: &Entity) {}

    fn dispose(&mut self, _entity: &Entity) {}
}
