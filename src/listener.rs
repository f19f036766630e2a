//! World Listener: an optional, compile-time-enabled hook list for
//! entity/component/filter/world lifecycle events.
//!
//! Gated behind the `events` feature so the hot paths stay hook-free when
//! it's disabled; `World` holds a `Vec<Box<dyn WorldListener>>` only under
//! `#[cfg(feature = "events")]`.

use crate::entity::Entity;
use crate::world::FilterId;

/// Observes a [`crate::world::World`]'s lifecycle events. All methods
/// default to no-ops so implementors only override what they care about.
pub trait WorldListener: Send + Sync {
    /// A new entity was allocated.
    fn on_entity_created(&mut self, _entity: Entity) {}
    /// An entity was destroyed (all components removed, then killed).
    fn on_entity_destroyed(&mut self, _entity: Entity) {}
    /// A component was attached to an entity.
    fn on_component_added(&mut self, _entity: Entity, _type_name: &'static str) {}
    /// A component was detached from an entity.
    fn on_component_removed(&mut self, _entity: Entity, _type_name: &'static str) {}
    /// A new filter was created (not a cache hit on an existing one).
    fn on_filter_created(&mut self, _filter_id: FilterId) {}
    /// The world's addressable entity-id capacity grew to at least this.
    fn on_world_resized(&mut self, _capacity: usize) {}
}
