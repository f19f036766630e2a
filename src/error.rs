//! Stratum error module.
//!
//! There is a single `Error` enum representing the taxonomy of checked
//! preconditions the core enforces. Every variant is only ever constructed
//! on a debug build (`#[cfg(debug_assertions)]`); a release build skips the
//! check entirely and performs the raw, unchecked operation instead.

use thiserror::Error;

use crate::entity::Entity;

/// The stratum-ecs error type, covering every checked precondition named in
/// the core's error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    /// `get_pool`/`add`/`get` (and friends) were called for a component type
    /// that was never registered with `World::allow_pool`.
    #[error("pool for component type {type_name} was not registered with allow_pool")]
    PoolNotRegistered {
        /// Name of the unregistered component type, for diagnostics.
        type_name: &'static str,
    },

    /// `allow_pool::<T>()` was called twice for the same type on the same
    /// world.
    #[error("pool for component type {type_name} is already registered")]
    PoolAlreadyExists {
        /// Name of the already-registered component type.
        type_name: &'static str,
    },

    /// An entity id is out of range, or its generation marks it dead.
    #[error("entity {entity:?} is invalid (out of range or dead)")]
    InvalidEntity {
        /// The offending entity handle.
        entity: Entity,
    },

    /// `Pool::add` was called for an entity that already has the component.
    #[error("entity {entity:?} already has a component in pool {type_name}")]
    AlreadyPresent {
        /// The entity that already carries the component.
        entity: Entity,
        /// Name of the pool's component type.
        type_name: &'static str,
    },

    /// `Pool::get`/`get_mut`/`del`/`transfer`/`swap`/`clone` preconditions
    /// were violated: the entity has no component in this pool.
    #[error("entity {entity:?} has no component in pool {type_name}")]
    NotPresent {
        /// The entity missing the component.
        entity: Entity,
        /// Name of the pool's component type.
        type_name: &'static str,
    },

    /// A `Mask` was built with a duplicate type id, or with a type id that
    /// appears in both the include and the exclude list.
    #[error("invalid mask: {reason}")]
    InvalidMask {
        /// Human-readable reason (duplicate type, include/exclude overlap).
        reason: &'static str,
    },

    /// A post-hook leaked-entity check found an entity with zero components
    /// still alive, inside the named world.
    #[error("leaked entity detected in world \"{world_name}\": entity {entity:?} has zero components")]
    LeakedEntity {
        /// Name of the world the leak was found in.
        world_name: String,
        /// The leaked entity.
        entity: Entity,
    },

    /// A group toggle request named a group that the builder never created.
    #[error("unknown group \"{name}\"")]
    UnknownGroup {
        /// The unrecognized group name.
        name: String,
    },

    /// The builder was misused: an empty world name, a system added with no
    /// declarations where declarations are mandatory, etc.
    #[error("builder misconfiguration: {reason}")]
    BuilderMisconfiguration {
        /// Human-readable description of the misconfiguration.
        reason: &'static str,
    },
}

/// Result alias used throughout the checked (debug-only) call paths.
pub type Result<T> = std::result::Result<T, Error>;

/// Turns a checked `Result` into the "Reported" behavior from the error
/// taxonomy: abort the current operation via panic. Only ever called from
/// `#[cfg(debug_assertions)]` code; release builds never call this because
/// they never construct the `Result` in the first place.
#[cfg(debug_assertions)]
pub(crate) fn report<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            log::error!("{err}");
            panic!("{err}");
        }
    }
}
