//! Component Pool: a sparse-set mapping entity id -> dense slot, with
//! lifecycle hooks.
//!
//! A `Pool<T>` knows nothing about `World`; `World` is the orchestrator that
//! calls into a pool and then fans the resulting (entity, added) event out
//! to the filter index. This keeps the pool itself free of borrow cycles
//! (see DESIGN.md).

use std::any::Any;
use std::fmt;

use crate::entity::Entity;
use crate::error::{self, Error};

/// Marker trait for component types. Any `'static + Send + Sync + Default`
/// type can be a component; there is no derive macro requirement (access
/// declarations replace reflective attribute scanning, see DESIGN.md).
pub trait Component: 'static + Send + Sync + Default {}
impl<T: 'static + Send + Sync + Default> Component for T {}

/// Initialization hook: invoked exactly at `Pool::add` or slot recycle.
pub type InitHook<T> = Box<dyn Fn(&mut T) + Send + Sync>;
/// Destruction hook: invoked exactly at `Pool::del`, before the slot is
/// value-defaulted.
pub type DestroyHook<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Outcome of a pool mutation, for the caller (`World`) to fan out to the
/// filter index and entity table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PoolChange {
    pub entity: Entity,
    pub added: bool,
}

/// A sparse-set component pool for a single component type `T`.
///
/// Indices:
/// - `sparse[entity_id]` is a 1-based dense index, or `0` meaning absent.
/// - `dense[0]` is reserved/unused; real components live at `dense[1..]`.
/// - `recycled` holds dense indices freed by `del`, reused before growing
///   `dense`.
pub struct Pool<T: Component> {
    type_name: &'static str,
    dense: Vec<T>,
    dense_entities: Vec<u32>,
    sparse: Vec<u32>,
    recycled: Vec<u32>,
    init_hook: Option<InitHook<T>>,
    destroy_hook: Option<DestroyHook<T>>,
}

impl<T: Component> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("type_name", &self.type_name)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Component> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> Pool<T> {
    pub(crate) fn new() -> Self {
        Pool {
            type_name: std::any::type_name::<T>(),
            dense: vec![T::default()],
            dense_entities: vec![0],
            sparse: Vec::new(),
            recycled: Vec::new(),
            init_hook: None,
            destroy_hook: None,
        }
    }

    /// Sets the init hook, run exactly at `add` or slot-recycle.
    pub fn set_init_hook(&mut self, hook: InitHook<T>) {
        self.init_hook = Some(hook);
    }

    /// Sets the destroy hook, run exactly at `del`, before the slot is
    /// value-defaulted.
    pub fn set_destroy_hook(&mut self, hook: DestroyHook<T>) {
        self.destroy_hook = Some(hook);
    }

    fn ensure_sparse(&mut self, id: u32) {
        let id = id as usize;
        if self.sparse.len() <= id {
            self.sparse.resize(id + 1, 0);
        }
    }

    /// `true` iff the entity currently has a component in this pool.
    #[inline]
    pub fn has(&self, e: Entity) -> bool {
        self.sparse.get(e.id() as usize).copied().unwrap_or(0) != 0
    }

    /// Alias for `has`, for iterator-heavy call sites.
    #[inline]
    pub fn contains(&self, e: Entity) -> bool {
        self.has(e)
    }

    /// Number of live components currently stored.
    pub fn len(&self) -> usize {
        self.dense.len() - self.recycled.len() - 1
    }

    /// True iff no components are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn claim_slot(&mut self) -> u32 {
        if let Some(slot) = self.recycled.pop() {
            slot
        } else {
            self.dense.push(T::default());
            self.dense_entities.push(0);
            (self.dense.len() - 1) as u32
        }
    }

    /// Adds a default-initialized component for `e`. Debug builds check
    /// preconditions (`AlreadyPresent`); release is unchecked.
    pub(crate) fn add(&mut self, e: Entity) -> PoolChange {
        #[cfg(debug_assertions)]
        error::report(self.checked_add_precondition(e));

        self.ensure_sparse(e.id());
        let slot = self.claim_slot();
        self.dense[slot as usize] = T::default();
        self.dense_entities[slot as usize] = e.id();
        self.sparse[e.id() as usize] = slot;

        if let Some(hook) = &self.init_hook {
            hook(&mut self.dense[slot as usize]);
        }

        log::trace!("pool<{}>.add entity={:?} slot={slot}", self.type_name, e);
        PoolChange {
            entity: e,
            added: true,
        }
    }

    #[cfg(debug_assertions)]
    fn checked_add_precondition(&self, e: Entity) -> error::Result<()> {
        if self.has(e) {
            return Err(Error::AlreadyPresent {
                entity: e,
                type_name: self.type_name,
            });
        }
        Ok(())
    }

    /// Mutable access to the component; panics in debug (`NotPresent`) if
    /// absent, undefined in release.
    pub fn get(&mut self, e: Entity) -> &mut T {
        #[cfg(debug_assertions)]
        error::report(self.checked_present(e));
        let slot = self.sparse[e.id() as usize];
        &mut self.dense[slot as usize]
    }

    /// Read-only access to the component.
    pub fn get_readonly(&self, e: Entity) -> &T {
        #[cfg(debug_assertions)]
        error::report(self.checked_present(e));
        let slot = self.sparse[e.id() as usize];
        &self.dense[slot as usize]
    }

    #[cfg(debug_assertions)]
    fn checked_present(&self, e: Entity) -> error::Result<()> {
        if !self.has(e) {
            return Err(Error::NotPresent {
                entity: e,
                type_name: self.type_name,
            });
        }
        Ok(())
    }

    /// `has`/`get`/`add` composed: returns the existing component, or adds
    /// and returns a freshly default-initialized one. Returns the change
    /// event too, since callers (`World`) must still fan out notification
    /// for a fresh add.
    pub(crate) fn get_or_add(&mut self, e: Entity) -> (&mut T, Option<PoolChange>) {
        if self.has(e) {
            (self.get(e), None)
        } else {
            let change = self.add(e);
            (self.get(e), Some(change))
        }
    }

    /// Removes the component from `e`. No-op if absent. Returns the change
    /// event for the caller to fan out.
    pub(crate) fn del(&mut self, e: Entity) -> Option<PoolChange> {
        let id = e.id() as usize;
        if id >= self.sparse.len() || self.sparse[id] == 0 {
            return None;
        }
        let slot = self.sparse[id];
        if let Some(hook) = &self.destroy_hook {
            hook(&mut self.dense[slot as usize]);
        }
        self.dense[slot as usize] = T::default();
        self.dense_entities[slot as usize] = 0;
        self.sparse[id] = 0;
        self.recycled.push(slot);

        log::trace!("pool<{}>.del entity={:?} slot={slot}", self.type_name, e);
        Some(PoolChange {
            entity: e,
            added: false,
        })
    }

    /// Reassigns the slot owning `src`'s component to `dst` without
    /// copying. `dst` must be absent, `src` must be present.
    pub(crate) fn transfer(&mut self, src: Entity, dst: Entity) -> (PoolChange, PoolChange) {
        #[cfg(debug_assertions)]
        error::report(self.checked_transfer_preconditions(src, dst));

        self.ensure_sparse(src.id().max(dst.id()));
        let slot = self.sparse[src.id() as usize];
        self.sparse[src.id() as usize] = 0;
        self.sparse[dst.id() as usize] = slot;
        self.dense_entities[slot as usize] = dst.id();

        (
            PoolChange {
                entity: src,
                added: false,
            },
            PoolChange {
                entity: dst,
                added: true,
            },
        )
    }

    #[cfg(debug_assertions)]
    fn checked_transfer_preconditions(&self, src: Entity, dst: Entity) -> error::Result<()> {
        if !self.has(src) {
            return Err(Error::NotPresent {
                entity: src,
                type_name: self.type_name,
            });
        }
        if self.has(dst) {
            return Err(Error::AlreadyPresent {
                entity: dst,
                type_name: self.type_name,
            });
        }
        Ok(())
    }

    /// Materializes a new dense slot for `dst` with a value cloned from
    /// `src`'s; does not run init/destroy hooks.
    pub(crate) fn clone_component(&mut self, src: Entity, dst: Entity) -> PoolChange
    where
        T: Clone,
    {
        #[cfg(debug_assertions)]
        error::report(self.checked_transfer_preconditions(src, dst));

        let value = self.get_readonly(src).clone();
        self.ensure_sparse(dst.id());
        let slot = self.claim_slot();
        self.dense[slot as usize] = value;
        self.dense_entities[slot as usize] = dst.id();
        self.sparse[dst.id() as usize] = slot;

        PoolChange {
            entity: dst,
            added: true,
        }
    }

    /// Swaps the two entities' sparse entries (both must be present).
    pub(crate) fn swap(&mut self, a: Entity, b: Entity) -> (PoolChange, PoolChange) {
        #[cfg(debug_assertions)]
        {
            error::report(self.checked_present(a));
            error::report(self.checked_present(b));
        }
        self.sparse.swap(a.id() as usize, b.id() as usize);
        let slot_a = self.sparse[a.id() as usize];
        let slot_b = self.sparse[b.id() as usize];
        self.dense_entities[slot_a as usize] = a.id();
        self.dense_entities[slot_b as usize] = b.id();

        (
            PoolChange {
                entity: a,
                added: true,
            },
            PoolChange {
                entity: b,
                added: true,
            },
        )
    }

    /// Resizes the sparse array to `capacity`. The dense array is untouched.
    pub(crate) fn resize(&mut self, capacity: usize) {
        if self.sparse.len() < capacity {
            self.sparse.resize(capacity, 0);
        }
    }

    /// Raw read access to the dense array, for debug/serialization paths.
    pub fn raw_dense(&self) -> &[T] {
        &self.dense[1..]
    }

    /// Raw read access to the sparse array, for debug/serialization paths.
    pub fn raw_sparse(&self) -> &[u32] {
        &self.sparse
    }

    /// Raw read access to the recycled dense-slot stack.
    pub fn raw_recycled(&self) -> &[u32] {
        &self.recycled
    }
}

/// Dynamic-dispatch seam so `World` can hold heterogeneous pools keyed by
/// integer type id without knowing `T` (DESIGN.md: typed pool registry via
/// `TypeId`, exposed by integer id to the mask machinery).
pub(crate) trait AnyPool: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn resize_dyn(&mut self, capacity: usize);
    fn has_dyn(&self, e: Entity) -> bool;
    fn del_dyn(&mut self, e: Entity) -> Option<PoolChange>;
}

impl<T: Component> AnyPool for Pool<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn resize_dyn(&mut self, capacity: usize) {
        self.resize(capacity);
    }
    fn has_dyn(&self, e: Entity) -> bool {
        self.has(e)
    }
    fn del_dyn(&mut self, e: Entity) -> Option<PoolChange> {
        self.del(e)
    }
}
