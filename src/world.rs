//! World: owns the entity table, the registered pools, and the filter index.

use std::any::TypeId as StdTypeId;

use ahash::AHashMap;

use crate::entity::{Entity, EntityTable};
use crate::error::{self, Error};
use crate::filter::Filter;
use crate::mask::{MaskBuilder, TypeId};
use crate::pool::{AnyPool, Component, Pool};

#[cfg(feature = "events")]
use crate::listener::WorldListener;

/// Opaque handle to a built [`Filter`], returned by [`FilterBuilder::end`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FilterId(pub(crate) usize);

/// A 64-bit round-trippable encoding of an [`Entity`]: id in the low 32
/// bits, generation in the high 32.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PackedEntity(u64);

impl PackedEntity {
    /// Packs an entity handle into a single `u64`.
    pub fn pack(e: Entity) -> Self {
        PackedEntity((e.id() as u64) | ((e.generation() as i64 as u64) << 32))
    }

    /// The raw `u64` representation.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Reconstructs the `(id, generation)` pair without validating
    /// liveness; use [`World::unpack_entity`] to validate against a world.
    pub fn unpack_unchecked(self) -> Entity {
        let id = (self.0 & 0xFFFF_FFFF) as u32;
        let generation = ((self.0 >> 32) as u32) as i32 as i16;
        Entity::new(id, generation)
    }
}

/// Isolated collection of entities, pools, and filters.
pub struct World {
    name: String,
    default_capacity: usize,
    entities: EntityTable,
    pools: Vec<Option<Box<dyn AnyPool>>>,
    pool_type_names: Vec<&'static str>,
    pool_ids_by_type: AHashMap<StdTypeId, u32>,
    filters_by_included: Vec<Vec<usize>>,
    filters_by_excluded: Vec<Vec<usize>>,
    filter_by_hash: AHashMap<u64, usize>,
    all_filters: Vec<Filter>,
    #[cfg(feature = "events")]
    listeners: Vec<Box<dyn WorldListener>>,
}

impl World {
    /// Creates an empty world with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, 0)
    }

    /// Creates an empty world, pre-sizing entity/pool/filter sparse arrays
    /// to `capacity` so the first few growths are avoided.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        World {
            name: name.into(),
            default_capacity: capacity,
            entities: EntityTable::with_capacity(capacity),
            pools: Vec::new(),
            pool_type_names: Vec::new(),
            pool_ids_by_type: AHashMap::new(),
            filters_by_included: Vec::new(),
            filters_by_excluded: Vec::new(),
            filter_by_hash: AHashMap::new(),
            all_filters: Vec::new(),
            #[cfg(feature = "events")]
            listeners: Vec::new(),
        }
    }

    /// The name this world was constructed with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the compile-time listener for entity/component/filter/
    /// world lifecycle events. Only available with the `events` feature.
    #[cfg(feature = "events")]
    pub fn add_listener(&mut self, listener: Box<dyn WorldListener>) {
        self.listeners.push(listener);
    }

    // ---- pool registration -------------------------------------------

    /// Registers a pool for component type `T`. Fails with
    /// `PoolAlreadyExists` if already registered (debug only; release
    /// silently re-registers a fresh, empty pool).
    pub fn allow_pool<T: Component>(&mut self) -> TypeId {
        let std_id = StdTypeId::of::<T>();

        #[cfg(debug_assertions)]
        error::report(self.checked_allow_pool_precondition(std_id, std::any::type_name::<T>()));

        let pool_id = self.pools.len() as u32;
        let mut pool = Pool::<T>::new();
        pool.resize(self.default_capacity);
        self.pools.push(Some(Box::new(pool)));
        self.pool_type_names.push(std::any::type_name::<T>());
        self.pool_ids_by_type.insert(std_id, pool_id);
        // Invariant W2: every pool gets a (possibly empty) filter slot.
        self.filters_by_included.push(Vec::new());
        self.filters_by_excluded.push(Vec::new());

        log::debug!(
            "registered pool id={pool_id} type={}",
            std::any::type_name::<T>()
        );
        pool_id
    }

    #[cfg(debug_assertions)]
    fn checked_allow_pool_precondition(
        &self,
        std_id: StdTypeId,
        type_name: &'static str,
    ) -> error::Result<()> {
        if self.pool_ids_by_type.contains_key(&std_id) {
            return Err(Error::PoolAlreadyExists { type_name });
        }
        Ok(())
    }

    /// The integer type id assigned to `T` at registration time.
    pub fn pool_id<T: Component>(&self) -> TypeId {
        match self.pool_ids_by_type.get(&StdTypeId::of::<T>()) {
            Some(&id) => id,
            None => {
                #[cfg(debug_assertions)]
                {
                    error::report::<TypeId>(Err(Error::PoolNotRegistered {
                        type_name: std::any::type_name::<T>(),
                    }))
                }
                #[cfg(not(debug_assertions))]
                unreachable!("pool for {} not registered", std::any::type_name::<T>())
            }
        }
    }

    fn pool_ref<T: Component>(&self, pool_id: TypeId) -> &Pool<T> {
        self.pools[pool_id as usize]
            .as_ref()
            .expect("pool slot empty")
            .as_any()
            .downcast_ref::<Pool<T>>()
            .expect("pool type mismatch")
    }

    fn pool_mut<T: Component>(&mut self, pool_id: TypeId) -> &mut Pool<T> {
        self.pools[pool_id as usize]
            .as_mut()
            .expect("pool slot empty")
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
            .expect("pool type mismatch")
    }

    /// Read-only access to the pool for `T`.
    pub fn get_pool<T: Component>(&self) -> &Pool<T> {
        let id = self.pool_id::<T>();
        self.pool_ref(id)
    }

    /// Mutable access to the pool for `T`.
    pub fn get_pool_mut<T: Component>(&mut self) -> &mut Pool<T> {
        let id = self.pool_id::<T>();
        self.pool_mut(id)
    }

    // ---- entity lifecycle ----------------------------------------------

    /// Allocates a new entity.
    pub fn new_entity(&mut self) -> Entity {
        let e = self.entities.new_entity();
        #[cfg(feature = "events")]
        for listener in &mut self.listeners {
            listener.on_entity_created(e);
        }
        e
    }

    /// `true` iff `e` is currently alive.
    pub fn is_alive(&self, e: Entity) -> bool {
        self.entities.is_alive(e)
    }

    /// Number of components currently attached to `e`.
    pub fn components_count(&self, e: Entity) -> u16 {
        self.entities.components_count(e)
    }

    /// Iterates every currently alive entity, in id order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive()
    }

    #[cfg(debug_assertions)]
    fn checked_alive_precondition(&self, e: Entity) -> error::Result<()> {
        if !self.entities.is_alive(e) {
            return Err(Error::InvalidEntity { entity: e });
        }
        Ok(())
    }

    /// Removes every component from `e`, then kills it. No-op if already
    /// dead.
    pub fn del_entity(&mut self, e: Entity) {
        if !self.entities.is_alive(e) {
            return;
        }
        for pool_id in 0..self.pools.len() {
            if self.entities.components_count(e) == 0 {
                break;
            }
            let has = self.pools[pool_id]
                .as_ref()
                .map(|p| p.has_dyn(e))
                .unwrap_or(false);
            if !has {
                continue;
            }
            let change = self.pools[pool_id].as_mut().unwrap().del_dyn(e);
            if let Some(change) = change {
                self.notify_pool_change(pool_id as u32, change);
                self.entities.dec_components(e.id());
                #[cfg(feature = "events")]
                for listener in &mut self.listeners {
                    listener.on_component_removed(e, self.pool_type_names[pool_id]);
                }
            }
        }
        self.entities.kill(e.id());
        #[cfg(feature = "events")]
        for listener in &mut self.listeners {
            listener.on_entity_destroyed(e);
        }
        log::debug!("destroyed entity {e:?} in world \"{}\"", self.name);
    }

    // ---- component operations ------------------------------------------

    /// Adds a default-initialized `T` to `e`. Accessing a dead entity is
    /// undefined in release; debug builds fail with `InvalidEntity`.
    pub fn add_component<T: Component>(&mut self, e: Entity) -> &mut T {
        #[cfg(debug_assertions)]
        error::report(self.checked_alive_precondition(e));
        let pool_id = self.pool_id::<T>();
        self.entities.inc_components(e.id());
        let change = self.pool_mut::<T>(pool_id).add(e);
        self.notify_pool_change(pool_id, change);
        #[cfg(feature = "events")]
        for listener in &mut self.listeners {
            listener.on_component_added(e, self.pool_type_names[pool_id as usize]);
        }
        self.pool_mut::<T>(pool_id).get(e)
    }

    /// Mutable access to `e`'s `T` component. Accessing a dead entity is
    /// undefined in release; debug builds fail with `InvalidEntity`.
    pub fn get_component<T: Component>(&mut self, e: Entity) -> &mut T {
        #[cfg(debug_assertions)]
        error::report(self.checked_alive_precondition(e));
        let pool_id = self.pool_id::<T>();
        self.pool_mut::<T>(pool_id).get(e)
    }

    /// Read-only access to `e`'s `T` component. Accessing a dead entity is
    /// undefined in release; debug builds fail with `InvalidEntity`.
    pub fn get_component_readonly<T: Component>(&self, e: Entity) -> &T {
        #[cfg(debug_assertions)]
        error::report(self.checked_alive_precondition(e));
        let pool_id = self.pool_id::<T>();
        self.pool_ref::<T>(pool_id).get_readonly(e)
    }

    /// `true` iff `e` has a `T` component.
    pub fn has_component<T: Component>(&self, e: Entity) -> bool {
        let pool_id = self.pool_id::<T>();
        self.pool_ref::<T>(pool_id).has(e)
    }

    /// Returns `e`'s existing `T`, or adds and returns a fresh default one.
    pub fn get_or_add_component<T: Component>(&mut self, e: Entity) -> &mut T {
        let pool_id = self.pool_id::<T>();
        let (_, change) = self.pool_mut::<T>(pool_id).get_or_add(e);
        if let Some(change) = change {
            self.entities.inc_components(e.id());
            self.notify_pool_change(pool_id, change);
            #[cfg(feature = "events")]
            for listener in &mut self.listeners {
                listener.on_component_added(e, self.pool_type_names[pool_id as usize]);
            }
        }
        self.pool_mut::<T>(pool_id).get(e)
    }

    /// Removes `e`'s `T` component, if present. Cascades to
    /// [`World::del_entity`] if `e`'s component count reaches zero.
    /// Accessing a dead entity is undefined in release; debug builds fail
    /// with `InvalidEntity`.
    pub fn del_component<T: Component>(&mut self, e: Entity) {
        #[cfg(debug_assertions)]
        error::report(self.checked_alive_precondition(e));
        let pool_id = self.pool_id::<T>();
        let change = self.pool_mut::<T>(pool_id).del(e);
        if let Some(change) = change {
            self.notify_pool_change(pool_id, change);
            #[cfg(feature = "events")]
            for listener in &mut self.listeners {
                listener.on_component_removed(e, self.pool_type_names[pool_id as usize]);
            }
            let remaining = self.entities.dec_components(e.id());
            if remaining == 0 {
                self.del_entity(e);
            }
        }
    }

    /// Reassigns `src`'s `T` component to `dst` without copying. `dst` must
    /// be absent, `src` present. Cascades `src` to `del_entity` if it is
    /// left with zero components. Both entities must be alive; debug builds
    /// fail with `InvalidEntity` otherwise.
    pub fn transfer_component<T: Component>(&mut self, src: Entity, dst: Entity) {
        #[cfg(debug_assertions)]
        {
            error::report(self.checked_alive_precondition(src));
            error::report(self.checked_alive_precondition(dst));
        }
        let pool_id = self.pool_id::<T>();
        let (change_src, change_dst) = self.pool_mut::<T>(pool_id).transfer(src, dst);
        self.notify_pool_change(pool_id, change_src);
        self.notify_pool_change(pool_id, change_dst);
        self.entities.inc_components(dst.id());
        let remaining = self.entities.dec_components(src.id());
        if remaining == 0 {
            self.del_entity(src);
        }
    }

    /// Materializes a copy of `src`'s `T` component on `dst`. Does not run
    /// init/destroy hooks. Both entities must be alive; debug builds fail
    /// with `InvalidEntity` otherwise.
    pub fn clone_component<T: Component + Clone>(&mut self, src: Entity, dst: Entity) {
        #[cfg(debug_assertions)]
        {
            error::report(self.checked_alive_precondition(src));
            error::report(self.checked_alive_precondition(dst));
        }
        let pool_id = self.pool_id::<T>();
        let change = self.pool_mut::<T>(pool_id).clone_component(src, dst);
        self.notify_pool_change(pool_id, change);
        self.entities.inc_components(dst.id());
    }

    /// Exchanges the `T` component slots of `a` and `b`. Both must already
    /// have one, and both must be alive; debug builds fail with
    /// `InvalidEntity` otherwise.
    pub fn swap_component<T: Component>(&mut self, a: Entity, b: Entity) {
        #[cfg(debug_assertions)]
        {
            error::report(self.checked_alive_precondition(a));
            error::report(self.checked_alive_precondition(b));
        }
        let pool_id = self.pool_id::<T>();
        let (change_a, change_b) = self.pool_mut::<T>(pool_id).swap(a, b);
        self.notify_pool_change(pool_id, change_a);
        self.notify_pool_change(pool_id, change_b);
    }

    // ---- filters ---------------------------------------------------------

    /// Starts building a filter over this world's pools.
    pub fn filter(&mut self) -> FilterBuilder<'_> {
        FilterBuilder {
            world: self,
            builder: MaskBuilder::new(),
        }
    }

    /// The entities currently satisfying `id`.
    pub fn filter_entities(&self, id: FilterId) -> &[Entity] {
        self.all_filters[id.0].entities()
    }

    /// The filter object for `id`.
    pub fn get_filter(&self, id: FilterId) -> &Filter {
        &self.all_filters[id.0]
    }

    fn end_filter(&mut self, builder: MaskBuilder) -> FilterId {
        let mask = builder
            .end()
            .unwrap_or_else(|e| panic!("{e}"));

        if let Some(&existing) = self.filter_by_hash.get(&mask.hash()) {
            return FilterId(existing);
        }

        let mut filter = Filter::new(mask.clone());
        filter.resize(self.entities.capacity_len());
        let World {
            pools, entities, ..
        } = self;
        let has = |e: Entity, t: TypeId| {
            pools[t as usize]
                .as_ref()
                .map(|p| p.has_dyn(e))
                .unwrap_or(false)
        };
        filter.initial_scan(entities.iter_alive(), has);

        let filter_id = self.all_filters.len();
        for &t in mask.include() {
            self.filters_by_included[t as usize].push(filter_id);
        }
        for &t in mask.exclude() {
            self.filters_by_excluded[t as usize].push(filter_id);
        }
        self.filter_by_hash.insert(mask.hash(), filter_id);
        self.all_filters.push(filter);

        log::debug!(
            "created filter id={filter_id} include={:?} exclude={:?}",
            mask.include(),
            mask.exclude()
        );
        #[cfg(feature = "events")]
        for listener in &mut self.listeners {
            listener.on_filter_created(FilterId(filter_id));
        }
        FilterId(filter_id)
    }

    /// Pre-sizes every registered pool's and filter's sparse array to
    /// accommodate at least `capacity` entities, so a host can avoid the
    /// first few incremental growths.
    pub fn reserve(&mut self, capacity: usize) {
        self.entities.reserve_ids(capacity);
        for pool in self.pools.iter_mut().flatten() {
            pool.resize_dyn(capacity);
        }
        for filter in &mut self.all_filters {
            filter.resize(capacity);
        }
        #[cfg(feature = "events")]
        for listener in &mut self.listeners {
            listener.on_world_resized(capacity);
        }
        log::debug!("world \"{}\" reserved to capacity={capacity}", self.name);
    }

    fn notify_pool_change(&mut self, type_id: TypeId, change: crate::pool::PoolChange) {
        let e = change.entity;
        let added = change.added;
        let World {
            pools,
            filters_by_included,
            filters_by_excluded,
            all_filters,
            ..
        } = self;
        let has = |ent: Entity, t: TypeId| {
            pools[t as usize]
                .as_ref()
                .map(|p| p.has_dyn(ent))
                .unwrap_or(false)
        };

        for &idx in &filters_by_included[type_id as usize] {
            let filter = &mut all_filters[idx];
            if added {
                if !filter.contains(e) && filter.mask().is_compatible(|t| has(e, t)) {
                    filter.insert(e);
                }
            } else if filter.contains(e) {
                filter.remove(e);
            }
        }

        for &idx in &filters_by_excluded[type_id as usize] {
            let filter = &mut all_filters[idx];
            if added {
                if filter.contains(e) {
                    filter.remove(e);
                }
            } else if !filter.contains(e)
                && filter
                    .mask()
                    .is_compatible_without(type_id, |t| has(e, t))
            {
                filter.insert(e);
            }
        }
    }

    // ---- packing -----------------------------------------------------

    /// Packs `e` into a round-trippable `u64` handle.
    pub fn pack_entity(&self, e: Entity) -> PackedEntity {
        PackedEntity::pack(e)
    }

    /// Unpacks a handle, returning `None` unless the entity is alive and
    /// its generation matches.
    pub fn unpack_entity(&self, packed: PackedEntity) -> Option<Entity> {
        let e = packed.unpack_unchecked();
        if self.entities.is_alive(e) {
            Some(e)
        } else {
            None
        }
    }
}

/// Fluent filter constructor: `world.filter().inc::<A>().exc::<B>().end()`.
pub struct FilterBuilder<'w> {
    world: &'w mut World,
    builder: MaskBuilder,
}

impl<'w> FilterBuilder<'w> {
    /// Requires component `T` to be present.
    pub fn inc<T: Component>(mut self) -> Self {
        let id = self.world.pool_id::<T>();
        self.builder = self.builder.include(id);
        self
    }

    /// Requires component `T` to be absent.
    pub fn exc<T: Component>(mut self) -> Self {
        let id = self.world.pool_id::<T>();
        self.builder = self.builder.exclude(id);
        self
    }

    /// Finalizes the filter, reusing an existing one with the same content
    /// hash if present.
    pub fn end(self) -> FilterId {
        self.world.end_filter(self.builder)
    }
}
