//! Builder surface: the fluent configuration layer that materializes a
//! [`crate::dispatcher::Dispatcher`].

use std::any::{Any, TypeId as StdTypeId};

use ahash::AHashMap;

use crate::access::{AccessSet, RunSystem};
use crate::bucket;
use crate::dispatcher::Dispatcher;
use crate::error::{self, Error};
use crate::group::GroupRegistry;
use crate::tick::{TickMode, TickedSystem};
use crate::world::World;

/// Read-only view into the builder's configured worlds, injected values,
/// and singletons, handed to every system's constructor so it can resolve
/// pools, filters, singletons, and injected values at build time.
pub struct BuildContext<'b> {
    worlds: &'b AHashMap<String, World>,
    injected: &'b AHashMap<String, Box<dyn Any + Send + Sync>>,
    singletons: &'b AHashMap<StdTypeId, Box<dyn Any + Send + Sync>>,
}

impl<'b> BuildContext<'b> {
    /// The world registered under `name`, if any.
    pub fn world(&self, name: &str) -> Option<&World> {
        self.worlds.get(name)
    }

    /// The injected value registered under `name`, if any and of type `T`.
    pub fn injected<T: 'static>(&self, name: &str) -> Option<&T> {
        self.injected.get(name).and_then(|v| v.downcast_ref())
    }

    /// The singleton value of type `T`, if any.
    pub fn singleton<T: 'static>(&self) -> Option<&T> {
        self.singletons
            .get(&StdTypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }
}

/// A system type constructible from a [`BuildContext`]. Implemented by
/// every user run-system so the builder can materialize it at
/// [`SystemsBuilder::finish`] time, after bucket assignment.
pub trait BuildableSystem: RunSystem + Sized {
    /// Builds a fresh instance, resolving whatever pools/filters/singletons
    /// it needs from `ctx`.
    fn new(ctx: &BuildContext) -> Self;
}

struct PendingSystem {
    access: AccessSet,
    tick_mode: TickMode,
    tick_delay: f64,
    group: Option<String>,
    factory: Box<dyn FnOnce(&BuildContext) -> Box<dyn RunSystem>>,
}

/// Fluent builder: configure worlds, injected values, and systems, then
/// call [`SystemsBuilder::finish`] to produce a [`Dispatcher`].
///
/// Per-system parameters set via `set_tick_mode`/`set_tick_delay`/
/// `set_group` "stick" to every subsequent `add` until changed.
pub struct SystemsBuilder {
    worlds: AHashMap<String, World>,
    injected: AHashMap<String, Box<dyn Any + Send + Sync>>,
    singletons: AHashMap<StdTypeId, Box<dyn Any + Send + Sync>>,
    groups: GroupRegistry,
    pending: Vec<PendingSystem>,
    cur_tick_mode: TickMode,
    cur_tick_delay: f64,
    cur_group: Option<(String, bool)>,
}

impl Default for SystemsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemsBuilder {
    /// Creates an empty builder: `Loose` tick mode, zero delay, no group.
    pub fn new() -> Self {
        SystemsBuilder {
            worlds: AHashMap::new(),
            injected: AHashMap::new(),
            singletons: AHashMap::new(),
            groups: GroupRegistry::new(),
            pending: Vec::new(),
            cur_tick_mode: TickMode::Loose,
            cur_tick_delay: 0.0,
            cur_group: None,
        }
    }

    /// Sets the tick mode applied to every subsequent `add`, until changed.
    pub fn set_tick_mode(&mut self, mode: TickMode) -> &mut Self {
        self.cur_tick_mode = mode;
        self
    }

    /// Sets the tick delay (seconds) applied to every subsequent `add`.
    pub fn set_tick_delay(&mut self, seconds: f64) -> &mut Self {
        self.cur_tick_delay = seconds.max(0.0);
        self
    }

    /// Activates group `name` for subsequent `add`s, creating it (with
    /// `default_state`) if it doesn't exist yet.
    pub fn set_group(&mut self, name: impl Into<String>, default_state: bool) -> &mut Self {
        let name = name.into();
        self.groups.ensure_group(&name, default_state);
        self.cur_group = Some((name, default_state));
        self
    }

    /// Returns to the "no group" state for subsequent `add`s.
    pub fn clear_group(&mut self) -> &mut Self {
        self.cur_group = None;
        self
    }

    /// Enqueues a system of type `T`, capturing the currently set
    /// (tick mode, tick delay, group).
    pub fn add<T: BuildableSystem + 'static>(&mut self) -> &mut Self {
        let access = T::declare_access();
        let group = self.cur_group.as_ref().map(|(name, _)| name.clone());
        self.pending.push(PendingSystem {
            access,
            tick_mode: self.cur_tick_mode,
            tick_delay: self.cur_tick_delay,
            group,
            factory: Box::new(|ctx| Box::new(T::new(ctx))),
        });
        self
    }

    /// Registers a world under `name`, constructed by the caller. An empty
    /// name is a builder misconfiguration: debug builds fail with
    /// `BuilderMisconfiguration`, release builds register it unchanged.
    pub fn add_world(&mut self, name: impl Into<String>, world: World) -> &mut Self {
        let name = name.into();
        #[cfg(debug_assertions)]
        if name.is_empty() {
            error::report::<()>(Err(Error::BuilderMisconfiguration {
                reason: "world name must not be empty",
            }));
        }
        self.worlds.insert(name, world);
        self
    }

    /// Injects a named value, readable from system constructors via
    /// `BuildContext::injected`.
    pub fn inject<V: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: V) -> &mut Self {
        self.injected.insert(name.into(), Box::new(value));
        self
    }

    /// Injects a type-keyed singleton value, readable from system
    /// constructors via `BuildContext::singleton`.
    pub fn inject_singleton<V: Send + Sync + 'static>(&mut self, value: V) -> &mut Self {
        self.singletons.insert(StdTypeId::of::<V>(), Box::new(value));
        self
    }

    /// Plans buckets, materializes every queued system (constructor invoked
    /// with a [`BuildContext`] resolved after bucket assignment), and
    /// produces a [`Dispatcher`] configured for `worker_count` total
    /// worker threads (`worker_count - 1` background threads plus the
    /// calling thread as worker 0).
    pub fn finish(self, worker_count: usize) -> Dispatcher {
        assert!(worker_count >= 1, "worker_count must be at least 1");

        let access_sets: Vec<AccessSet> = self.pending.iter().map(|p| p.access.clone()).collect();
        let buckets = bucket::plan(&access_sets);

        let ctx = BuildContext {
            worlds: &self.worlds,
            injected: &self.injected,
            singletons: &self.singletons,
        };

        let mut groups = self.groups;
        let mut systems = Vec::with_capacity(self.pending.len());
        for (index, pending) in self.pending.into_iter().enumerate() {
            let system = (pending.factory)(&ctx);
            if let Some(name) = &pending.group {
                groups.add_member(name, index);
            }
            systems.push(TickedSystem::new(system, pending.tick_mode, pending.tick_delay));
        }
        drop(ctx);

        Dispatcher::new(
            systems,
            buckets,
            worker_count,
            self.worlds,
            groups,
            self.injected,
            self.singletons,
        )
    }
}
