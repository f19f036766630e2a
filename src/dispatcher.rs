//! Dispatcher: the per-frame engine that drives the worker thread pool
//! through the ordered bucket list with two barriers.

use std::any::{Any, TypeId as StdTypeId};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;

use ahash::AHashMap;

use crate::bucket::Bucket;
use crate::error::{self, Error};
use crate::group::GroupRegistry;
use crate::tick::TickedSystem;
use crate::world::World;

/// Shared state read and written by the host thread and every worker
/// thread. Two barriers give the happens-before ordering this needs: `B1`
/// releases workers into a bucket, `B2` waits for them to finish it, so the
/// host never advances `current_bucket` before every worker has observed
/// the previous value.
struct DispatchState {
    buckets: Vec<Bucket>,
    systems_ptr: *mut TickedSystem,
    systems_len: usize,
    barrier1: Barrier,
    barrier2: Barrier,
    current_bucket: AtomicUsize,
    current_system: AtomicUsize,
    dt_bits: AtomicU64,
    disposed: AtomicBool,
}

// Safety: every claimed index into `systems_ptr[0..systems_len]` is unique
// per dispatch round (enforced by `current_system`'s fetch-and-increment),
// and no two buckets ever execute concurrently (enforced by the barrier
// pair), so concurrent access from multiple threads never aliases.
unsafe impl Send for DispatchState {}
unsafe impl Sync for DispatchState {}

fn run_bucket_work_loop(state: &DispatchState, bucket: &Bucket, worker_id: usize) {
    let dt = f64::from_bits(state.dt_bits.load(Ordering::Acquire));
    loop {
        let local_index = state.current_system.fetch_add(1, Ordering::SeqCst);
        if local_index >= bucket.systems().len() {
            break;
        }
        let global_index = bucket.systems()[local_index];
        debug_assert!(global_index < state.systems_len);
        // Safety: `global_index` was claimed uniquely this round (see the
        // `unsafe impl Sync` comment above).
        unsafe {
            let system = &mut *state.systems_ptr.add(global_index);
            system.dispatch(dt, worker_id);
        }
    }
}

/// The engine that orchestrates per-frame bucket traversal on a fixed
/// thread pool.
pub struct Dispatcher {
    systems: Vec<TickedSystem>,
    state: Arc<DispatchState>,
    threads: Vec<JoinHandle<()>>,
    worker_count: usize,
    worlds: AHashMap<String, World>,
    groups: GroupRegistry,
    injected: AHashMap<String, Box<dyn Any + Send + Sync>>,
    singletons: AHashMap<StdTypeId, Box<dyn Any + Send + Sync>>,
    initialized: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        mut systems: Vec<TickedSystem>,
        buckets: Vec<Bucket>,
        worker_count: usize,
        worlds: AHashMap<String, World>,
        groups: GroupRegistry,
        injected: AHashMap<String, Box<dyn Any + Send + Sync>>,
        singletons: AHashMap<StdTypeId, Box<dyn Any + Send + Sync>>,
    ) -> Self {
        let systems_ptr = systems.as_mut_ptr();
        let systems_len = systems.len();
        let state = Arc::new(DispatchState {
            buckets,
            systems_ptr,
            systems_len,
            barrier1: Barrier::new(worker_count),
            barrier2: Barrier::new(worker_count),
            current_bucket: AtomicUsize::new(0),
            current_system: AtomicUsize::new(0),
            dt_bits: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        });

        Dispatcher {
            systems,
            state,
            threads: Vec::new(),
            worker_count,
            worlds,
            groups,
            injected,
            singletons,
            initialized: false,
        }
    }

    /// Number of buckets the planner produced.
    pub fn bucket_count(&self) -> usize {
        self.state.buckets.len()
    }

    fn check_no_leaked_entities(&self) {
        for (name, world) in &self.worlds {
            for e in world.iter_alive() {
                if world.components_count(e) == 0 {
                    error::report(Err::<(), _>(Error::LeakedEntity {
                        world_name: name.clone(),
                        entity: e,
                    }));
                }
            }
        }
    }

    /// Runs `pre_init` then `init` user hooks in submission order, then
    /// starts the worker threads.
    pub fn init(&mut self) {
        assert!(!self.initialized, "Dispatcher::init called twice");

        for i in 0..self.systems.len() {
            self.systems[i].pre_init();
            #[cfg(debug_assertions)]
            self.check_no_leaked_entities();
        }
        for i in 0..self.systems.len() {
            self.systems[i].init();
            #[cfg(debug_assertions)]
            self.check_no_leaked_entities();
        }

        for worker_id in 1..self.worker_count {
            let state = self.state.clone();
            self.threads.push(std::thread::spawn(move || {
                loop {
                    state.barrier1.wait();
                    if state.disposed.load(Ordering::Acquire) {
                        break;
                    }
                    let bucket_index = state.current_bucket.load(Ordering::Acquire);
                    let bucket = &state.buckets[bucket_index];
                    run_bucket_work_loop(&state, bucket, worker_id);
                    state.barrier2.wait();
                }
            }));
        }

        self.initialized = true;
        log::debug!(
            "dispatcher initialized with {} systems across {} buckets, {} worker threads",
            self.systems.len(),
            self.state.buckets.len(),
            self.worker_count - 1
        );
    }

    /// Drains pending group toggles and runs one frame: iterates buckets in
    /// order, releasing workers via `B1`, executing the bucket itself as
    /// worker 0, then waiting for completion at `B2`.
    pub fn run(&mut self, dt: f64) {
        assert!(self.initialized, "Dispatcher::init must run before run()");

        let toggles = self.groups.drain_and_apply();
        for (index, enabled) in toggles {
            self.systems[index].set_enabled(enabled);
        }

        self.state.dt_bits.store(dt.to_bits(), Ordering::Release);

        for bucket_index in 0..self.state.buckets.len() {
            self.state.current_system.store(0, Ordering::SeqCst);
            self.state
                .current_bucket
                .store(bucket_index, Ordering::Release);
            self.state.barrier1.wait();
            let bucket = &self.state.buckets[bucket_index];
            run_bucket_work_loop(&self.state, bucket, 0);
            self.state.barrier2.wait();
        }
    }

    /// Runs `destroy` then `post_destroy` user hooks in reverse submission
    /// order, then shuts down the worker threads.
    pub fn dispose(&mut self) {
        if !self.initialized {
            return;
        }
        for i in (0..self.systems.len()).rev() {
            self.systems[i].destroy();
            #[cfg(debug_assertions)]
            self.check_no_leaked_entities();
        }
        for i in (0..self.systems.len()).rev() {
            self.systems[i].post_destroy();
            #[cfg(debug_assertions)]
            self.check_no_leaked_entities();
        }

        self.state.disposed.store(true, Ordering::Release);
        self.state.barrier1.wait();
        for handle in self.threads.drain(..) {
            handle.join().expect("worker thread panicked");
        }
        self.initialized = false;
        log::debug!("dispatcher disposed");
    }

    /// Enqueues an enable request for group `name`, applied at the start of
    /// the next frame.
    pub fn enable_group_next_frame(&self, name: impl Into<String>) {
        self.groups.enable_next_frame(name);
    }

    /// Enqueues a disable request for group `name`.
    pub fn disable_group_next_frame(&self, name: impl Into<String>) {
        self.groups.disable_next_frame(name);
    }

    /// Enqueues a set-to-`state` request for group `name`.
    pub fn set_group_next_frame(&self, name: impl Into<String>, state: bool) {
        self.groups.set_next_frame(name, state);
    }

    /// Enqueues a toggle (flip current state) request for group `name`.
    pub fn toggle_group_next_frame(&self, name: impl Into<String>) {
        self.groups.toggle_next_frame(name);
    }

    /// The group's current enabled state, or `None` if unknown.
    pub fn get_group_state(&self, name: &str) -> Option<bool> {
        self.groups.get_group_state(name)
    }

    /// The world registered under `name`.
    pub fn get_world(&self, name: &str) -> Option<&World> {
        self.worlds.get(name)
    }

    /// Mutable access to the world registered under `name`.
    pub fn get_world_mut(&mut self, name: &str) -> Option<&mut World> {
        self.worlds.get_mut(name)
    }

    /// The type-keyed singleton value of type `T`, if any.
    pub fn get_singleton<T: 'static>(&self) -> Option<&T> {
        self.singletons
            .get(&StdTypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// The named injected value, if any and of type `T`.
    pub fn get_injected<T: 'static>(&self, identifier: &str) -> Option<&T> {
        self.injected.get(identifier).and_then(|v| v.downcast_ref())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Access, AccessSet, RunSystem};
    use crate::builder::{BuildContext, BuildableSystem, SystemsBuilder};
    use std::sync::atomic::AtomicI32;

    struct Counter {
        shared: Arc<AtomicI32>,
    }
    impl RunSystem for Counter {
        fn declare_access() -> AccessSet {
            AccessSet::new().write(Access::types("default", [1]))
        }
        fn run(&mut self, _dt: f64, _worker_id: usize) {
            self.shared.fetch_add(1, Ordering::SeqCst);
        }
    }
    impl BuildableSystem for Counter {
        fn new(ctx: &BuildContext) -> Self {
            Counter {
                shared: ctx.singleton::<Arc<AtomicI32>>().unwrap().clone(),
            }
        }
    }

    #[test]
    fn run_invokes_every_system_once_per_bucket_pass() {
        let shared = Arc::new(AtomicI32::new(0));
        let mut builder = SystemsBuilder::new();
        builder.inject_singleton(shared.clone());
        builder.add::<Counter>();
        let mut dispatcher = builder.finish(2);
        dispatcher.init();
        dispatcher.run(0.016);
        dispatcher.run(0.016);
        assert_eq!(shared.load(Ordering::SeqCst), 2);
        dispatcher.dispose();
    }

    #[test]
    fn group_disable_takes_effect_next_frame() {
        let shared = Arc::new(AtomicI32::new(0));
        let mut builder = SystemsBuilder::new();
        builder.inject_singleton(shared.clone());
        builder.set_group("g", true);
        builder.add::<Counter>();
        let mut dispatcher = builder.finish(1);
        dispatcher.init();

        dispatcher.run(0.016);
        assert_eq!(shared.load(Ordering::SeqCst), 1);

        dispatcher.disable_group_next_frame("g");
        dispatcher.run(0.016); // drained at the top of this call: disabled before the bucket runs
        assert_eq!(shared.load(Ordering::SeqCst), 1);

        dispatcher.run(0.016); // still disabled, no new toggle queued
        assert_eq!(shared.load(Ordering::SeqCst), 1);

        dispatcher.dispose();
    }
}
