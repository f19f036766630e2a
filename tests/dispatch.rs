use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use stratum_ecs::access::{Access, AccessSet, RunSystem};
use stratum_ecs::builder::{BuildContext, BuildableSystem, SystemsBuilder};
use stratum_ecs::tick::TickMode;

struct Spawner {
    shared: Arc<AtomicI32>,
}
impl RunSystem for Spawner {
    fn declare_access() -> AccessSet {
        AccessSet::new().write(Access::types("default", [1]))
    }
    fn run(&mut self, _dt: f64, _worker_id: usize) {
        self.shared.fetch_add(1, Ordering::SeqCst);
    }
}
impl BuildableSystem for Spawner {
    fn new(ctx: &BuildContext) -> Self {
        Spawner {
            shared: ctx.singleton::<Arc<AtomicI32>>().unwrap().clone(),
        }
    }
}

struct Mover {
    shared: Arc<AtomicI32>,
}
impl RunSystem for Mover {
    fn declare_access() -> AccessSet {
        AccessSet::new()
            .read(Access::types("default", [1]))
            .write(Access::types("default", [2]))
    }
    fn run(&mut self, _dt: f64, _worker_id: usize) {
        self.shared.fetch_add(10, Ordering::SeqCst);
    }
}
impl BuildableSystem for Mover {
    fn new(ctx: &BuildContext) -> Self {
        Mover {
            shared: ctx.singleton::<Arc<AtomicI32>>().unwrap().clone(),
        }
    }
}

#[test]
fn two_dependent_systems_run_across_buckets_every_frame() {
    let shared = Arc::new(AtomicI32::new(0));
    let mut builder = SystemsBuilder::new();
    builder.inject_singleton(shared.clone());
    builder.add::<Spawner>();
    builder.add::<Mover>();

    let mut dispatcher = builder.finish(3);
    assert_eq!(dispatcher.bucket_count(), 2);

    dispatcher.init();
    dispatcher.run(0.016);
    dispatcher.run(0.016);
    assert_eq!(shared.load(Ordering::SeqCst), 22);
    dispatcher.dispose();
}

#[test]
fn fixed_tick_system_runs_a_variable_number_of_times_per_frame() {
    struct FixedTicker {
        calls: Arc<AtomicUsize>,
    }
    impl RunSystem for FixedTicker {
        fn declare_access() -> AccessSet {
            AccessSet::new()
        }
        fn run(&mut self, _dt: f64, _worker_id: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }
    impl BuildableSystem for FixedTicker {
        fn new(ctx: &BuildContext) -> Self {
            FixedTicker {
                calls: ctx.singleton::<Arc<AtomicUsize>>().unwrap().clone(),
            }
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let mut builder = SystemsBuilder::new();
    builder.inject_singleton(calls.clone());
    builder.set_tick_mode(TickMode::Fixed);
    builder.set_tick_delay(0.01);
    builder.add::<FixedTicker>();

    let mut dispatcher = builder.finish(1);
    dispatcher.init();
    dispatcher.run(0.025); // two ticks, 0.005 residue
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    dispatcher.run(0.005); // residue + this frame reaches 0.01: one more tick
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    dispatcher.dispose();
}

#[test]
fn group_disable_takes_effect_on_the_frame_after_the_request() {
    let shared = Arc::new(AtomicI32::new(0));
    let mut builder = SystemsBuilder::new();
    builder.inject_singleton(shared.clone());
    builder.set_group("spawning", true);
    builder.add::<Spawner>();
    builder.clear_group();

    let mut dispatcher = builder.finish(2);
    dispatcher.init();

    dispatcher.run(0.016);
    assert_eq!(shared.load(Ordering::SeqCst), 1);

    dispatcher.disable_group_next_frame("spawning");
    dispatcher.run(0.016); // drained at the top of this call, before the bucket runs
    assert_eq!(shared.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.get_group_state("spawning"), Some(false));

    dispatcher.run(0.016); // group stays disabled
    assert_eq!(shared.load(Ordering::SeqCst), 1);

    dispatcher.enable_group_next_frame("spawning");
    dispatcher.run(0.016);
    assert_eq!(shared.load(Ordering::SeqCst), 2);
    dispatcher.dispose();
}

#[test]
fn init_runs_pre_init_in_order_and_dispose_runs_destroy_in_reverse() {
    type Log = Arc<std::sync::Mutex<Vec<&'static str>>>;

    struct First {
        order: Log,
    }
    impl RunSystem for First {
        fn declare_access() -> AccessSet {
            AccessSet::new()
        }
        fn run(&mut self, _dt: f64, _worker_id: usize) {}
        fn pre_init(&mut self) {
            self.order.lock().unwrap().push("first");
        }
        fn destroy(&mut self) {
            self.order.lock().unwrap().push("first");
        }
    }
    impl BuildableSystem for First {
        fn new(ctx: &BuildContext) -> Self {
            First {
                order: ctx.injected::<Log>("order").unwrap().clone(),
            }
        }
    }

    struct Second {
        order: Log,
    }
    impl RunSystem for Second {
        fn declare_access() -> AccessSet {
            AccessSet::new()
        }
        fn run(&mut self, _dt: f64, _worker_id: usize) {}
        fn pre_init(&mut self) {
            self.order.lock().unwrap().push("second");
        }
        fn destroy(&mut self) {
            self.order.lock().unwrap().push("second");
        }
    }
    impl BuildableSystem for Second {
        fn new(ctx: &BuildContext) -> Self {
            Second {
                order: ctx.injected::<Log>("order").unwrap().clone(),
            }
        }
    }

    let order: Log = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut builder = SystemsBuilder::new();
    builder.inject("order", order.clone());
    builder.add::<First>();
    builder.add::<Second>();

    let mut dispatcher = builder.finish(1);
    dispatcher.init();
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);

    dispatcher.dispose();
    assert_eq!(
        *order.lock().unwrap(),
        vec!["first", "second", "second", "first"]
    );
}
