//! Ticked System Wrapper & Tick Modes: wraps a run-system with an
//! accumulator, tick mode, tick delay, and an enabled flag.

use crate::access::RunSystem;

/// Policy governing how frame `dt` feeds a system's accumulator and how
/// many invocations per frame occur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickMode {
    /// Ignore the accumulator; invoke once with the raw frame `dt`.
    Loose,
    /// Accumulate `dt`; invoke once with the whole accumulator when it
    /// reaches `delay`, then reset it to zero.
    SemiLoose,
    /// Accumulate; invoke repeatedly with `min(delay, accumulator)`,
    /// subtracting each invocation's amount, until the remainder is below
    /// `delay`.
    SemiFixed,
    /// Accumulate; invoke repeatedly with exactly `delay`, subtracting it,
    /// until the remainder is below `delay`.
    Fixed,
}

/// A small epsilon bounding a `Fixed`-mode system's accumulator residue
/// when its delay is zero, so the loop below always terminates.
const EPSILON: f64 = 1e-9;

/// Wraps a [`RunSystem`] with the bookkeeping needed to drive it through a
/// frame: tick mode, delay, accumulator, and enabled flag.
pub struct TickedSystem {
    system: Box<dyn RunSystem>,
    tick_mode: TickMode,
    tick_delay: f64,
    accumulator: f64,
    enabled: bool,
}

impl TickedSystem {
    pub(crate) fn new(system: Box<dyn RunSystem>, tick_mode: TickMode, tick_delay: f64) -> Self {
        TickedSystem {
            system,
            tick_mode,
            tick_delay: tick_delay.max(0.0),
            accumulator: 0.0,
            enabled: true,
        }
    }

    /// `true` iff this system currently runs on dispatch.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the enabled flag. While disabled the accumulator does not
    /// advance and no invocation happens.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current accumulator value, for diagnostics/tests.
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Drives this system through one frame of elapsed time `dt`, applying
    /// its tick mode. `worker_id` is forwarded unchanged to every
    /// invocation of the wrapped system's `run`.
    pub fn dispatch(&mut self, dt: f64, worker_id: usize) {
        if !self.enabled {
            return;
        }

        match self.tick_mode {
            TickMode::Loose => {
                self.system.run(dt, worker_id);
            }
            TickMode::SemiLoose => {
                self.accumulator += dt;
                if self.accumulator >= self.tick_delay {
                    let elapsed = self.accumulator;
                    self.accumulator = 0.0;
                    self.system.run(elapsed, worker_id);
                }
            }
            TickMode::SemiFixed => {
                self.accumulator += dt;
                while self.accumulator >= self.tick_delay {
                    let elapsed = self.tick_delay.min(self.accumulator);
                    self.accumulator -= elapsed;
                    self.system.run(elapsed, worker_id);
                    if self.tick_delay <= EPSILON {
                        break;
                    }
                }
            }
            TickMode::Fixed => {
                self.accumulator += dt;
                while self.accumulator >= self.tick_delay {
                    self.accumulator -= self.tick_delay;
                    self.system.run(self.tick_delay, worker_id);
                    if self.tick_delay <= EPSILON {
                        break;
                    }
                }
            }
        }
    }

    /// Runs `pre_init` on the wrapped system.
    pub(crate) fn pre_init(&mut self) {
        self.system.pre_init();
    }
    /// Runs `init` on the wrapped system.
    pub(crate) fn init(&mut self) {
        self.system.init();
    }
    /// Runs `destroy` on the wrapped system.
    pub(crate) fn destroy(&mut self) {
        self.system.destroy();
    }
    /// Runs `post_destroy` on the wrapped system.
    pub(crate) fn post_destroy(&mut self) {
        self.system.post_destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recorder {
        calls: Arc<AtomicUsize>,
        elapsed_sum_micros: Arc<AtomicUsize>,
    }

    impl RunSystem for Recorder {
        fn declare_access() -> crate::access::AccessSet {
            crate::access::AccessSet::new()
        }
        fn run(&mut self, dt: f64, _worker_id: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.elapsed_sum_micros
                .fetch_add((dt * 1_000_000.0) as usize, Ordering::SeqCst);
        }
    }

    #[test]
    fn loose_invokes_every_frame_with_raw_dt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicUsize::new(0));
        let mut ticked = TickedSystem::new(
            Box::new(Recorder {
                calls: calls.clone(),
                elapsed_sum_micros: sum.clone(),
            }),
            TickMode::Loose,
            0.0,
        );
        ticked.dispatch(0.016, 0);
        ticked.dispatch(0.016, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fixed_tick_splits_a_large_dt_into_fixed_steps_and_carries_the_residue() {
        // delay=0.01, dt=0.025 -> 2 invocations of 0.01, residue 0.005 carries.
        let calls = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicUsize::new(0));
        let mut ticked = TickedSystem::new(
            Box::new(Recorder {
                calls: calls.clone(),
                elapsed_sum_micros: sum.clone(),
            }),
            TickMode::Fixed,
            0.01,
        );
        ticked.dispatch(0.025, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!((ticked.accumulator() - 0.005).abs() < 1e-9);
    }

    #[test]
    fn semi_fixed_carries_leftover_below_delay() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicUsize::new(0));
        let mut ticked = TickedSystem::new(
            Box::new(Recorder {
                calls: calls.clone(),
                elapsed_sum_micros: sum.clone(),
            }),
            TickMode::SemiFixed,
            0.01,
        );
        ticked.dispatch(0.025, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(ticked.accumulator() < 0.01);
    }

    #[test]
    fn semi_loose_resets_to_zero_on_fire() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicUsize::new(0));
        let mut ticked = TickedSystem::new(
            Box::new(Recorder {
                calls: calls.clone(),
                elapsed_sum_micros: sum.clone(),
            }),
            TickMode::SemiLoose,
            0.01,
        );
        ticked.dispatch(0.025, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ticked.accumulator(), 0.0);
    }

    #[test]
    fn disabled_system_never_advances_or_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicUsize::new(0));
        let mut ticked = TickedSystem::new(
            Box::new(Recorder {
                calls: calls.clone(),
                elapsed_sum_micros: sum.clone(),
            }),
            TickMode::Fixed,
            0.01,
        );
        ticked.set_enabled(false);
        ticked.dispatch(1.0, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ticked.accumulator(), 0.0);
    }
}
