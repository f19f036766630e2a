//! Group Registry: named sets of ticked systems whose enabled flag is
//! toggled atomically between frames.

use ahash::AHashMap;
use crossbeam_queue::SegQueue;

use crate::error::{self, Error};

/// A single pending toggle request, enqueued during frame `i` and applied
/// before frame `i+1` begins.
#[derive(Clone, Debug)]
enum ToggleOp {
    Enable(String),
    Disable(String),
    Set(String, bool),
    ToggleNext(String),
}

/// A named bag of ticked systems whose enabled bit is flipped collectively
/// between frames.
#[derive(Debug)]
struct Group {
    enabled: bool,
    members: Vec<usize>,
}

/// Tracks named groups and their member system indices, and the
/// multi-producer/single-consumer queue of pending toggle requests.
///
/// The queue may be pushed to from any worker thread during a frame; it is
/// drained single-consumer by the dispatcher's host thread before the next
/// frame's dispatch begins.
pub struct GroupRegistry {
    groups: AHashMap<String, Group>,
    pending: SegQueue<ToggleOp>,
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupRegistry {
    /// Creates an empty group registry.
    pub fn new() -> Self {
        GroupRegistry {
            groups: AHashMap::new(),
            pending: SegQueue::new(),
        }
    }

    /// Creates the named group if absent, with `default_state` as its
    /// initial enabled flag; returns `true` if it already existed.
    pub(crate) fn ensure_group(&mut self, name: &str, default_state: bool) -> bool {
        if self.groups.contains_key(name) {
            return true;
        }
        self.groups.insert(
            name.to_string(),
            Group {
                enabled: default_state,
                members: Vec::new(),
            },
        );
        false
    }

    /// Adds a system index to the named group's member list.
    pub(crate) fn add_member(&mut self, name: &str, system_index: usize) {
        if let Some(group) = self.groups.get_mut(name) {
            group.members.push(system_index);
        }
    }

    /// The group's current enabled state, or `None` if unknown.
    pub fn get_group_state(&self, name: &str) -> Option<bool> {
        self.groups.get(name).map(|g| g.enabled)
    }

    /// Enqueues an enable request for `name`, applied at the start of the
    /// next frame. Safe to call from any worker thread.
    pub fn enable_next_frame(&self, name: impl Into<String>) {
        self.pending.push(ToggleOp::Enable(name.into()));
    }

    /// Enqueues a disable request for `name`.
    pub fn disable_next_frame(&self, name: impl Into<String>) {
        self.pending.push(ToggleOp::Disable(name.into()));
    }

    /// Enqueues a set-to-`state` request for `name`.
    pub fn set_next_frame(&self, name: impl Into<String>, state: bool) {
        self.pending.push(ToggleOp::Set(name.into(), state));
    }

    /// Enqueues a toggle (flip current state) request for `name`.
    pub fn toggle_next_frame(&self, name: impl Into<String>) {
        self.pending.push(ToggleOp::ToggleNext(name.into()));
    }

    /// Drains the pending queue and applies every toggle, returning the
    /// list of (system_index, new_enabled) pairs every member should have
    /// propagated to its [`crate::tick::TickedSystem`] flag.
    ///
    /// Applying to an unknown group is fatal in debug, silently ignored in
    /// release.
    pub(crate) fn drain_and_apply(&mut self) -> Vec<(usize, bool)> {
        let mut changes = Vec::new();
        while let Some(op) = self.pending.pop() {
            let (name, new_state) = match op {
                ToggleOp::Enable(name) => (name, true),
                ToggleOp::Disable(name) => (name, false),
                ToggleOp::Set(name, state) => (name, state),
                ToggleOp::ToggleNext(name) => {
                    let current = self.groups.get(&name).map(|g| g.enabled);
                    match current {
                        Some(state) => (name, !state),
                        None => {
                            #[cfg(debug_assertions)]
                            error::report(Err::<(), _>(Error::UnknownGroup { name }));
                            continue;
                        }
                    }
                }
            };

            match self.groups.get_mut(&name) {
                Some(group) => {
                    group.enabled = new_state;
                    for &member in &group.members {
                        changes.push((member, new_state));
                    }
                    log::debug!("group \"{name}\" set to enabled={new_state}");
                }
                None => {
                    #[cfg(debug_assertions)]
                    error::report(Err::<(), _>(Error::UnknownGroup { name }));
                }
            }
        }
        changes
    }
}
