//! Access Declarations: per-system metadata naming the (world,
//! component-types) a system reads and writes.
//!
//! Declarations are a plain trait a system type implements, producing its
//! R/W sets from a static, side-effect-free function — this replaces
//! reflective attribute scanning and keeps the crate free of a derive-macro
//! dependency.

use crate::mask::TypeId;

/// A single read or write declaration: a world name plus the component
/// types touched in that world. An empty `types` list means "whole world"
/// (the wildcard).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Access {
    world: String,
    types: Vec<TypeId>,
}

impl Access {
    /// Declares access to specific component types in `world`.
    pub fn types(world: impl Into<String>, types: impl IntoIterator<Item = TypeId>) -> Self {
        Access {
            world: world.into(),
            types: types.into_iter().collect(),
        }
    }

    /// Declares whole-world (wildcard) access.
    pub fn whole_world(world: impl Into<String>) -> Self {
        Access {
            world: world.into(),
            types: Vec::new(),
        }
    }

    /// The world this declaration applies to.
    pub fn world(&self) -> &str {
        &self.world
    }

    /// `true` iff this declaration is whole-world (spec: empty explicit set
    /// is treated identically to an explicit wildcard).
    pub fn is_wildcard(&self) -> bool {
        self.types.is_empty()
    }

    /// The declared component types; meaningless (ignore) when
    /// [`Access::is_wildcard`] is `true`.
    pub fn declared_types(&self) -> &[TypeId] {
        &self.types
    }
}

/// The full set of read and write declarations a system carries. A system
/// may declare multiple reads and multiple writes, including several per
/// world.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessSet {
    reads: Vec<Access>,
    writes: Vec<Access>,
}

impl AccessSet {
    /// Creates an empty access set (a system that touches nothing
    /// schedulable is always safe to co-locate, per the fitness check).
    pub fn new() -> Self {
        AccessSet::default()
    }

    /// Adds a read declaration.
    pub fn read(mut self, access: Access) -> Self {
        self.reads.push(access);
        self
    }

    /// Adds a write declaration.
    pub fn write(mut self, access: Access) -> Self {
        self.writes.push(access);
        self
    }

    /// All read declarations.
    pub fn reads(&self) -> &[Access] {
        &self.reads
    }

    /// All write declarations.
    pub fn writes(&self) -> &[Access] {
        &self.writes
    }
}

/// The trait a run-system implements to expose its static access
/// declarations and frame behavior.
///
/// `declare_access` must be pure and side-effect free: the planner calls it
/// once per system at `finish(N)` time, before any system is constructed.
pub trait RunSystem: Send + 'static {
    /// Produces this system type's read/write declarations.
    fn declare_access() -> AccessSet
    where
        Self: Sized;

    /// Invoked once per dispatch with the elapsed time computed by this
    /// system's tick mode, and the id of the worker thread that claimed it.
    fn run(&mut self, dt: f64, worker_id: usize);

    /// Runs once, in submission order, before `init`.
    fn pre_init(&mut self) {}
    /// Runs once, in submission order, after `pre_init`.
    fn init(&mut self) {}
    /// Runs once, in reverse submission order, at dispose.
    fn destroy(&mut self) {}
    /// Runs once, in reverse submission order, after `destroy`.
    fn post_destroy(&mut self) {}
}
