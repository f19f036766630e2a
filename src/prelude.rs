//! Convenience re-exports: `use stratum_ecs::prelude::*;` pulls in the
//! types most call sites need.

pub use crate::access::{Access, AccessSet, RunSystem};
pub use crate::builder::{BuildContext, BuildableSystem, SystemsBuilder};
pub use crate::dispatcher::Dispatcher;
pub use crate::entity::Entity;
pub use crate::error::{Error, Result};
pub use crate::pool::Component;
pub use crate::tick::TickMode;
pub use crate::world::{FilterId, World};

#[cfg(feature = "events")]
pub use crate::listener::WorldListener;
