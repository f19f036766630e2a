#![deny(missing_docs)]

//! # stratum-ecs
//!
//! A lightweight, in-process Entity-Component-System runtime: sparse-set
//! component pools with incrementally maintained filters, and a static
//! conflict-graph scheduler that partitions systems into ordered,
//! internally parallel buckets dispatched across a fixed thread pool.
//!
//! Start with [`builder::SystemsBuilder`] to register worlds and systems,
//! call `finish` to obtain a [`dispatcher::Dispatcher`], then drive it with
//! `init`/`run`/`dispose`. See the [`prelude`] module for the common
//! imports.

pub mod access;
pub mod builder;
pub mod bucket;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod filter;
pub mod group;
#[cfg(feature = "events")]
pub mod listener;
pub mod mask;
pub mod pool;
pub mod prelude;
pub mod tick;
pub mod world;
