//! Homestead Server - SpacetimeDB Module
//!
//! Thin adapter over `homestead_logic`: tables hold the state, reducers run
//! the engine operations against them, and two scheduled reducers drive the
//! deferred-job dispatcher and player regeneration.

mod notifier;
mod reducers;
mod store;
mod tables;

pub use reducers::*;
pub use tables::*;
