//! Economy and session core for Homestead.
//!
//! This crate contains all game rules that are independent of the database
//! they run against. Operations take a [`store::Store`] handle and run inside
//! its unit of work, so the same code drives the SpacetimeDB module, the
//! headless simtest and the unit tests (against [`memory::MemoryStore`]).
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Bundled resources, items, building costs and maps; seeding |
//! | [`config`] | Engine tuning knobs loaded from JSON |
//! | [`constants`] | Job topics, object kinds, tiers, time units |
//! | [`dispatch`] | Polled deferred-job dispatcher with retry and dead-lettering |
//! | [`economy`] | Transfers, crafting, discarding, building a base |
//! | [`error`] | Error taxonomy shared by every operation |
//! | [`farm`] | Farm session state machine and stepped yield |
//! | [`ledger`] | Stack-aware quantity adjustment and conserving moves |
//! | [`memory`] | In-memory store with rollback, fault injection and snapshots |
//! | [`model`] | Plain data records (players, entries, sessions, jobs) |
//! | [`notify`] | Best-effort player notifications |
//! | [`placement`] | Bounding-box collision checks on the map grid |
//! | [`player`] | Joining, travel, status overview |
//! | [`regen`] | Regeneration of resting players |
//! | [`store`] | Relational store contract |

pub mod catalog;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod economy;
pub mod error;
pub mod farm;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod notify;
pub mod placement;
pub mod player;
pub mod regen;
pub mod store;
