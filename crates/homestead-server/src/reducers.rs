//! Client-facing reducers and the scheduled background work.
//!
//! Every reducer resolves the caller's player from `ctx.sender` and the map
//! id it passes, then runs one `homestead_logic` operation against a
//! [`DbStore`]. A rejected operation returns `Err`, which rolls back the
//! reducer's transaction.

use std::time::Duration;

use homestead_logic::catalog::{self, Catalog};
use homestead_logic::config::EngineConfig;
use homestead_logic::constants::{topics, Micros};
use homestead_logic::dispatch::Dispatcher;
use homestead_logic::economy::{self, ItemLocation, TransferDirection};
use homestead_logic::error::{EngineError, EngineResult};
use homestead_logic::farm::{self, FarmRequest};
use homestead_logic::model::Player;
use homestead_logic::player;
use homestead_logic::regen;
use homestead_logic::store::Store;
use spacetimedb::{reducer, ReducerContext, ScheduleAt, Table, TimeDuration};

use crate::notifier::TableNotifier;
use crate::store::{to_micros, DbStore};
use crate::tables::*;

// ============================================================================
// HELPERS
// ============================================================================

fn engine_config(ctx: &ReducerContext) -> EngineConfig {
    ctx.db
        .game_config()
        .id()
        .find(0)
        .map(|c| c.to_engine())
        .unwrap_or_default()
}

fn now_micros(ctx: &ReducerContext) -> Micros {
    to_micros(ctx.timestamp)
}

fn caller_id(ctx: &ReducerContext) -> String {
    ctx.sender.to_hex().to_string()
}

/// The caller's player on `map_id`.
fn caller(store: &DbStore, ctx: &ReducerContext, map_id: u64) -> EngineResult<Player> {
    store
        .player_by_external(&caller_id(ctx), map_id)?
        .ok_or_else(|| EngineError::not_found(format!("your player on map #{}", map_id)))
}

fn reject(op: &str, err: EngineError) -> String {
    log::warn!("{} rejected ({:?}): {}", op, err.kind(), err);
    err.to_string()
}

fn interval(duration: Duration) -> ScheduleAt {
    ScheduleAt::Interval(TimeDuration::from_micros(duration.as_micros() as i64))
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Seed the catalog and start the background schedules
#[reducer(init)]
pub fn init(ctx: &ReducerContext) -> Result<(), String> {
    let config = EngineConfig::default();
    ctx.db.game_config().insert(GameConfig::from_engine(&config));

    let catalog = Catalog::bundled().map_err(|e| reject("init", e))?;
    let ids = catalog::seed(&mut DbStore::new(ctx), &catalog).map_err(|e| reject("init", e))?;
    log::info!(
        "Seeded {} resources, {} items, {} maps",
        catalog.resources.len(),
        catalog.items.len(),
        catalog.maps.len()
    );
    log::debug!("Seed ids: {:?}", ids);

    ctx.db.dispatch_schedule().insert(DispatchSchedule {
        scheduled_id: 0,
        scheduled_at: interval(Duration::from_millis(config.dispatch_interval_millis)),
    });
    ctx.db.regen_schedule().insert(RegenSchedule {
        scheduled_id: 0,
        scheduled_at: interval(Duration::from_secs(config.regen_interval_secs)),
    });
    Ok(())
}

#[reducer(client_connected)]
pub fn client_connected(ctx: &ReducerContext) {
    log::info!("Client connected: {:?}", ctx.sender);
}

// ============================================================================
// PLAYER REDUCERS
// ============================================================================

/// Create the caller's player on `map_id`
#[reducer]
pub fn player_join(ctx: &ReducerContext, map_id: u64, name: String) -> Result<(), String> {
    let config = engine_config(ctx);
    let mut store = DbStore::new(ctx);
    player::join(&mut store, &config, &caller_id(ctx), name.trim(), map_id)
        .map(|_| ())
        .map_err(|e| reject("player_join", e))
}

#[reducer]
pub fn player_travel(ctx: &ReducerContext, map_id: u64, map_object_id: u64) -> Result<(), String> {
    let mut store = DbStore::new(ctx);
    let run = |store: &mut DbStore| {
        let me = caller(store, ctx, map_id)?;
        player::travel(store, me.id, map_object_id)
    };
    run(&mut store).map(|_| ()).map_err(|e| reject("player_travel", e))
}

// ============================================================================
// FARMING REDUCERS
// ============================================================================

/// Farm the zone the caller stands on for `minutes`
#[reducer]
pub fn start_farming(ctx: &ReducerContext, map_id: u64, minutes: u32) -> Result<(), String> {
    let config = engine_config(ctx);
    let now = now_micros(ctx);
    let mut store = DbStore::new(ctx);
    let run = |store: &mut DbStore| {
        let me = caller(store, ctx, map_id)?;
        farm::start_farming(store, me.id, FarmRequest::for_minutes(&config, minutes), now)
    };
    let ticket = run(&mut store).map_err(|e| reject("start_farming", e))?;
    log::info!(
        "Session #{} booked for {}s (job #{})",
        ticket.session.id,
        ticket.total_seconds,
        ticket.job_id
    );
    Ok(())
}

/// Cash out the caller's running session early
#[reducer]
pub fn stop_farming(ctx: &ReducerContext, map_id: u64) -> Result<(), String> {
    let now = now_micros(ctx);
    let mut store = DbStore::new(ctx);
    let run = |store: &mut DbStore| {
        let me = caller(store, ctx, map_id)?;
        farm::stop_farming(store, me.id, now)
    };
    run(&mut store).map(|_| ()).map_err(|e| reject("stop_farming", e))
}

// ============================================================================
// ECONOMY REDUCERS
// ============================================================================

/// `direction`: 0 = inventory to storage, 1 = storage to inventory
#[reducer]
pub fn transfer_resource(
    ctx: &ReducerContext,
    map_id: u64,
    resource_id: u64,
    count: u32,
    direction: u8,
) -> Result<(), String> {
    let mut store = DbStore::new(ctx);
    let run = |store: &mut DbStore| {
        let direction = parse_direction(direction)?;
        let me = caller(store, ctx, map_id)?;
        economy::transfer_resource(store, me.id, resource_id, count, direction)
    };
    run(&mut store).map_err(|e| reject("transfer_resource", e))
}

#[reducer]
pub fn transfer_item(
    ctx: &ReducerContext,
    map_id: u64,
    entry_id: u64,
    count: u32,
    direction: u8,
) -> Result<(), String> {
    let mut store = DbStore::new(ctx);
    let run = |store: &mut DbStore| {
        let direction = parse_direction(direction)?;
        let me = caller(store, ctx, map_id)?;
        economy::transfer_item(store, me.id, entry_id, count, direction)
    };
    run(&mut store).map(|_| ()).map_err(|e| reject("transfer_item", e))
}

#[reducer]
pub fn craft_item(ctx: &ReducerContext, map_id: u64, item_id: u64) -> Result<(), String> {
    let mut store = DbStore::new(ctx);
    let run = |store: &mut DbStore| {
        let me = caller(store, ctx, map_id)?;
        economy::craft_item(store, me.id, item_id)
    };
    run(&mut store).map_err(|e| reject("craft_item", e))
}

/// `location`: 0 = inventory, 1 = storage
#[reducer]
pub fn discard_entry(
    ctx: &ReducerContext,
    map_id: u64,
    location: u8,
    entry_id: u64,
    count: u32,
) -> Result<(), String> {
    let mut store = DbStore::new(ctx);
    let run = |store: &mut DbStore| {
        let location = ItemLocation::from_u8(location)
            .ok_or_else(|| EngineError::precondition(format!("unknown location {}", location)))?;
        let me = caller(store, ctx, map_id)?;
        economy::discard_entry(store, me.id, location, entry_id, count)
    };
    run(&mut store).map_err(|e| reject("discard_entry", e))
}

/// Found the caller's base with its corner at `(x, y)`
#[reducer]
pub fn build_base(ctx: &ReducerContext, map_id: u64, x: u32, y: u32) -> Result<(), String> {
    let config = engine_config(ctx);
    let mut store = DbStore::new(ctx);
    let run = |store: &mut DbStore| {
        let me = caller(store, ctx, map_id)?;
        economy::build_base(store, &config, me.id, x, y)
    };
    run(&mut store).map(|_| ()).map_err(|e| reject("build_base", e))
}

fn parse_direction(code: u8) -> EngineResult<TransferDirection> {
    TransferDirection::from_u8(code)
        .ok_or_else(|| EngineError::precondition(format!("unknown transfer direction {}", code)))
}

// ============================================================================
// SCHEDULED REDUCERS
// ============================================================================

/// Claim due deferred jobs and schedule one delivery per job
#[reducer]
pub fn dispatch_due_jobs(ctx: &ReducerContext, _schedule: DispatchSchedule) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        return Err("dispatch_due_jobs may only be called by the scheduler".to_string());
    }
    let config = engine_config(ctx);
    let mut notifier = TableNotifier::new(ctx);
    let mut store = DbStore::new(ctx);

    let mut dispatcher = Dispatcher::new(&config);
    dispatcher.subscribe(topics::FARM_COMPLETE, farm::completion_handler(&mut notifier));
    let claim = dispatcher
        .claim_due(&mut store, now_micros(ctx))
        .map_err(|e| reject("dispatch_due_jobs", e))?;
    for job in &claim.jobs {
        ctx.db.job_delivery().insert(JobDelivery {
            scheduled_id: 0,
            scheduled_at: ScheduleAt::Time(ctx.timestamp),
            job_id: job.id,
        });
    }
    if !claim.jobs.is_empty() || claim.dead_lettered > 0 {
        log::debug!(
            "Dispatch: {} claimed, {} dead-lettered",
            claim.jobs.len(),
            claim.dead_lettered
        );
    }
    Ok(())
}

/// Deliver one claimed job. A fault rolls back only this delivery; the
/// claim keeps the attempt count and the job returns after the backoff.
#[reducer]
pub fn deliver_job(ctx: &ReducerContext, delivery: JobDelivery) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        return Err("deliver_job may only be called by the scheduler".to_string());
    }
    let config = engine_config(ctx);
    let mut notifier = TableNotifier::new(ctx);
    let mut store = DbStore::new(ctx);

    let Some(job) = store.job(delivery.job_id).map_err(|e| reject("deliver_job", e))? else {
        log::debug!("Job #{} already gone", delivery.job_id);
        return Ok(());
    };
    let mut dispatcher = Dispatcher::new(&config);
    dispatcher.subscribe(topics::FARM_COMPLETE, farm::completion_handler(&mut notifier));
    let outcome = dispatcher
        .deliver(&mut store, &job, now_micros(ctx))
        .map_err(|e| reject("deliver_job", e))?;
    log::debug!("Job #{}: {:?}", job.id, outcome);
    Ok(())
}

/// Restore health and energy of players resting at their base
#[reducer]
pub fn regenerate_players(ctx: &ReducerContext, _schedule: RegenSchedule) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        return Err("regenerate_players may only be called by the scheduler".to_string());
    }
    let rule = engine_config(ctx).regen_rule();
    regen::regenerate_players(&mut DbStore::new(ctx), rule)
        .map(|_| ())
        .map_err(|e| reject("regenerate_players", e))
}
