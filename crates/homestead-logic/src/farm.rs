//! Farm sessions — timed gathering on a farmable map object.
//!
//! Lifecycle: `start_farming` books a session and enqueues a completion job
//! due at the session's end; the dispatcher later delivers that job to
//! `complete_farming`. `stop_farming` cashes out early. Completion can be
//! delivered more than once and can race with `stop`, so it is guarded by the
//! session's completed status and grants at most once.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::constants::{topics, Micros, MICROS_PER_MINUTE};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{adjust, resource_limit, Direction, Inventory};
use crate::model::{DeferredJob, FarmSession, Player, PlayerStatus, SessionStatus, StackKey};
use crate::notify::{notify_best_effort, Notifier};
use crate::store::Store;

/// Units gained per minute before the multiplier.
pub const BASE_GAIN: u32 = 1;

/// Minutes between multiplier steps.
pub const MULTIPLIER_STEP_MINUTES: u32 = 5;

// ── Yield ───────────────────────────────────────────────────────────────

/// Gain contributed by each minute of a run of `total_minutes`.
///
/// The multiplier starts at 1 and steps up on every minute index divisible
/// by five (including minute 0), so a 5-minute run yields `[2, 2, 2, 2, 2]`.
pub fn yield_per_minute(total_minutes: u32) -> Vec<u32> {
    let mut multiplier: u32 = 1;
    (0..total_minutes)
        .map(|minute| {
            if minute % MULTIPLIER_STEP_MINUTES == 0 {
                multiplier = multiplier.saturating_add(1);
            }
            BASE_GAIN.saturating_mul(multiplier)
        })
        .collect()
}

/// Total yield of a run of `total_minutes`.
pub fn farm_yield(total_minutes: u32) -> u32 {
    let mut multiplier: u32 = 1;
    let mut total: u32 = 0;
    for minute in 0..total_minutes {
        if minute % MULTIPLIER_STEP_MINUTES == 0 {
            multiplier = multiplier.saturating_add(1);
        }
        total = total.saturating_add(BASE_GAIN.saturating_mul(multiplier));
    }
    total
}

// ── Start ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarmRequest {
    pub duration_minutes: u32,
    pub energy_cost: u32,
}

impl FarmRequest {
    /// Energy cost derived from the configured per-minute rate.
    pub fn for_minutes(config: &EngineConfig, duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            energy_cost: config.farm_energy_cost(duration_minutes),
        }
    }
}

/// Body of a `farm.complete` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmCompletionPayload {
    pub session_id: u64,
    pub total_minutes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FarmTicket {
    pub session: FarmSession,
    pub job_id: u64,
    pub total_seconds: u64,
    pub seconds_passed: u64,
}

pub fn start_farming<S: Store>(
    store: &mut S,
    player_id: u64,
    request: FarmRequest,
    now: Micros,
) -> EngineResult<FarmTicket> {
    store.unit_of_work(|s| {
        let mut player = s.require_player(player_id)?;
        if !player.status.is_idle() {
            return Err(EngineError::precondition(format!(
                "player is busy ({})",
                player.status.label()
            )));
        }
        if request.duration_minutes == 0 {
            return Err(EngineError::precondition("farming takes at least one minute"));
        }

        let object = match player.map_object_id {
            Some(id) => s.map_object(id)?,
            None => None,
        }
        .ok_or_else(|| EngineError::precondition("player is not at a map object"))?;
        if !object.is_farmable {
            return Err(EngineError::precondition(format!(
                "{} is not a farmable area",
                object.name
            )));
        }
        let zone = s
            .resource_zone(object.id)?
            .ok_or_else(|| EngineError::precondition(format!("{} has nothing to farm", object.name)))?;

        if s.active_session(player.id, player.map_id)?.is_some() {
            return Err(EngineError::conflict("a farm session is already running"));
        }
        if (player.energy as u32) < request.energy_cost {
            return Err(EngineError::precondition(format!(
                "not enough energy: have {}, need {}",
                player.energy, request.energy_cost
            )));
        }

        player.energy -= request.energy_cost as u8;
        player.status = PlayerStatus::Farming;
        s.update_player(&player)?;

        let end_time = now + request.duration_minutes as Micros * MICROS_PER_MINUTE;
        let mut session = FarmSession {
            id: 0,
            player_id: player.id,
            map_id: player.map_id,
            resource_id: zone.resource_id,
            start_time: now,
            end_time,
            status: SessionStatus::InProgress,
        };
        session.id = s.insert_session(session.clone())?;

        let payload = serde_json::to_string(&FarmCompletionPayload {
            session_id: session.id,
            total_minutes: request.duration_minutes,
        })?;
        let job_id = s.enqueue_job(topics::FARM_COMPLETE, payload, end_time)?;

        log::info!(
            "player #{} farming {} for {} min (session #{}, job #{})",
            player.id,
            object.name,
            request.duration_minutes,
            session.id,
            job_id
        );
        Ok(FarmTicket {
            total_seconds: session.total_seconds(),
            seconds_passed: session.seconds_passed(now),
            session,
            job_id,
        })
    })
}

fn grant<S: Store>(s: &mut S, player: &Player, resource_id: u64, amount: u32) -> EngineResult<()> {
    if amount == 0 {
        return Ok(());
    }
    let mut inventory = Inventory::load(s, player)?;
    adjust(
        &mut inventory,
        StackKey::resource(resource_id),
        amount,
        Direction::Increase,
        resource_limit(),
    )?;
    s.save_container(&inventory)
}

// ── Stop ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StopOutcome {
    pub session: FarmSession,
    pub minutes_farmed: u32,
    pub granted: u32,
}

/// Cash out the player's running session for the minutes farmed so far.
///
/// The pending completion job is left alone; it finds the session completed
/// and does nothing.
pub fn stop_farming<S: Store>(store: &mut S, player_id: u64, now: Micros) -> EngineResult<StopOutcome> {
    store.unit_of_work(|s| {
        let mut player = s.require_player(player_id)?;
        if player.status != PlayerStatus::Farming {
            return Err(EngineError::precondition("player is not farming"));
        }
        let mut session = s
            .active_session(player.id, player.map_id)?
            .ok_or_else(|| EngineError::not_found("active farm session"))?;

        let minutes_farmed = session.elapsed_minutes(now);
        let granted = farm_yield(minutes_farmed);

        session.status = SessionStatus::Completed;
        s.update_session(&session)?;
        player.status = PlayerStatus::Waiting;
        s.update_player(&player)?;
        grant(s, &player, session.resource_id, granted)?;

        log::info!(
            "player #{} stopped session #{} after {} min, +{}",
            player.id,
            session.id,
            minutes_farmed,
            granted
        );
        Ok(StopOutcome {
            session,
            minutes_farmed,
            granted,
        })
    })
}

// ── Complete ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Granted {
        player_id: u64,
        resource_id: u64,
        amount: u32,
    },
    /// Stopped early or delivered before; nothing changed.
    AlreadyCompleted,
}

/// Finish a session for its full duration. Safe to call repeatedly.
///
/// The notification goes out only after the grant has committed.
pub fn complete_farming<S, N>(store: &mut S, notifier: &mut N, session_id: u64) -> EngineResult<Completion>
where
    S: Store,
    N: Notifier + ?Sized,
{
    let (completion, message) = store.unit_of_work(|s| {
        let mut session = s
            .session(session_id)?
            .ok_or_else(|| EngineError::not_found(format!("farm session #{}", session_id)))?;
        if session.is_completed() {
            return Ok((Completion::AlreadyCompleted, None));
        }
        let mut player = s.require_player(session.player_id)?;
        let resource = s.require_resource(session.resource_id)?;
        let amount = farm_yield(session.total_minutes());

        session.status = SessionStatus::Completed;
        s.update_session(&session)?;
        if player.status == PlayerStatus::Farming {
            player.status = PlayerStatus::Waiting;
            s.update_player(&player)?;
        }
        grant(s, &player, resource.id, amount)?;

        let text = format!(
            "Farming finished: {} {} +{}",
            resource.icon, resource.name, amount
        );
        Ok((
            Completion::Granted {
                player_id: player.id,
                resource_id: resource.id,
                amount,
            },
            Some((player.external_id, text)),
        ))
    })?;

    match &completion {
        Completion::Granted { player_id, amount, .. } => {
            log::info!("session #{} complete: player #{} +{}", session_id, player_id, amount)
        }
        Completion::AlreadyCompleted => {
            log::debug!("session #{} already completed, skipping", session_id)
        }
    }
    if let Some((to, text)) = message {
        notify_best_effort(notifier, &to, &text);
    }
    Ok(completion)
}

/// Dispatcher handler for [`topics::FARM_COMPLETE`] jobs.
pub fn completion_handler<'a, S, N>(
    notifier: &'a mut N,
) -> impl FnMut(&mut S, &DeferredJob, Micros) -> EngineResult<()> + 'a
where
    S: Store + 'a,
    N: Notifier + ?Sized,
{
    move |store: &mut S, job: &DeferredJob, _now: Micros| {
        let payload: FarmCompletionPayload = serde_json::from_str(&job.payload)?;
        complete_farming(store, &mut *notifier, payload.session_id).map(|_| ())
    }
}
