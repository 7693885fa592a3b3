//! SpacetimeDB table definitions for the Homestead economy.
//!
//! Each table stores one record type from `homestead_logic::model`; enums
//! are kept as `u8` codes and converted in [`crate::store`].

use homestead_logic::config::EngineConfig;
use spacetimedb::{table, ScheduleAt, Timestamp};

use crate::reducers::{deliver_job, dispatch_due_jobs, regenerate_players};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Engine configuration singleton (id always 0)
#[table(name = game_config, public)]
#[derive(Clone)]
pub struct GameConfig {
    #[primary_key]
    pub id: u32,
    pub regen_step: u8,
    pub stat_cap: u8,
    pub regen_interval_secs: u64,
    pub dispatch_interval_millis: u64,
    pub dispatch_batch_size: u32,
    pub job_max_attempts: u32,
    pub job_retry_backoff_secs: u64,
    pub farm_energy_per_minute: u32,
    pub base_footprint: u32,
    pub default_inventory_slots: u32,
}

impl GameConfig {
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            id: 0,
            regen_step: config.regen_step,
            stat_cap: config.stat_cap,
            regen_interval_secs: config.regen_interval_secs,
            dispatch_interval_millis: config.dispatch_interval_millis,
            dispatch_batch_size: config.dispatch_batch_size as u32,
            job_max_attempts: config.job_max_attempts,
            job_retry_backoff_secs: config.job_retry_backoff_secs,
            farm_energy_per_minute: config.farm_energy_per_minute,
            base_footprint: config.base_footprint,
            default_inventory_slots: config.default_inventory_slots,
        }
    }

    pub fn to_engine(&self) -> EngineConfig {
        EngineConfig {
            regen_step: self.regen_step,
            stat_cap: self.stat_cap,
            regen_interval_secs: self.regen_interval_secs,
            dispatch_interval_millis: self.dispatch_interval_millis,
            dispatch_batch_size: self.dispatch_batch_size as usize,
            job_max_attempts: self.job_max_attempts,
            job_retry_backoff_secs: self.job_retry_backoff_secs,
            farm_energy_per_minute: self.farm_energy_per_minute,
            base_footprint: self.base_footprint,
            default_inventory_slots: self.default_inventory_slots,
        }
    }
}

// ============================================================================
// CATALOG
// ============================================================================

#[table(name = resource, public)]
#[derive(Clone)]
pub struct Resource {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub name: String,
    pub icon: String,
}

#[table(name = item, public)]
#[derive(Clone)]
pub struct Item {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub name: String,
    pub icon: String,
    pub kind: String,
    pub max_count: u32,
}

/// One resource requirement of an item's recipe
#[table(name = recipe_line, public)]
#[derive(Clone)]
pub struct RecipeLine {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub item_id: u64,
    pub resource_id: u64,
    pub quantity: u32,
}

#[table(name = building_cost, public)]
#[derive(Clone)]
pub struct BuildingCost {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub building_type: String,
    pub resource_id: u64,
    pub quantity: u32,
}

// ============================================================================
// MAPS
// ============================================================================

#[table(name = game_map, public)]
#[derive(Clone)]
pub struct GameMap {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[table(name = map_object, public)]
#[derive(Clone)]
pub struct MapObject {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub map_id: u64,
    pub name: String,
    pub kind: String,
    pub is_farmable: bool,
}

/// Footprint of a map object, inclusive cell range
#[table(name = map_object_position, public)]
#[derive(Clone)]
pub struct MapObjectPosition {
    #[primary_key]
    pub map_object_id: u64,
    #[index(btree)]
    pub map_id: u64,
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

#[table(name = resource_zone, public)]
#[derive(Clone)]
pub struct ResourceZone {
    #[primary_key]
    pub map_object_id: u64,
    pub map_id: u64,
    pub resource_id: u64,
}

// ============================================================================
// PLAYERS
// ============================================================================

#[table(name = player, public)]
#[derive(Clone)]
pub struct Player {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    /// Hex identity of the owning client
    #[index(btree)]
    pub external_id: String,
    pub name: String,
    pub map_id: u64,
    pub health: u8,
    pub energy: u8,
    #[index(btree)]
    pub status: u8, // PlayerStatus as u8
    pub map_object_id: Option<u64>,
    pub inventory_slots: u32,
}

#[table(name = player_base, public)]
#[derive(Clone)]
pub struct PlayerBase {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub owner_id: u64,
    pub map_id: u64,
    pub map_object_id: u64,
}

// ============================================================================
// LEDGER
// ============================================================================

/// Carried by a player
#[table(name = inventory_entry, public)]
#[derive(Clone)]
pub struct InventoryEntry {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub player_id: u64,
    pub kind: u8, // EntryKind as u8
    pub target_id: u64,
    pub tier: u8,
    pub count: u32,
}

/// Kept at a base
#[table(name = storage_entry, public)]
#[derive(Clone)]
pub struct StorageEntry {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub base_id: u64,
    pub kind: u8,
    pub target_id: u64,
    pub tier: u8,
    pub count: u32,
}

// ============================================================================
// FARMING & JOBS
// ============================================================================

#[table(name = farm_session, public)]
#[derive(Clone)]
pub struct FarmSession {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub player_id: u64,
    pub map_id: u64,
    pub resource_id: u64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: u8, // SessionStatus as u8
}

/// Durable deferred work, claimed by `dispatch_due_jobs`
#[table(name = deferred_job)]
#[derive(Clone)]
pub struct DeferredJob {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub topic: String,
    /// JSON body for the topic's handler
    pub payload: String,
    /// Microseconds since the Unix epoch
    #[index(btree)]
    pub due_at: i64,
    pub attempts: u32,
}

/// Messages for players; clients subscribe to their own rows
#[table(name = player_notification, public)]
#[derive(Clone)]
pub struct PlayerNotification {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub external_id: String,
    pub text: String,
    pub sent_at: Timestamp,
}

// ============================================================================
// SCHEDULES
// ============================================================================

#[table(name = dispatch_schedule, scheduled(dispatch_due_jobs))]
#[derive(Clone)]
pub struct DispatchSchedule {
    #[primary_key]
    #[auto_inc]
    pub scheduled_id: u64,
    pub scheduled_at: ScheduleAt,
}

#[table(name = regen_schedule, scheduled(regenerate_players))]
#[derive(Clone)]
pub struct RegenSchedule {
    #[primary_key]
    #[auto_inc]
    pub scheduled_id: u64,
    pub scheduled_at: ScheduleAt,
}

/// One claimed job, delivered by `deliver_job` in its own transaction
#[table(name = job_delivery, scheduled(deliver_job))]
#[derive(Clone)]
pub struct JobDelivery {
    #[primary_key]
    #[auto_inc]
    pub scheduled_id: u64,
    pub scheduled_at: ScheduleAt,
    pub job_id: u64,
}
