//! Plain data records shared by the engine and every store implementation.
//!
//! Rows inserted with `id: 0` get their id assigned by the store, mirroring
//! SpacetimeDB's `#[auto_inc]` convention.

use serde::{Deserialize, Serialize};

use crate::constants::{tiers, whole_minutes_between, whole_seconds_between, Micros};
use crate::placement::Rect;

// ── Status codes ────────────────────────────────────────────────────────

/// What a player is currently doing. Stored as `u8` in tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Waiting = 0,
    /// Resting at the player's own base; eligible for regeneration.
    Recovery = 1,
    Farming = 2,
    Traveling = 3,
}

impl PlayerStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::Waiting),
            1 => Some(Self::Recovery),
            2 => Some(Self::Farming),
            3 => Some(Self::Traveling),
            _ => None,
        }
    }

    /// Idle players may start a new action.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Waiting | Self::Recovery)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Recovery => "recovery",
            Self::Farming => "farming",
            Self::Traveling => "traveling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    InProgress = 0,
    Completed = 1,
}

impl SessionStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::InProgress),
            1 => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Whether a ledger entry counts a raw resource or a crafted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Resource = 0,
    Item = 1,
}

impl EntryKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::Resource),
            1 => Some(Self::Item),
            _ => None,
        }
    }
}

// ── Players ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: u64,
    /// Address used by the notifier (client identity).
    pub external_id: String,
    pub name: String,
    pub map_id: u64,
    pub health: u8,
    pub energy: u8,
    pub status: PlayerStatus,
    pub map_object_id: Option<u64>,
    pub inventory_slots: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBase {
    pub id: u64,
    pub owner_id: u64,
    pub map_id: u64,
    pub map_object_id: u64,
}

// ── Catalog ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: u64,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub resource_id: u64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub icon: String,
    pub kind: String,
    /// Largest count one stack may hold.
    pub max_count: u32,
    pub recipe: Vec<RecipeLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingCost {
    pub building_type: String,
    pub resource_id: u64,
    pub quantity: u32,
}

// ── Ledger ──────────────────────────────────────────────────────────────

/// Identity of a stack: two entries with the same key may merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackKey {
    pub kind: EntryKind,
    pub target_id: u64,
    pub tier: u8,
}

impl StackKey {
    pub fn resource(resource_id: u64) -> Self {
        Self {
            kind: EntryKind::Resource,
            target_id: resource_id,
            tier: tiers::RESOURCE,
        }
    }

    pub fn item(item_id: u64, tier: u8) -> Self {
        Self {
            kind: EntryKind::Item,
            target_id: item_id,
            tier,
        }
    }
}

/// One inventory or storage row. The owner lives on the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub kind: EntryKind,
    pub target_id: u64,
    pub tier: u8,
    pub count: u32,
}

impl LedgerEntry {
    pub fn key(&self) -> StackKey {
        StackKey {
            kind: self.kind,
            target_id: self.target_id,
            tier: self.tier,
        }
    }
}

/// Which collection a ledger row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    /// Carried by the player (player id).
    Inventory(u64),
    /// Kept at a base (base id).
    Storage(u64),
}

// ── Maps ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMap {
    pub id: u64,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapObject {
    pub id: u64,
    pub map_id: u64,
    pub name: String,
    pub kind: String,
    pub is_farmable: bool,
}

/// A map object's footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub map_object_id: u64,
    pub rect: Rect,
}

/// Links a farmable map object to the resource it yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceZone {
    pub map_object_id: u64,
    pub map_id: u64,
    pub resource_id: u64,
}

// ── Farming ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmSession {
    pub id: u64,
    pub player_id: u64,
    pub map_id: u64,
    pub resource_id: u64,
    pub start_time: Micros,
    pub end_time: Micros,
    pub status: SessionStatus,
}

impl FarmSession {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn total_minutes(&self) -> u32 {
        whole_minutes_between(self.start_time, self.end_time)
    }

    /// Whole minutes farmed by `now`, never more than the booked duration.
    pub fn elapsed_minutes(&self, now: Micros) -> u32 {
        whole_minutes_between(self.start_time, now).min(self.total_minutes())
    }

    pub fn total_seconds(&self) -> u64 {
        whole_seconds_between(self.start_time, self.end_time)
    }

    pub fn seconds_passed(&self, now: Micros) -> u64 {
        whole_seconds_between(self.start_time, now.min(self.end_time))
    }
}

// ── Deferred jobs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredJob {
    pub id: u64,
    pub topic: String,
    /// JSON body understood by the topic's handler.
    pub payload: String,
    pub due_at: Micros,
    /// Failed deliveries so far.
    pub attempts: u32,
}
