//! Game constants — job topics, object kinds, time units, stack limits.
//!
//! Plain values with no database dependency. Both the SpacetimeDB module and
//! the native simtest use these.

/// Timestamps are microseconds since the Unix epoch.
pub type Micros = i64;

pub const MICROS_PER_SECOND: Micros = 1_000_000;
pub const MICROS_PER_MINUTE: Micros = 60 * MICROS_PER_SECOND;

pub mod topics {
    /// Deferred completion of a farm session.
    pub const FARM_COMPLETE: &str = "farm.complete";
}

pub mod object_kinds {
    pub const BASE: &str = "base";
    pub const FOREST: &str = "forest";
    pub const QUARRY: &str = "quarry";
    pub const LAKE: &str = "lake";
    pub const SETTLEMENT: &str = "settlement";
}

pub mod building_types {
    pub const BASE: &str = "base";
}

pub mod tiers {
    /// Resources carry no tier.
    pub const RESOURCE: u8 = 0;
    /// Freshly crafted items.
    pub const BASIC: u8 = 1;
}

/// Resources stack without limit; items use their catalog `max_count`.
pub const RESOURCE_STACK_LIMIT: u32 = u32::MAX;

/// Upper bound of health and energy.
pub const STAT_MAX: u8 = 100;

/// Whole minutes between two timestamps, never negative.
pub fn whole_minutes_between(start: Micros, end: Micros) -> u32 {
    let minutes = (end - start).max(0) / MICROS_PER_MINUTE;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Whole seconds between two timestamps, never negative.
pub fn whole_seconds_between(start: Micros, end: Micros) -> u64 {
    ((end - start).max(0) / MICROS_PER_SECOND) as u64
}
