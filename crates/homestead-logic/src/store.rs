//! Relational store contract.
//!
//! Every engine operation takes a `&mut S: Store` and wraps its reads and
//! writes in [`Store::unit_of_work`]. Two implementations exist:
//! [`crate::memory::MemoryStore`] (tests, harness) and the SpacetimeDB
//! `DbStore` in the server crate.

use crate::constants::Micros;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{self, Container};
use crate::model::{
    BuildingCost, DeferredJob, FarmSession, GameMap, Item, LedgerEntry, MapObject, Owner,
    Placement, Player, PlayerBase, Resource, ResourceZone,
};
use crate::placement::Rect;
use crate::regen::RegenRule;

pub trait Store {
    /// Whether a failed unit of work is rolled back on its own. When false,
    /// only the enclosing transaction can undo it (SpacetimeDB reducers).
    fn isolated_units(&self) -> bool;

    /// Run `f` so that its writes are committed together or not at all.
    fn unit_of_work<T, F>(&mut self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Self) -> EngineResult<T>,
        Self: Sized;

    // ── Catalog ──

    fn resource(&self, id: u64) -> EngineResult<Option<Resource>>;
    fn item(&self, id: u64) -> EngineResult<Option<Item>>;
    fn building_costs(&self, building_type: &str) -> EngineResult<Vec<BuildingCost>>;
    fn insert_resource(&mut self, resource: Resource) -> EngineResult<u64>;
    fn insert_item(&mut self, item: Item) -> EngineResult<u64>;
    fn insert_building_cost(&mut self, cost: BuildingCost) -> EngineResult<()>;

    // ── Maps ──

    fn insert_map(&mut self, map: GameMap) -> EngineResult<u64>;
    fn map(&self, id: u64) -> EngineResult<Option<GameMap>>;
    fn map_object(&self, id: u64) -> EngineResult<Option<MapObject>>;
    /// Footprints of every positioned object on `map_id`.
    fn placements_on(&self, map_id: u64) -> EngineResult<Vec<Placement>>;
    fn resource_zone(&self, map_object_id: u64) -> EngineResult<Option<ResourceZone>>;
    fn insert_map_object(&mut self, object: MapObject, rect: Option<Rect>) -> EngineResult<u64>;
    fn insert_resource_zone(&mut self, zone: ResourceZone) -> EngineResult<()>;

    // ── Players ──

    fn player(&self, id: u64) -> EngineResult<Option<Player>>;
    fn player_by_external(&self, external_id: &str, map_id: u64) -> EngineResult<Option<Player>>;
    fn insert_player(&mut self, player: Player) -> EngineResult<u64>;
    fn update_player(&mut self, player: &Player) -> EngineResult<()>;
    /// Bulk conditional update: apply `rule` to every recovering player.
    /// Returns the number of rows changed.
    fn regenerate_recovering(&mut self, rule: RegenRule) -> EngineResult<usize>;

    fn base_of(&self, player_id: u64, map_id: u64) -> EngineResult<Option<PlayerBase>>;
    fn insert_base(&mut self, base: PlayerBase) -> EngineResult<u64>;

    // ── Ledger rows ──

    fn entries(&self, owner: Owner) -> EngineResult<Vec<LedgerEntry>>;
    fn insert_entry(&mut self, owner: Owner, entry: LedgerEntry) -> EngineResult<u64>;
    fn update_entry(&mut self, owner: Owner, entry: &LedgerEntry) -> EngineResult<()>;
    fn delete_entry(&mut self, owner: Owner, id: u64) -> EngineResult<()>;

    // ── Farm sessions ──

    fn session(&self, id: u64) -> EngineResult<Option<FarmSession>>;
    fn active_session(&self, player_id: u64, map_id: u64) -> EngineResult<Option<FarmSession>>;
    fn insert_session(&mut self, session: FarmSession) -> EngineResult<u64>;
    fn update_session(&mut self, session: &FarmSession) -> EngineResult<()>;

    // ── Deferred jobs ──

    fn enqueue_job(&mut self, topic: &str, payload: String, due_at: Micros) -> EngineResult<u64>;
    fn job(&self, id: u64) -> EngineResult<Option<DeferredJob>>;
    /// Jobs with `due_at <= now`, oldest first, at most `limit`.
    fn due_jobs(&self, now: Micros, limit: usize) -> EngineResult<Vec<DeferredJob>>;
    fn delete_job(&mut self, id: u64) -> EngineResult<()>;
    fn reschedule_job(&mut self, id: u64, due_at: Micros, attempts: u32) -> EngineResult<()>;

    // ── Provided ──

    /// Write a ledger working copy back as a diff.
    fn save_container<C: Container + ?Sized>(&mut self, container: &C) -> EngineResult<()>
    where
        Self: Sized,
    {
        ledger::save(self, container)
    }

    fn require_player(&self, id: u64) -> EngineResult<Player> {
        self.player(id)?
            .ok_or_else(|| EngineError::not_found(format!("player #{}", id)))
    }

    fn require_map(&self, id: u64) -> EngineResult<GameMap> {
        self.map(id)?
            .ok_or_else(|| EngineError::not_found(format!("map #{}", id)))
    }

    fn require_item(&self, id: u64) -> EngineResult<Item> {
        self.item(id)?
            .ok_or_else(|| EngineError::not_found(format!("item #{}", id)))
    }

    fn require_resource(&self, id: u64) -> EngineResult<Resource> {
        self.resource(id)?
            .ok_or_else(|| EngineError::not_found(format!("resource #{}", id)))
    }
}
