//! In-memory [`Store`] used by tests and the headless harness.
//!
//! All rows live in one serde-friendly [`Tables`] value. A unit of work
//! clones it up front and restores the clone on error. The same value can be
//! written out as JSON and read back, which is how the harness simulates a
//! process restart.
//!
//! [`MemoryStore::without_savepoints`] behaves like a SpacetimeDB reducer
//! instead: units of work share the caller's [`MemoryStore::transaction`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::Micros;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    BuildingCost, DeferredJob, FarmSession, GameMap, Item, LedgerEntry, MapObject, Owner,
    Placement, Player, PlayerBase, PlayerStatus, Resource, ResourceZone, SessionStatus,
};
use crate::placement::Rect;
use crate::regen::RegenRule;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OwnedEntry {
    owner: Owner,
    entry: LedgerEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    next_id: u64,
    resources: BTreeMap<u64, Resource>,
    items: BTreeMap<u64, Item>,
    building_costs: Vec<BuildingCost>,
    maps: BTreeMap<u64, GameMap>,
    map_objects: BTreeMap<u64, MapObject>,
    positions: BTreeMap<u64, Rect>,
    zones: BTreeMap<u64, ResourceZone>,
    players: BTreeMap<u64, Player>,
    bases: BTreeMap<u64, PlayerBase>,
    entries: BTreeMap<u64, OwnedEntry>,
    sessions: BTreeMap<u64, FarmSession>,
    jobs: BTreeMap<u64, DeferredJob>,
}

impl Tables {
    /// Ids are shared across tables; callers passing a nonzero id keep it.
    fn assign(&mut self, requested: u64) -> u64 {
        if requested != 0 {
            self.next_id = self.next_id.max(requested);
            return requested;
        }
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Tables,
    /// Writes left to fail with `StorageFault`.
    pending_faults: u32,
    /// Units of work commit into the enclosing transaction.
    no_savepoints: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_savepoints() -> Self {
        Self {
            no_savepoints: true,
            ..Self::default()
        }
    }

    /// Run `f` as one transaction: every write it made is undone on error.
    pub fn transaction<T, F>(&mut self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Self) -> EngineResult<T>,
    {
        let snapshot = self.tables.clone();
        let result = f(self);
        if let Err(err) = &result {
            log::debug!("transaction rolled back: {}", err);
            self.tables = snapshot;
        }
        result
    }

    /// Make the next `count` writes fail with a storage fault.
    pub fn inject_faults(&mut self, count: u32) {
        self.pending_faults = count;
    }

    pub fn snapshot_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(&self.tables)?)
    }

    pub fn restore_json(json: &str) -> EngineResult<Self> {
        Ok(Self {
            tables: serde_json::from_str(json)?,
            ..Self::default()
        })
    }

    pub fn jobs(&self) -> Vec<DeferredJob> {
        self.tables.jobs.values().cloned().collect()
    }

    pub fn sessions(&self) -> Vec<FarmSession> {
        self.tables.sessions.values().cloned().collect()
    }

    fn write(&mut self) -> EngineResult<&mut Tables> {
        if self.pending_faults > 0 {
            self.pending_faults -= 1;
            return Err(EngineError::storage("injected write failure"));
        }
        Ok(&mut self.tables)
    }
}

fn missing(what: &str, id: u64) -> EngineError {
    EngineError::storage(format!("{} #{} vanished during update", what, id))
}

impl Store for MemoryStore {
    fn isolated_units(&self) -> bool {
        !self.no_savepoints
    }

    fn unit_of_work<T, F>(&mut self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Self) -> EngineResult<T>,
    {
        if self.no_savepoints {
            return f(self);
        }
        self.transaction(f)
    }

    fn resource(&self, id: u64) -> EngineResult<Option<Resource>> {
        Ok(self.tables.resources.get(&id).cloned())
    }

    fn item(&self, id: u64) -> EngineResult<Option<Item>> {
        Ok(self.tables.items.get(&id).cloned())
    }

    fn building_costs(&self, building_type: &str) -> EngineResult<Vec<BuildingCost>> {
        Ok(self
            .tables
            .building_costs
            .iter()
            .filter(|c| c.building_type == building_type)
            .cloned()
            .collect())
    }

    fn insert_resource(&mut self, mut resource: Resource) -> EngineResult<u64> {
        let t = self.write()?;
        resource.id = t.assign(resource.id);
        let id = resource.id;
        t.resources.insert(id, resource);
        Ok(id)
    }

    fn insert_item(&mut self, mut item: Item) -> EngineResult<u64> {
        let t = self.write()?;
        item.id = t.assign(item.id);
        let id = item.id;
        t.items.insert(id, item);
        Ok(id)
    }

    fn insert_building_cost(&mut self, cost: BuildingCost) -> EngineResult<()> {
        self.write()?.building_costs.push(cost);
        Ok(())
    }

    fn insert_map(&mut self, mut map: GameMap) -> EngineResult<u64> {
        let t = self.write()?;
        map.id = t.assign(map.id);
        let id = map.id;
        t.maps.insert(id, map);
        Ok(id)
    }

    fn map(&self, id: u64) -> EngineResult<Option<GameMap>> {
        Ok(self.tables.maps.get(&id).cloned())
    }

    fn map_object(&self, id: u64) -> EngineResult<Option<MapObject>> {
        Ok(self.tables.map_objects.get(&id).cloned())
    }

    fn placements_on(&self, map_id: u64) -> EngineResult<Vec<Placement>> {
        let t = &self.tables;
        Ok(t.positions
            .iter()
            .filter(|(id, _)| t.map_objects.get(id).is_some_and(|o| o.map_id == map_id))
            .map(|(&map_object_id, &rect)| Placement {
                map_object_id,
                rect,
            })
            .collect())
    }

    fn resource_zone(&self, map_object_id: u64) -> EngineResult<Option<ResourceZone>> {
        Ok(self.tables.zones.get(&map_object_id).cloned())
    }

    fn insert_map_object(&mut self, mut object: MapObject, rect: Option<Rect>) -> EngineResult<u64> {
        let t = self.write()?;
        object.id = t.assign(object.id);
        let id = object.id;
        t.map_objects.insert(id, object);
        if let Some(rect) = rect {
            t.positions.insert(id, rect);
        }
        Ok(id)
    }

    fn insert_resource_zone(&mut self, zone: ResourceZone) -> EngineResult<()> {
        self.write()?.zones.insert(zone.map_object_id, zone);
        Ok(())
    }

    fn player(&self, id: u64) -> EngineResult<Option<Player>> {
        Ok(self.tables.players.get(&id).cloned())
    }

    fn player_by_external(&self, external_id: &str, map_id: u64) -> EngineResult<Option<Player>> {
        Ok(self
            .tables
            .players
            .values()
            .find(|p| p.external_id == external_id && p.map_id == map_id)
            .cloned())
    }

    fn insert_player(&mut self, mut player: Player) -> EngineResult<u64> {
        let t = self.write()?;
        player.id = t.assign(player.id);
        let id = player.id;
        t.players.insert(id, player);
        Ok(id)
    }

    fn update_player(&mut self, player: &Player) -> EngineResult<()> {
        let row = self
            .write()?
            .players
            .get_mut(&player.id)
            .ok_or_else(|| missing("player", player.id))?;
        *row = player.clone();
        Ok(())
    }

    fn regenerate_recovering(&mut self, rule: RegenRule) -> EngineResult<usize> {
        let mut changed = 0;
        for player in self.write()?.players.values_mut() {
            if player.status != PlayerStatus::Recovery {
                continue;
            }
            if let Some((health, energy)) = rule.apply(player.health, player.energy) {
                player.health = health;
                player.energy = energy;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn base_of(&self, player_id: u64, map_id: u64) -> EngineResult<Option<PlayerBase>> {
        Ok(self
            .tables
            .bases
            .values()
            .find(|b| b.owner_id == player_id && b.map_id == map_id)
            .cloned())
    }

    fn insert_base(&mut self, mut base: PlayerBase) -> EngineResult<u64> {
        let t = self.write()?;
        base.id = t.assign(base.id);
        let id = base.id;
        t.bases.insert(id, base);
        Ok(id)
    }

    fn entries(&self, owner: Owner) -> EngineResult<Vec<LedgerEntry>> {
        Ok(self
            .tables
            .entries
            .values()
            .filter(|e| e.owner == owner)
            .map(|e| e.entry.clone())
            .collect())
    }

    fn insert_entry(&mut self, owner: Owner, mut entry: LedgerEntry) -> EngineResult<u64> {
        let t = self.write()?;
        entry.id = t.assign(entry.id);
        let id = entry.id;
        t.entries.insert(id, OwnedEntry { owner, entry });
        Ok(id)
    }

    fn update_entry(&mut self, owner: Owner, entry: &LedgerEntry) -> EngineResult<()> {
        let row = self
            .write()?
            .entries
            .get_mut(&entry.id)
            .filter(|row| row.owner == owner)
            .ok_or_else(|| missing("entry", entry.id))?;
        row.entry = entry.clone();
        Ok(())
    }

    fn delete_entry(&mut self, owner: Owner, id: u64) -> EngineResult<()> {
        let t = self.write()?;
        match t.entries.get(&id) {
            Some(row) if row.owner == owner => {
                t.entries.remove(&id);
                Ok(())
            }
            _ => Err(missing("entry", id)),
        }
    }

    fn session(&self, id: u64) -> EngineResult<Option<FarmSession>> {
        Ok(self.tables.sessions.get(&id).cloned())
    }

    fn active_session(&self, player_id: u64, map_id: u64) -> EngineResult<Option<FarmSession>> {
        Ok(self
            .tables
            .sessions
            .values()
            .find(|s| {
                s.player_id == player_id
                    && s.map_id == map_id
                    && s.status == SessionStatus::InProgress
            })
            .cloned())
    }

    fn insert_session(&mut self, mut session: FarmSession) -> EngineResult<u64> {
        let t = self.write()?;
        session.id = t.assign(session.id);
        let id = session.id;
        t.sessions.insert(id, session);
        Ok(id)
    }

    fn update_session(&mut self, session: &FarmSession) -> EngineResult<()> {
        let row = self
            .write()?
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| missing("session", session.id))?;
        *row = session.clone();
        Ok(())
    }

    fn enqueue_job(&mut self, topic: &str, payload: String, due_at: Micros) -> EngineResult<u64> {
        let t = self.write()?;
        let id = t.assign(0);
        t.jobs.insert(
            id,
            DeferredJob {
                id,
                topic: topic.to_string(),
                payload,
                due_at,
                attempts: 0,
            },
        );
        Ok(id)
    }

    fn job(&self, id: u64) -> EngineResult<Option<DeferredJob>> {
        Ok(self.tables.jobs.get(&id).cloned())
    }

    fn due_jobs(&self, now: Micros, limit: usize) -> EngineResult<Vec<DeferredJob>> {
        let mut due: Vec<DeferredJob> = self
            .tables
            .jobs
            .values()
            .filter(|j| j.due_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|j| (j.due_at, j.id));
        due.truncate(limit);
        Ok(due)
    }

    fn delete_job(&mut self, id: u64) -> EngineResult<()> {
        self.write()?.jobs.remove(&id);
        Ok(())
    }

    fn reschedule_job(&mut self, id: u64, due_at: Micros, attempts: u32) -> EngineResult<()> {
        let job = self
            .write()?
            .jobs
            .get_mut(&id)
            .ok_or_else(|| missing("job", id))?;
        job.due_at = due_at;
        job.attempts = attempts;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn player(status: PlayerStatus, health: u8, energy: u8) -> Player {
        Player {
            id: 0,
            external_id: "ext".into(),
            name: "Ada".into(),
            map_id: 1,
            health,
            energy,
            status,
            map_object_id: None,
            inventory_slots: 10,
        }
    }

    #[test]
    fn test_failed_unit_rolls_back() {
        let mut store = MemoryStore::new();
        let err = store
            .unit_of_work(|s| {
                s.insert_player(player(PlayerStatus::Waiting, 100, 100))?;
                Err::<(), _>(EngineError::conflict("nope"))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(store.player_by_external("ext", 1).unwrap().is_none());
    }

    #[test]
    fn test_injected_fault_is_storage_fault() {
        let mut store = MemoryStore::new();
        store.inject_faults(1);
        let err = store
            .insert_player(player(PlayerStatus::Waiting, 100, 100))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFault);
        assert!(store.insert_player(player(PlayerStatus::Waiting, 100, 100)).is_ok());
    }

    #[test]
    fn test_bulk_regen_touches_only_recovering() {
        let mut store = MemoryStore::new();
        let resting = store.insert_player(player(PlayerStatus::Recovery, 50, 100)).unwrap();
        let busy = store.insert_player(player(PlayerStatus::Farming, 50, 50)).unwrap();
        let full = store.insert_player(player(PlayerStatus::Recovery, 100, 100)).unwrap();

        let changed = store
            .regenerate_recovering(RegenRule { step: 1, cap: 100 })
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(store.player(resting).unwrap().unwrap().health, 51);
        assert_eq!(store.player(busy).unwrap().unwrap().health, 50);
        assert_eq!(store.player(full).unwrap().unwrap().energy, 100);
    }

    #[test]
    fn test_snapshot_survives_restart() {
        let mut store = MemoryStore::new();
        store.enqueue_job("farm.complete", "{}".into(), 42).unwrap();
        let json = store.snapshot_json().unwrap();
        let restored = MemoryStore::restore_json(&json).unwrap();
        assert_eq!(restored.jobs(), store.jobs());
        assert_eq!(restored.due_jobs(42, 10).unwrap().len(), 1);
        assert!(restored.due_jobs(41, 10).unwrap().is_empty());
    }

    #[test]
    fn test_due_jobs_oldest_first_and_bounded() {
        let mut store = MemoryStore::new();
        store.enqueue_job("t", "a".into(), 30).unwrap();
        store.enqueue_job("t", "b".into(), 10).unwrap();
        store.enqueue_job("t", "c".into(), 20).unwrap();
        let due = store.due_jobs(100, 2).unwrap();
        let payloads: Vec<&str> = due.iter().map(|j| j.payload.as_str()).collect();
        assert_eq!(payloads, vec!["b", "c"]);
    }

    #[test]
    fn test_placements_filtered_by_map() {
        let mut store = MemoryStore::new();
        let object = |map_id| MapObject {
            id: 0,
            map_id,
            name: "rock".into(),
            kind: "quarry".into(),
            is_farmable: false,
        };
        store.insert_map_object(object(1), Some(Rect::new(0, 0, 1, 1))).unwrap();
        store.insert_map_object(object(2), Some(Rect::new(0, 0, 1, 1))).unwrap();
        store.insert_map_object(object(1), None).unwrap();
        assert_eq!(store.placements_on(1).unwrap().len(), 1);
    }
}
