//! `Store` over SpacetimeDB tables.
//!
//! A reducer call is already one serializable transaction and an `Err` from
//! the reducer rolls back everything it wrote, so `unit_of_work` simply runs
//! the closure. Rows are converted to and from `homestead_logic::model` here.

use homestead_logic::constants::Micros;
use homestead_logic::error::{EngineError, EngineResult};
use homestead_logic::model as m;
use homestead_logic::placement::Rect;
use homestead_logic::regen::RegenRule;
use homestead_logic::store::Store;
use spacetimedb::{ReducerContext, Table, Timestamp};

use crate::tables::*;

pub struct DbStore<'a> {
    ctx: &'a ReducerContext,
}

impl<'a> DbStore<'a> {
    pub fn new(ctx: &'a ReducerContext) -> Self {
        Self { ctx }
    }
}

// ============================================================================
// ROW CONVERSION
// ============================================================================

pub fn to_micros(t: Timestamp) -> Micros {
    t.to_micros_since_unix_epoch()
}

fn from_micros(micros: Micros) -> Timestamp {
    Timestamp::from_micros_since_unix_epoch(micros)
}

fn corrupt(what: &str, code: u8) -> EngineError {
    EngineError::storage(format!("unknown {} code {}", what, code))
}

fn vanished(what: &str, id: u64) -> EngineError {
    EngineError::storage(format!("{} #{} vanished during update", what, id))
}

fn player_model(row: Player) -> EngineResult<m::Player> {
    Ok(m::Player {
        status: m::PlayerStatus::from_u8(row.status).ok_or_else(|| corrupt("player status", row.status))?,
        id: row.id,
        external_id: row.external_id,
        name: row.name,
        map_id: row.map_id,
        health: row.health,
        energy: row.energy,
        map_object_id: row.map_object_id,
        inventory_slots: row.inventory_slots,
    })
}

fn player_row(player: &m::Player) -> Player {
    Player {
        id: player.id,
        external_id: player.external_id.clone(),
        name: player.name.clone(),
        map_id: player.map_id,
        health: player.health,
        energy: player.energy,
        status: player.status.as_u8(),
        map_object_id: player.map_object_id,
        inventory_slots: player.inventory_slots,
    }
}

fn entry_model(id: u64, kind: u8, target_id: u64, tier: u8, count: u32) -> EngineResult<m::LedgerEntry> {
    Ok(m::LedgerEntry {
        id,
        kind: m::EntryKind::from_u8(kind).ok_or_else(|| corrupt("entry kind", kind))?,
        target_id,
        tier,
        count,
    })
}

fn session_model(row: FarmSession) -> EngineResult<m::FarmSession> {
    Ok(m::FarmSession {
        id: row.id,
        player_id: row.player_id,
        map_id: row.map_id,
        resource_id: row.resource_id,
        start_time: to_micros(row.start_time),
        end_time: to_micros(row.end_time),
        status: m::SessionStatus::from_u8(row.status).ok_or_else(|| corrupt("session status", row.status))?,
    })
}

fn session_row(session: &m::FarmSession) -> FarmSession {
    FarmSession {
        id: session.id,
        player_id: session.player_id,
        map_id: session.map_id,
        resource_id: session.resource_id,
        start_time: from_micros(session.start_time),
        end_time: from_micros(session.end_time),
        status: session.status.as_u8(),
    }
}

fn job_model(row: DeferredJob) -> m::DeferredJob {
    m::DeferredJob {
        id: row.id,
        topic: row.topic,
        payload: row.payload,
        due_at: row.due_at,
        attempts: row.attempts,
    }
}

// ============================================================================
// STORE
// ============================================================================

impl Store for DbStore<'_> {
    fn isolated_units(&self) -> bool {
        false
    }

    fn unit_of_work<T, F>(&mut self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Self) -> EngineResult<T>,
        Self: Sized,
    {
        f(self)
    }

    // ── Catalog ──

    fn resource(&self, id: u64) -> EngineResult<Option<m::Resource>> {
        Ok(self.ctx.db.resource().id().find(id).map(|r| m::Resource {
            id: r.id,
            name: r.name,
            icon: r.icon,
        }))
    }

    fn item(&self, id: u64) -> EngineResult<Option<m::Item>> {
        let Some(row) = self.ctx.db.item().id().find(id) else {
            return Ok(None);
        };
        let recipe = self
            .ctx
            .db
            .recipe_line()
            .item_id()
            .filter(&id)
            .map(|l| m::RecipeLine {
                resource_id: l.resource_id,
                quantity: l.quantity,
            })
            .collect();
        Ok(Some(m::Item {
            id: row.id,
            name: row.name,
            icon: row.icon,
            kind: row.kind,
            max_count: row.max_count,
            recipe,
        }))
    }

    fn building_costs(&self, building_type: &str) -> EngineResult<Vec<m::BuildingCost>> {
        Ok(self
            .ctx
            .db
            .building_cost()
            .building_type()
            .filter(&building_type.to_string())
            .map(|c| m::BuildingCost {
                building_type: c.building_type,
                resource_id: c.resource_id,
                quantity: c.quantity,
            })
            .collect())
    }

    fn insert_resource(&mut self, resource: m::Resource) -> EngineResult<u64> {
        Ok(self
            .ctx
            .db
            .resource()
            .insert(Resource {
                id: 0,
                name: resource.name,
                icon: resource.icon,
            })
            .id)
    }

    fn insert_item(&mut self, item: m::Item) -> EngineResult<u64> {
        let id = self
            .ctx
            .db
            .item()
            .insert(Item {
                id: 0,
                name: item.name,
                icon: item.icon,
                kind: item.kind,
                max_count: item.max_count,
            })
            .id;
        for line in item.recipe {
            self.ctx.db.recipe_line().insert(RecipeLine {
                id: 0,
                item_id: id,
                resource_id: line.resource_id,
                quantity: line.quantity,
            });
        }
        Ok(id)
    }

    fn insert_building_cost(&mut self, cost: m::BuildingCost) -> EngineResult<()> {
        self.ctx.db.building_cost().insert(BuildingCost {
            id: 0,
            building_type: cost.building_type,
            resource_id: cost.resource_id,
            quantity: cost.quantity,
        });
        Ok(())
    }

    // ── Maps ──

    fn insert_map(&mut self, map: m::GameMap) -> EngineResult<u64> {
        Ok(self
            .ctx
            .db
            .game_map()
            .insert(GameMap {
                id: 0,
                name: map.name,
                width: map.width,
                height: map.height,
            })
            .id)
    }

    fn map(&self, id: u64) -> EngineResult<Option<m::GameMap>> {
        Ok(self.ctx.db.game_map().id().find(id).map(|r| m::GameMap {
            id: r.id,
            name: r.name,
            width: r.width,
            height: r.height,
        }))
    }

    fn map_object(&self, id: u64) -> EngineResult<Option<m::MapObject>> {
        Ok(self.ctx.db.map_object().id().find(id).map(|r| m::MapObject {
            id: r.id,
            map_id: r.map_id,
            name: r.name,
            kind: r.kind,
            is_farmable: r.is_farmable,
        }))
    }

    fn placements_on(&self, map_id: u64) -> EngineResult<Vec<m::Placement>> {
        Ok(self
            .ctx
            .db
            .map_object_position()
            .map_id()
            .filter(&map_id)
            .map(|p| m::Placement {
                map_object_id: p.map_object_id,
                rect: Rect::new(p.x1, p.y1, p.x2, p.y2),
            })
            .collect())
    }

    fn resource_zone(&self, map_object_id: u64) -> EngineResult<Option<m::ResourceZone>> {
        Ok(self
            .ctx
            .db
            .resource_zone()
            .map_object_id()
            .find(map_object_id)
            .map(|z| m::ResourceZone {
                map_object_id: z.map_object_id,
                map_id: z.map_id,
                resource_id: z.resource_id,
            }))
    }

    fn insert_map_object(&mut self, object: m::MapObject, rect: Option<Rect>) -> EngineResult<u64> {
        let map_id = object.map_id;
        let id = self
            .ctx
            .db
            .map_object()
            .insert(MapObject {
                id: 0,
                map_id,
                name: object.name,
                kind: object.kind,
                is_farmable: object.is_farmable,
            })
            .id;
        if let Some(rect) = rect {
            self.ctx.db.map_object_position().insert(MapObjectPosition {
                map_object_id: id,
                map_id,
                x1: rect.x1,
                y1: rect.y1,
                x2: rect.x2,
                y2: rect.y2,
            });
        }
        Ok(id)
    }

    fn insert_resource_zone(&mut self, zone: m::ResourceZone) -> EngineResult<()> {
        self.ctx.db.resource_zone().insert(ResourceZone {
            map_object_id: zone.map_object_id,
            map_id: zone.map_id,
            resource_id: zone.resource_id,
        });
        Ok(())
    }

    // ── Players ──

    fn player(&self, id: u64) -> EngineResult<Option<m::Player>> {
        self.ctx.db.player().id().find(id).map(player_model).transpose()
    }

    fn player_by_external(&self, external_id: &str, map_id: u64) -> EngineResult<Option<m::Player>> {
        self.ctx
            .db
            .player()
            .external_id()
            .filter(&external_id.to_string())
            .find(|p| p.map_id == map_id)
            .map(player_model)
            .transpose()
    }

    fn insert_player(&mut self, player: m::Player) -> EngineResult<u64> {
        let mut row = player_row(&player);
        row.id = 0;
        Ok(self.ctx.db.player().insert(row).id)
    }

    fn update_player(&mut self, player: &m::Player) -> EngineResult<()> {
        if self.ctx.db.player().id().find(player.id).is_none() {
            return Err(vanished("player", player.id));
        }
        self.ctx.db.player().id().update(player_row(player));
        Ok(())
    }

    fn regenerate_recovering(&mut self, rule: RegenRule) -> EngineResult<usize> {
        let code = m::PlayerStatus::Recovery.as_u8();
        let resting: Vec<Player> = self.ctx.db.player().status().filter(&code).collect();
        let mut changed = 0;
        for mut row in resting {
            if let Some((health, energy)) = rule.apply(row.health, row.energy) {
                row.health = health;
                row.energy = energy;
                self.ctx.db.player().id().update(row);
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn base_of(&self, player_id: u64, map_id: u64) -> EngineResult<Option<m::PlayerBase>> {
        Ok(self
            .ctx
            .db
            .player_base()
            .owner_id()
            .filter(&player_id)
            .find(|b| b.map_id == map_id)
            .map(|b| m::PlayerBase {
                id: b.id,
                owner_id: b.owner_id,
                map_id: b.map_id,
                map_object_id: b.map_object_id,
            }))
    }

    fn insert_base(&mut self, base: m::PlayerBase) -> EngineResult<u64> {
        Ok(self
            .ctx
            .db
            .player_base()
            .insert(PlayerBase {
                id: 0,
                owner_id: base.owner_id,
                map_id: base.map_id,
                map_object_id: base.map_object_id,
            })
            .id)
    }

    // ── Ledger rows ──

    fn entries(&self, owner: m::Owner) -> EngineResult<Vec<m::LedgerEntry>> {
        match owner {
            m::Owner::Inventory(player_id) => self
                .ctx
                .db
                .inventory_entry()
                .player_id()
                .filter(&player_id)
                .map(|e| entry_model(e.id, e.kind, e.target_id, e.tier, e.count))
                .collect(),
            m::Owner::Storage(base_id) => self
                .ctx
                .db
                .storage_entry()
                .base_id()
                .filter(&base_id)
                .map(|e| entry_model(e.id, e.kind, e.target_id, e.tier, e.count))
                .collect(),
        }
    }

    fn insert_entry(&mut self, owner: m::Owner, entry: m::LedgerEntry) -> EngineResult<u64> {
        let id = match owner {
            m::Owner::Inventory(player_id) => {
                self.ctx
                    .db
                    .inventory_entry()
                    .insert(InventoryEntry {
                        id: 0,
                        player_id,
                        kind: entry.kind.as_u8(),
                        target_id: entry.target_id,
                        tier: entry.tier,
                        count: entry.count,
                    })
                    .id
            }
            m::Owner::Storage(base_id) => {
                self.ctx
                    .db
                    .storage_entry()
                    .insert(StorageEntry {
                        id: 0,
                        base_id,
                        kind: entry.kind.as_u8(),
                        target_id: entry.target_id,
                        tier: entry.tier,
                        count: entry.count,
                    })
                    .id
            }
        };
        Ok(id)
    }

    fn update_entry(&mut self, owner: m::Owner, entry: &m::LedgerEntry) -> EngineResult<()> {
        match owner {
            m::Owner::Inventory(player_id) => {
                let mut row = self
                    .ctx
                    .db
                    .inventory_entry()
                    .id()
                    .find(entry.id)
                    .filter(|r| r.player_id == player_id)
                    .ok_or_else(|| vanished("inventory entry", entry.id))?;
                row.count = entry.count;
                row.tier = entry.tier;
                self.ctx.db.inventory_entry().id().update(row);
            }
            m::Owner::Storage(base_id) => {
                let mut row = self
                    .ctx
                    .db
                    .storage_entry()
                    .id()
                    .find(entry.id)
                    .filter(|r| r.base_id == base_id)
                    .ok_or_else(|| vanished("storage entry", entry.id))?;
                row.count = entry.count;
                row.tier = entry.tier;
                self.ctx.db.storage_entry().id().update(row);
            }
        }
        Ok(())
    }

    fn delete_entry(&mut self, owner: m::Owner, id: u64) -> EngineResult<()> {
        let deleted = match owner {
            m::Owner::Inventory(player_id) => {
                self.ctx
                    .db
                    .inventory_entry()
                    .id()
                    .find(id)
                    .is_some_and(|r| r.player_id == player_id)
                    && self.ctx.db.inventory_entry().id().delete(id)
            }
            m::Owner::Storage(base_id) => {
                self.ctx
                    .db
                    .storage_entry()
                    .id()
                    .find(id)
                    .is_some_and(|r| r.base_id == base_id)
                    && self.ctx.db.storage_entry().id().delete(id)
            }
        };
        if deleted {
            Ok(())
        } else {
            Err(vanished("entry", id))
        }
    }

    // ── Farm sessions ──

    fn session(&self, id: u64) -> EngineResult<Option<m::FarmSession>> {
        self.ctx.db.farm_session().id().find(id).map(session_model).transpose()
    }

    fn active_session(&self, player_id: u64, map_id: u64) -> EngineResult<Option<m::FarmSession>> {
        let in_progress = m::SessionStatus::InProgress.as_u8();
        self.ctx
            .db
            .farm_session()
            .player_id()
            .filter(&player_id)
            .find(|s| s.map_id == map_id && s.status == in_progress)
            .map(session_model)
            .transpose()
    }

    fn insert_session(&mut self, session: m::FarmSession) -> EngineResult<u64> {
        let mut row = session_row(&session);
        row.id = 0;
        Ok(self.ctx.db.farm_session().insert(row).id)
    }

    fn update_session(&mut self, session: &m::FarmSession) -> EngineResult<()> {
        if self.ctx.db.farm_session().id().find(session.id).is_none() {
            return Err(vanished("farm session", session.id));
        }
        self.ctx.db.farm_session().id().update(session_row(session));
        Ok(())
    }

    // ── Deferred jobs ──

    fn enqueue_job(&mut self, topic: &str, payload: String, due_at: Micros) -> EngineResult<u64> {
        Ok(self
            .ctx
            .db
            .deferred_job()
            .insert(DeferredJob {
                id: 0,
                topic: topic.to_string(),
                payload,
                due_at,
                attempts: 0,
            })
            .id)
    }

    fn job(&self, id: u64) -> EngineResult<Option<m::DeferredJob>> {
        Ok(self.ctx.db.deferred_job().id().find(id).map(job_model))
    }

    fn due_jobs(&self, now: Micros, limit: usize) -> EngineResult<Vec<m::DeferredJob>> {
        let mut due: Vec<m::DeferredJob> = self
            .ctx
            .db
            .deferred_job()
            .due_at()
            .filter(..=now)
            .map(job_model)
            .collect();
        due.sort_by_key(|j| (j.due_at, j.id));
        due.truncate(limit);
        Ok(due)
    }

    fn delete_job(&mut self, id: u64) -> EngineResult<()> {
        self.ctx.db.deferred_job().id().delete(id);
        Ok(())
    }

    fn reschedule_job(&mut self, id: u64, due_at: Micros, attempts: u32) -> EngineResult<()> {
        let mut job = self
            .ctx
            .db
            .deferred_job()
            .id()
            .find(id)
            .ok_or_else(|| vanished("job", id))?;
        job.due_at = due_at;
        job.attempts = attempts;
        self.ctx.db.deferred_job().id().update(job);
        Ok(())
    }
}
