//! Economy operations — transfers between inventory and base storage,
//! crafting, discarding, and building a base.
//!
//! Each operation runs in one unit of work and validates fully before it
//! writes anything.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::constants::{building_types, object_kinds, tiers, RESOURCE_STACK_LIMIT};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{
    adjust, move_entry, move_quantity, take_from_entry, Container, Direction, Inventory,
    MoveOutcome, Storage,
};
use crate::model::{
    BuildingCost, EntryKind, MapObject, Player, PlayerBase, RecipeLine, StackKey,
};
use crate::placement::{check_bounds, first_collision, Rect};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    ToStorage,
    FromStorage,
}

impl TransferDirection {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::ToStorage),
            1 => Some(Self::FromStorage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemLocation {
    Inventory,
    Storage,
}

impl ItemLocation {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::Inventory),
            1 => Some(Self::Storage),
            _ => None,
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Largest stack for `key`: unbounded for resources, `max_count` for items.
fn stack_limit<S: Store>(s: &S, key: StackKey) -> EngineResult<u32> {
    match key.kind {
        EntryKind::Resource => Ok(RESOURCE_STACK_LIMIT),
        EntryKind::Item => Ok(s.require_item(key.target_id)?.max_count),
    }
}

fn own_base<S: Store>(s: &S, player: &Player) -> EngineResult<PlayerBase> {
    s.base_of(player.id, player.map_id)?
        .ok_or_else(|| EngineError::not_found(format!("base of player #{}", player.id)))
}

/// The player's base, provided the player is standing on it.
fn base_in_reach<S: Store>(s: &S, player: &Player) -> EngineResult<PlayerBase> {
    let base = own_base(s, player)?;
    if player.map_object_id != Some(base.map_object_id) {
        return Err(EngineError::precondition("player is not at the base"));
    }
    Ok(base)
}

fn covers(inventory: &Inventory, lines: &[RecipeLine]) -> bool {
    lines.iter().all(|line| {
        inventory.entry_set().quantity(StackKey::resource(line.resource_id)) >= line.quantity as u64
    })
}

fn pay(inventory: &mut Inventory, lines: &[RecipeLine]) -> EngineResult<()> {
    for line in lines {
        adjust(
            inventory,
            StackKey::resource(line.resource_id),
            line.quantity,
            Direction::Decrease,
            RESOURCE_STACK_LIMIT,
        )?;
    }
    Ok(())
}

fn cost_lines(costs: &[BuildingCost]) -> Vec<RecipeLine> {
    costs
        .iter()
        .map(|c| RecipeLine {
            resource_id: c.resource_id,
            quantity: c.quantity,
        })
        .collect()
}

// ── Transfers ───────────────────────────────────────────────────────────

/// Move `count` units of a resource between the player's inventory and the
/// storage of the base the player stands on.
pub fn transfer_resource<S: Store>(
    store: &mut S,
    player_id: u64,
    resource_id: u64,
    count: u32,
    direction: TransferDirection,
) -> EngineResult<()> {
    store.unit_of_work(|s| {
        let player = s.require_player(player_id)?;
        let base = base_in_reach(s, &player)?;
        s.require_resource(resource_id)?;

        let mut inventory = Inventory::load(s, &player)?;
        let mut storage = Storage::load(s, &base)?;
        let key = StackKey::resource(resource_id);
        match direction {
            TransferDirection::ToStorage => {
                move_quantity(&mut inventory, key, count, RESOURCE_STACK_LIMIT, &mut storage)?
            }
            TransferDirection::FromStorage => {
                move_quantity(&mut storage, key, count, RESOURCE_STACK_LIMIT, &mut inventory)?
            }
        }
        s.save_container(&inventory)?;
        s.save_container(&storage)?;
        log::debug!(
            "player #{} moved {} of resource #{} {:?}",
            player.id,
            count,
            resource_id,
            direction
        );
        Ok(())
    })
}

/// Move `count` units of one inventory or storage entry to the other side.
pub fn transfer_item<S: Store>(
    store: &mut S,
    player_id: u64,
    entry_id: u64,
    count: u32,
    direction: TransferDirection,
) -> EngineResult<MoveOutcome> {
    store.unit_of_work(|s| {
        let player = s.require_player(player_id)?;
        let base = base_in_reach(s, &player)?;

        let mut inventory = Inventory::load(s, &player)?;
        let mut storage = Storage::load(s, &base)?;
        let (source, target): (&mut dyn Container, &mut dyn Container) = match direction {
            TransferDirection::ToStorage => (&mut inventory, &mut storage),
            TransferDirection::FromStorage => (&mut storage, &mut inventory),
        };
        let key = source
            .list()
            .iter()
            .find(|e| e.id == entry_id)
            .map(|e| e.key())
            .ok_or_else(|| EngineError::not_found(format!("entry #{}", entry_id)))?;
        let limit = stack_limit(s, key)?;
        let outcome = move_entry(source, entry_id, count, limit, target)?;

        s.save_container(&inventory)?;
        s.save_container(&storage)?;
        Ok(outcome)
    })
}

// ── Crafting and discarding ─────────────────────────────────────────────

/// Craft one unit of `item_id` from inventory resources.
pub fn craft_item<S: Store>(store: &mut S, player_id: u64, item_id: u64) -> EngineResult<()> {
    store.unit_of_work(|s| {
        let player = s.require_player(player_id)?;
        let item = s.require_item(item_id)?;
        let mut inventory = Inventory::load(s, &player)?;
        if !covers(&inventory, &item.recipe) {
            return Err(EngineError::precondition(format!(
                "Not enough resources to craft {}",
                item.name
            )));
        }
        // capacity first so a full inventory never consumes resources
        adjust(
            &mut inventory,
            StackKey::item(item.id, tiers::BASIC),
            1,
            Direction::Increase,
            item.max_count,
        )?;
        pay(&mut inventory, &item.recipe)?;
        s.save_container(&inventory)?;
        log::info!("player #{} crafted {}", player.id, item.name);
        Ok(())
    })
}

/// Throw away `count` units of an entry the player owns.
pub fn discard_entry<S: Store>(
    store: &mut S,
    player_id: u64,
    location: ItemLocation,
    entry_id: u64,
    count: u32,
) -> EngineResult<()> {
    store.unit_of_work(|s| {
        let player = s.require_player(player_id)?;
        let mut container: Box<dyn Container> = match location {
            ItemLocation::Inventory => Box::new(Inventory::load(s, &player)?),
            ItemLocation::Storage => Box::new(Storage::load(s, &own_base(s, &player)?)?),
        };
        take_from_entry(container.as_mut(), entry_id, count)?;
        s.save_container(container.as_ref())?;
        log::debug!("player #{} discarded {} from entry #{}", player.id, count, entry_id);
        Ok(())
    })
}

// ── Buildings ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostLine {
    pub resource_id: u64,
    pub required: u32,
    pub available: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingQuote {
    pub building_type: String,
    pub lines: Vec<CostLine>,
    pub affordable: bool,
}

pub fn building_quote<S: Store>(store: &S, player_id: u64, building_type: &str) -> EngineResult<BuildingQuote> {
    let player = store.require_player(player_id)?;
    let costs = store.building_costs(building_type)?;
    if costs.is_empty() {
        return Err(EngineError::not_found(format!("building type '{}'", building_type)));
    }
    let inventory = Inventory::load(store, &player)?;
    let lines: Vec<CostLine> = costs
        .iter()
        .map(|c| CostLine {
            resource_id: c.resource_id,
            required: c.quantity,
            available: inventory.entry_set().quantity(StackKey::resource(c.resource_id)),
        })
        .collect();
    let affordable = lines.iter().all(|l| l.available >= l.required as u64);
    Ok(BuildingQuote {
        building_type: building_type.to_string(),
        lines,
        affordable,
    })
}

/// Found the player's base at `(x, y)` on the player's map.
pub fn build_base<S: Store>(
    store: &mut S,
    config: &EngineConfig,
    player_id: u64,
    x: u32,
    y: u32,
) -> EngineResult<PlayerBase> {
    store.unit_of_work(|s| {
        let player = s.require_player(player_id)?;
        if !player.status.is_idle() {
            return Err(EngineError::precondition(format!(
                "player is busy ({})",
                player.status.label()
            )));
        }
        if s.base_of(player.id, player.map_id)?.is_some() {
            return Err(EngineError::conflict("player already has a base on this map"));
        }

        let costs = cost_lines(&s.building_costs(building_types::BASE)?);
        let mut inventory = Inventory::load(s, &player)?;
        if !covers(&inventory, &costs) {
            return Err(EngineError::precondition("Not enough resources to build a base"));
        }

        let map = s.require_map(player.map_id)?;
        let rect = Rect::square(x, y, config.base_footprint);
        check_bounds(&map, &rect)?;
        if let Some(hit) = first_collision(&s.placements_on(map.id)?, &rect) {
            log::debug!("base at ({}, {}) collides with object #{}", x, y, hit.map_object_id);
            return Err(EngineError::conflict("The place is already taken"));
        }

        let map_object_id = s.insert_map_object(
            MapObject {
                id: 0,
                map_id: map.id,
                name: format!("{} base", player.name),
                kind: object_kinds::BASE.to_string(),
                is_farmable: false,
            },
            Some(rect),
        )?;
        let mut base = PlayerBase {
            id: 0,
            owner_id: player.id,
            map_id: map.id,
            map_object_id,
        };
        base.id = s.insert_base(base.clone())?;

        pay(&mut inventory, &costs)?;
        s.save_container(&inventory)?;
        log::info!("player #{} built a base at ({}, {}) on map #{}", player.id, x, y, map.id);
        Ok(base)
    })
}
