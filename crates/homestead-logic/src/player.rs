//! Player lifecycle: joining a map, moving between map objects, and the
//! status snapshot shown to clients.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::constants::{Micros, STAT_MAX};
use crate::error::{EngineError, EngineResult};
use crate::model::{FarmSession, LedgerEntry, Owner, Player, PlayerStatus};
use crate::store::Store;

pub fn join<S: Store>(
    store: &mut S,
    config: &EngineConfig,
    external_id: &str,
    name: &str,
    map_id: u64,
) -> EngineResult<Player> {
    store.unit_of_work(|s| {
        s.require_map(map_id)?;
        if s.player_by_external(external_id, map_id)?.is_some() {
            return Err(EngineError::conflict(format!(
                "player {} already joined map #{}",
                external_id, map_id
            )));
        }
        let mut player = Player {
            id: 0,
            external_id: external_id.to_string(),
            name: name.to_string(),
            map_id,
            health: STAT_MAX,
            energy: STAT_MAX,
            status: PlayerStatus::Waiting,
            map_object_id: None,
            inventory_slots: config.default_inventory_slots,
        };
        player.id = s.insert_player(player.clone())?;
        log::info!("player #{} '{}' joined map #{}", player.id, player.name, map_id);
        Ok(player)
    })
}

/// Move the player onto another object of the same map. Arriving at one's
/// own base puts the player in recovery.
pub fn travel<S: Store>(store: &mut S, player_id: u64, map_object_id: u64) -> EngineResult<Player> {
    store.unit_of_work(|s| {
        let mut player = s.require_player(player_id)?;
        if !player.status.is_idle() {
            return Err(EngineError::precondition(format!(
                "player is busy ({})",
                player.status.label()
            )));
        }
        let object = s
            .map_object(map_object_id)?
            .filter(|o| o.map_id == player.map_id)
            .ok_or_else(|| EngineError::not_found(format!("map object #{}", map_object_id)))?;
        if player.map_object_id == Some(object.id) {
            return Err(EngineError::conflict("player is already at the destination"));
        }

        let at_home = s
            .base_of(player.id, player.map_id)?
            .is_some_and(|b| b.map_object_id == object.id);
        player.map_object_id = Some(object.id);
        player.status = if at_home {
            PlayerStatus::Recovery
        } else {
            PlayerStatus::Waiting
        };
        s.update_player(&player)?;
        log::debug!(
            "player #{} travelled to {} ({})",
            player.id,
            object.name,
            player.status.label()
        );
        Ok(player)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionProgress {
    pub session: FarmSession,
    pub seconds_passed: u64,
    pub total_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerOverview {
    pub player: Player,
    pub session: Option<SessionProgress>,
    pub inventory: Vec<LedgerEntry>,
    /// Empty when the player has no base on this map.
    pub storage: Vec<LedgerEntry>,
}

pub fn player_overview<S: Store>(store: &S, player_id: u64, now: Micros) -> EngineResult<PlayerOverview> {
    let player = store.require_player(player_id)?;
    let session = store
        .active_session(player.id, player.map_id)?
        .map(|session| SessionProgress {
            seconds_passed: session.seconds_passed(now),
            total_seconds: session.total_seconds(),
            session,
        });
    let inventory = store.entries(Owner::Inventory(player.id))?;
    let storage = match store.base_of(player.id, player.map_id)? {
        Some(base) => store.entries(Owner::Storage(base.id))?,
        None => Vec::new(),
    };
    Ok(PlayerOverview {
        player,
        session,
        inventory,
        storage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryStore;
    use crate::model::{GameMap, MapObject, PlayerBase};

    fn world() -> (MemoryStore, u64, u64, u64) {
        let mut store = MemoryStore::new();
        let map = store
            .insert_map(GameMap {
                id: 0,
                name: "Valley".into(),
                width: 222,
                height: 111,
            })
            .unwrap();
        let object = |name: &str, kind: &str| MapObject {
            id: 0,
            map_id: map,
            name: name.into(),
            kind: kind.into(),
            is_farmable: false,
        };
        let forest = store.insert_map_object(object("Forest", "forest"), None).unwrap();
        let home = store.insert_map_object(object("Ada base", "base"), None).unwrap();
        (store, map, forest, home)
    }

    #[test]
    fn test_join_defaults_and_duplicates() {
        let (mut store, map, _, _) = world();
        let config = EngineConfig::default();
        let player = join(&mut store, &config, "abc", "Ada", map).unwrap();
        assert_eq!((player.health, player.energy), (100, 100));
        assert_eq!(player.status, PlayerStatus::Waiting);
        assert_eq!(player.inventory_slots, config.default_inventory_slots);

        let err = join(&mut store, &config, "abc", "Ada again", map).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = join(&mut store, &config, "abc", "Ada", 999).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_travel_home_means_recovery() {
        let (mut store, map, forest, home) = world();
        let player = join(&mut store, &EngineConfig::default(), "abc", "Ada", map).unwrap();
        store
            .insert_base(PlayerBase {
                id: 0,
                owner_id: player.id,
                map_id: map,
                map_object_id: home,
            })
            .unwrap();

        let moved = travel(&mut store, player.id, forest).unwrap();
        assert_eq!(moved.status, PlayerStatus::Waiting);
        let moved = travel(&mut store, player.id, home).unwrap();
        assert_eq!(moved.status, PlayerStatus::Recovery);

        let err = travel(&mut store, player.id, home).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = travel(&mut store, player.id, 4040).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_busy_player_cannot_travel() {
        let (mut store, map, forest, _) = world();
        let mut player = join(&mut store, &EngineConfig::default(), "abc", "Ada", map).unwrap();
        player.status = PlayerStatus::Farming;
        store.update_player(&player).unwrap();
        let err = travel(&mut store, player.id, forest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn test_overview_without_base() {
        let (mut store, map, _, _) = world();
        let player = join(&mut store, &EngineConfig::default(), "abc", "Ada", map).unwrap();
        let overview = player_overview(&store, player.id, 0).unwrap();
        assert!(overview.session.is_none());
        assert!(overview.inventory.is_empty());
        assert!(overview.storage.is_empty());
    }
}
