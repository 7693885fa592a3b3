//! Integration tests for the economy and session core.
//!
//! Exercises: catalog seed → join → travel → farm → dispatch → ledger,
//! plus base building, transfers, crafting and restart survival.
//!
//! All tests are pure logic — no SpacetimeDB, everything runs against the
//! in-memory store.

use std::sync::{Arc, Mutex};
use std::thread;

use homestead_logic::catalog::{seed, Catalog, SeedIds};
use homestead_logic::config::EngineConfig;
use homestead_logic::constants::{topics, Micros, MICROS_PER_MINUTE, MICROS_PER_SECOND};
use homestead_logic::dispatch::{Delivery, Dispatcher};
use homestead_logic::economy::{
    build_base, building_quote, craft_item, discard_entry, transfer_item, transfer_resource,
    ItemLocation, TransferDirection,
};
use homestead_logic::error::ErrorKind;
use homestead_logic::farm::{
    complete_farming, completion_handler, farm_yield, start_farming, stop_farming, Completion,
    FarmRequest,
};
use homestead_logic::ledger::{adjust, resource_limit, Direction, Inventory};
use homestead_logic::memory::MemoryStore;
use homestead_logic::model::{
    EntryKind, GameMap, Owner, Player, PlayerBase, PlayerStatus, SessionStatus, StackKey,
};
use homestead_logic::notify::RecordingNotifier;
use homestead_logic::player::{join, player_overview, travel};
use homestead_logic::regen::regenerate_players;
use homestead_logic::store::Store;

const T0: Micros = 1_700_000_000 * MICROS_PER_SECOND;

// ── Helpers ────────────────────────────────────────────────────────────

struct World {
    store: MemoryStore,
    config: EngineConfig,
    ids: SeedIds,
}

fn world() -> World {
    let mut store = MemoryStore::new();
    let ids = seed(&mut store, &Catalog::bundled().unwrap()).unwrap();
    World {
        store,
        config: EngineConfig::default(),
        ids,
    }
}

impl World {
    fn valley(&self) -> u64 {
        self.ids.map("valley").unwrap()
    }

    fn wood(&self) -> u64 {
        self.ids.resource("wood").unwrap()
    }

    fn stone(&self) -> u64 {
        self.ids.resource("stone").unwrap()
    }

    fn join(&mut self, external_id: &str, map_id: u64) -> Player {
        join(&mut self.store, &self.config, external_id, external_id, map_id).unwrap()
    }

    /// A fresh player standing in the forest.
    fn forester(&mut self) -> Player {
        let valley = self.valley();
        let player = self.join("forester", valley);
        let forest = self.ids.object("old_forest").unwrap();
        travel(&mut self.store, player.id, forest).unwrap()
    }

    fn give(&mut self, player_id: u64, resource_id: u64, count: u32) {
        let player = self.store.require_player(player_id).unwrap();
        let mut inventory = Inventory::load(&self.store, &player).unwrap();
        adjust(
            &mut inventory,
            StackKey::resource(resource_id),
            count,
            Direction::Increase,
            resource_limit(),
        )
        .unwrap();
        self.store.save_container(&inventory).unwrap();
    }

    fn held(&self, owner: Owner, key: StackKey) -> u64 {
        self.store
            .entries(owner)
            .unwrap()
            .iter()
            .filter(|e| e.key() == key)
            .map(|e| e.count as u64)
            .sum()
    }

    fn player(&self, id: u64) -> Player {
        self.store.require_player(id).unwrap()
    }

    fn dispatch(&mut self, notifier: &mut RecordingNotifier, now: Micros) -> usize {
        let mut dispatcher = Dispatcher::new(&self.config);
        dispatcher.subscribe(topics::FARM_COMPLETE, completion_handler(notifier));
        dispatcher.dispatch_due(&mut self.store, now).unwrap().completed
    }

    /// Empty 222×111 map with one player holding enough for a base.
    fn empty_map_with_builder(&mut self, external_id: &str) -> (u64, Player) {
        let map = self
            .store
            .insert_map(GameMap {
                id: 0,
                name: "Empty".into(),
                width: 222,
                height: 111,
            })
            .unwrap();
        let player = self.join(external_id, map);
        let (wood, stone) = (self.wood(), self.stone());
        self.give(player.id, wood, 10);
        self.give(player.id, stone, 5);
        (map, player)
    }

    fn builder_on(&mut self, map: u64, external_id: &str) -> Player {
        let player = self.join(external_id, map);
        let (wood, stone) = (self.wood(), self.stone());
        self.give(player.id, wood, 10);
        self.give(player.id, stone, 5);
        player
    }
}

fn one_minute() -> FarmRequest {
    FarmRequest {
        duration_minutes: 1,
        energy_cost: 5,
    }
}

// ── Farming ────────────────────────────────────────────────────────────

#[test]
fn start_deducts_energy_and_books_session() {
    let mut w = world();
    let player = w.forester();
    let ticket = start_farming(&mut w.store, player.id, one_minute(), T0).unwrap();

    let player = w.player(player.id);
    assert_eq!(player.energy, 95);
    assert_eq!(player.status, PlayerStatus::Farming);
    assert_eq!(ticket.session.status, SessionStatus::InProgress);
    assert_eq!(ticket.session.end_time, T0 + MICROS_PER_MINUTE);
    assert_eq!(ticket.total_seconds, 60);
    assert_eq!(ticket.seconds_passed, 0);

    let jobs = w.store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, ticket.job_id);
    assert_eq!(jobs[0].due_at, ticket.session.end_time);
}

#[test]
fn dispatcher_completes_session_and_grants_yield() {
    let mut w = world();
    let player = w.forester();
    let ticket = start_farming(&mut w.store, player.id, one_minute(), T0).unwrap();
    let mut notifier = RecordingNotifier::default();

    assert_eq!(w.dispatch(&mut notifier, T0 + 59 * MICROS_PER_SECOND), 0);
    assert_eq!(w.dispatch(&mut notifier, T0 + MICROS_PER_MINUTE), 1);

    let player = w.player(player.id);
    assert_eq!(player.status, PlayerStatus::Waiting);
    let session = w.store.session(ticket.session.id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    let wood = StackKey::resource(w.wood());
    assert_eq!(w.held(Owner::Inventory(player.id), wood), farm_yield(1) as u64);
    assert_eq!(notifier.messages_for("forester").len(), 1);
    assert!(w.store.jobs().is_empty());
}

#[test]
fn completion_is_idempotent() {
    let mut w = world();
    let player = w.forester();
    let ticket = start_farming(&mut w.store, player.id, FarmRequest::for_minutes(&w.config, 5), T0)
        .unwrap();
    let mut notifier = RecordingNotifier::default();

    let first = complete_farming(&mut w.store, &mut notifier, ticket.session.id).unwrap();
    assert_eq!(
        first,
        Completion::Granted {
            player_id: player.id,
            resource_id: w.wood(),
            amount: 10,
        }
    );
    let snapshot = w.store.snapshot_json().unwrap();

    let second = complete_farming(&mut w.store, &mut notifier, ticket.session.id).unwrap();
    assert_eq!(second, Completion::AlreadyCompleted);
    assert_eq!(w.store.snapshot_json().unwrap(), snapshot);
    assert_eq!(notifier.sent.len(), 1);

    // the queued job is still delivered and finds nothing to do
    assert_eq!(w.dispatch(&mut notifier, T0 + 5 * MICROS_PER_MINUTE), 1);
    let wood = StackKey::resource(w.wood());
    assert_eq!(w.held(Owner::Inventory(player.id), wood), 10);
}

#[test]
fn missing_session_is_benign_for_dispatcher() {
    let mut w = world();
    w.store
        .enqueue_job(topics::FARM_COMPLETE, r#"{"session_id":999,"total_minutes":1}"#.into(), T0)
        .unwrap();
    w.store
        .enqueue_job(topics::FARM_COMPLETE, "not json".into(), T0)
        .unwrap();
    let mut notifier = RecordingNotifier::default();
    let mut dispatcher = Dispatcher::new(&w.config);
    dispatcher.subscribe(topics::FARM_COMPLETE, completion_handler(&mut notifier));
    let report = dispatcher.dispatch_due(&mut w.store, T0).unwrap();
    assert_eq!(report.discarded, 2);
    assert!(w.store.jobs().is_empty());
}

#[test]
fn early_stop_grants_elapsed_minutes_only() {
    let mut w = world();
    let player = w.forester();
    start_farming(&mut w.store, player.id, FarmRequest::for_minutes(&w.config, 10), T0).unwrap();

    let outcome = stop_farming(&mut w.store, player.id, T0 + 3 * MICROS_PER_MINUTE + 30 * MICROS_PER_SECOND)
        .unwrap();
    assert_eq!(outcome.minutes_farmed, 3);
    assert_eq!(outcome.granted, farm_yield(3));
    assert_eq!(w.player(player.id).status, PlayerStatus::Waiting);

    // the pending job must not grant the full run afterwards
    let mut notifier = RecordingNotifier::default();
    w.dispatch(&mut notifier, T0 + 10 * MICROS_PER_MINUTE);
    let wood = StackKey::resource(w.wood());
    assert_eq!(w.held(Owner::Inventory(player.id), wood), farm_yield(3) as u64);
    assert!(notifier.sent.is_empty());
}

#[test]
fn stop_within_first_minute_grants_nothing() {
    let mut w = world();
    let player = w.forester();
    start_farming(&mut w.store, player.id, one_minute(), T0).unwrap();
    let outcome = stop_farming(&mut w.store, player.id, T0 + 20 * MICROS_PER_SECOND).unwrap();
    assert_eq!(outcome.granted, 0);
    assert!(w.store.entries(Owner::Inventory(player.id)).unwrap().is_empty());

    let err = stop_farming(&mut w.store, player.id, T0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[test]
fn start_rejections_leave_player_untouched() {
    let mut w = world();
    let player = w.forester();

    let err = start_farming(
        &mut w.store,
        player.id,
        FarmRequest {
            duration_minutes: 1,
            energy_cost: 101,
        },
        T0,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(w.player(player.id), player);
    assert!(w.store.jobs().is_empty());

    let err = start_farming(
        &mut w.store,
        player.id,
        FarmRequest {
            duration_minutes: 0,
            energy_cost: 0,
        },
        T0,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    start_farming(&mut w.store, player.id, one_minute(), T0).unwrap();
    let err = start_farming(&mut w.store, player.id, one_minute(), T0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[test]
fn settlement_is_not_farmable() {
    let mut w = world();
    let valley = w.valley();
    let player = w.join("visitor", valley);
    let err = start_farming(&mut w.store, player.id, one_minute(), T0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    let crossroads = w.ids.object("crossroads").unwrap();
    travel(&mut w.store, player.id, crossroads).unwrap();
    let err = start_farming(&mut w.store, player.id, one_minute(), T0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(w.player(player.id).energy, 100);
}

#[test]
fn offline_notifier_does_not_fail_completion() {
    let mut w = world();
    let player = w.forester();
    start_farming(&mut w.store, player.id, one_minute(), T0).unwrap();
    let mut notifier = RecordingNotifier {
        offline: true,
        ..Default::default()
    };
    assert_eq!(w.dispatch(&mut notifier, T0 + MICROS_PER_MINUTE), 1);
    assert_eq!(w.player(player.id).status, PlayerStatus::Waiting);
}

// ── Durability ─────────────────────────────────────────────────────────

#[test]
fn pending_completion_survives_restart() {
    let mut w = world();
    let player = w.forester();
    let ticket = start_farming(&mut w.store, player.id, one_minute(), T0).unwrap();

    let json = w.store.snapshot_json().unwrap();
    w.store = MemoryStore::restore_json(&json).unwrap();

    let mut notifier = RecordingNotifier::default();
    assert_eq!(w.dispatch(&mut notifier, T0 + MICROS_PER_MINUTE), 1);
    let session = w.store.session(ticket.session.id).unwrap().unwrap();
    assert!(session.is_completed());
}

#[test]
fn storage_fault_redelivers_and_grants_once() {
    let mut w = world();
    let player = w.forester();
    start_farming(&mut w.store, player.id, one_minute(), T0).unwrap();
    let mut notifier = RecordingNotifier::default();

    // first write inside the handler fails; the whole completion rolls back
    w.store.inject_faults(1);
    let mut dispatcher = Dispatcher::new(&w.config);
    dispatcher.subscribe(topics::FARM_COMPLETE, completion_handler(&mut notifier));
    let report = dispatcher
        .dispatch_due(&mut w.store, T0 + MICROS_PER_MINUTE)
        .unwrap();
    drop(dispatcher);
    assert_eq!(report.retried, 1);
    assert_eq!(w.player(player.id).status, PlayerStatus::Farming);
    assert!(notifier.sent.is_empty());

    let retry_at = T0 + MICROS_PER_MINUTE + w.config.retry_backoff_micros();
    assert_eq!(w.dispatch(&mut notifier, retry_at), 1);
    let wood = StackKey::resource(w.wood());
    assert_eq!(w.held(Owner::Inventory(player.id), wood), farm_yield(1) as u64);
    assert_eq!(notifier.sent.len(), 1);
}

#[test]
fn claimed_completion_faults_alone_and_grants_once() {
    let mut store = MemoryStore::without_savepoints();
    let ids = seed(&mut store, &Catalog::bundled().unwrap()).unwrap();
    let mut w = World {
        store,
        config: EngineConfig::default(),
        ids,
    };
    let player = w.forester();
    start_farming(&mut w.store, player.id, one_minute(), T0).unwrap();
    let mut notifier = RecordingNotifier::default();
    let due = T0 + MICROS_PER_MINUTE;
    let retry_at = due + w.config.retry_backoff_micros();

    {
        let mut dispatcher = Dispatcher::new(&w.config);
        dispatcher.subscribe(topics::FARM_COMPLETE, completion_handler(&mut notifier));

        let claim = w.store.transaction(|s| dispatcher.claim_due(s, due)).unwrap();
        assert_eq!(claim.jobs.len(), 1);
        w.store.inject_faults(1);
        let err = w
            .store
            .transaction(|s| dispatcher.deliver(s, &claim.jobs[0], due))
            .unwrap_err();
        assert!(err.is_retryable());

        // the claim outlived the rollback: nothing to claim until the backoff passes
        assert!(w.store.transaction(|s| dispatcher.claim_due(s, due)).unwrap().jobs.is_empty());

        let claim = w.store.transaction(|s| dispatcher.claim_due(s, retry_at)).unwrap();
        assert_eq!(claim.jobs[0].attempts, 2);
        let delivery = w
            .store
            .transaction(|s| dispatcher.deliver(s, &claim.jobs[0], retry_at))
            .unwrap();
        assert_eq!(delivery, Delivery::Completed);
    }

    assert!(w.store.jobs().is_empty());
    assert_eq!(w.player(player.id).status, PlayerStatus::Waiting);
    let wood = StackKey::resource(w.wood());
    assert_eq!(w.held(Owner::Inventory(player.id), wood), farm_yield(1) as u64);
    assert_eq!(notifier.sent.len(), 1);
}

// ── Regeneration ───────────────────────────────────────────────────────

#[test]
fn only_players_resting_at_home_regenerate() {
    let mut w = world();
    let (map, builder) = w.empty_map_with_builder("builder");
    let base = build_base(&mut w.store, &w.config, builder.id, 1, 1).unwrap();
    let mut resting = travel(&mut w.store, builder.id, base.map_object_id).unwrap();
    resting.energy = 40;
    w.store.update_player(&resting).unwrap();

    let mut idle = w.join("idle", map);
    idle.energy = 40;
    w.store.update_player(&idle).unwrap();

    let changed = regenerate_players(&mut w.store, w.config.regen_rule()).unwrap();
    assert_eq!(changed, 1);
    assert_eq!(w.player(resting.id).energy, 41);
    assert_eq!(w.player(resting.id).health, 100);
    assert_eq!(w.player(idle.id).energy, 40);
}

// ── Bases and placement ────────────────────────────────────────────────

#[test]
fn second_base_on_same_spot_conflicts() {
    let mut w = world();
    let (map, first) = w.empty_map_with_builder("first");
    let base = build_base(&mut w.store, &w.config, first.id, 1, 1).unwrap();
    let object = w.store.map_object(base.map_object_id).unwrap().unwrap();
    assert_eq!(object.name, "first base");
    assert_eq!(object.kind, "base");

    let second = w.builder_on(map, "second");
    let err = build_base(&mut w.store, &w.config, second.id, 1, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("The place is already taken"));

    // neighbouring cell is fine
    build_base(&mut w.store, &w.config, second.id, 3, 1).unwrap();
}

#[test]
fn base_rules() {
    let mut w = world();
    let (map, player) = w.empty_map_with_builder("builder");
    let wood = StackKey::resource(w.wood());

    let err = build_base(&mut w.store, &w.config, player.id, 222, 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
    assert_eq!(w.held(Owner::Inventory(player.id), wood), 10);

    build_base(&mut w.store, &w.config, player.id, 5, 5).unwrap();
    assert_eq!(w.held(Owner::Inventory(player.id), wood), 0);
    let err = build_base(&mut w.store, &w.config, player.id, 50, 50).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let poor = w.join("poor", map);
    let err = build_base(&mut w.store, &w.config, poor.id, 50, 50).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert!(w.store.base_of(poor.id, map).unwrap().is_none());
}

#[test]
fn quote_reports_affordability() {
    let mut w = world();
    let (map, player) = w.empty_map_with_builder("builder");
    let quote = building_quote(&w.store, player.id, "base").unwrap();
    assert!(quote.affordable);
    assert_eq!(quote.lines.len(), 2);

    let poor = w.join("poor", map);
    assert!(!building_quote(&w.store, poor.id, "base").unwrap().affordable);
    let err = building_quote(&w.store, poor.id, "castle").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn concurrent_overlapping_placements_serialize() {
    let mut w = world();
    let (map, first) = w.empty_map_with_builder("first");
    let second = w.builder_on(map, "second");
    let config = w.config.clone();
    let store = Arc::new(Mutex::new(w.store));

    let handles: Vec<_> = [(first.id, 10, 10), (second.id, 11, 11)]
        .into_iter()
        .map(|(player_id, x, y)| {
            let store = Arc::clone(&store);
            let config = config.clone();
            thread::spawn(move || {
                let mut guard = store.lock().unwrap();
                build_base(&mut *guard, &config, player_id, x, y)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let built = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(built, 1);
    let err = results.into_iter().find_map(|r| r.err()).unwrap();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.lock().unwrap().placements_on(map).unwrap().len(), 1);
}

// ── Transfers ──────────────────────────────────────────────────────────

/// Player with a base, standing on it, 10 wood left in the inventory.
fn at_home(w: &mut World) -> (Player, PlayerBase) {
    let (_, player) = w.empty_map_with_builder("homebody");
    let base = build_base(&mut w.store, &w.config, player.id, 1, 1).unwrap();
    let wood = w.wood();
    w.give(player.id, wood, 10);
    let player = travel(&mut w.store, player.id, base.map_object_id).unwrap();
    (player, base)
}

#[test]
fn transfer_eight_of_ten_wood() {
    let mut w = world();
    let (player, base) = at_home(&mut w);
    let wood_id = w.wood();
    let wood = StackKey::resource(wood_id);

    transfer_resource(&mut w.store, player.id, wood_id, 8, TransferDirection::ToStorage).unwrap();
    assert_eq!(w.held(Owner::Inventory(player.id), wood), 2);
    assert_eq!(w.held(Owner::Storage(base.id), wood), 8);

    let err = transfer_resource(&mut w.store, player.id, wood_id, 11, TransferDirection::ToStorage)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(w.held(Owner::Inventory(player.id), wood), 2);
    assert_eq!(w.held(Owner::Storage(base.id), wood), 8);

    transfer_resource(&mut w.store, player.id, wood_id, 8, TransferDirection::FromStorage).unwrap();
    assert_eq!(w.held(Owner::Inventory(player.id), wood), 10);
    assert!(w.store.entries(Owner::Storage(base.id)).unwrap().is_empty());
}

#[test]
fn transfers_need_player_at_base() {
    let mut w = world();
    let (player, _) = at_home(&mut w);
    let elsewhere = w
        .store
        .insert_map_object(
            homestead_logic::model::MapObject {
                id: 0,
                map_id: player.map_id,
                name: "Hill".into(),
                kind: "quarry".into(),
                is_farmable: false,
            },
            None,
        )
        .unwrap();
    travel(&mut w.store, player.id, elsewhere).unwrap();
    let wood_id = w.wood();
    let err = transfer_resource(&mut w.store, player.id, wood_id, 1, TransferDirection::ToStorage)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    let valley = w.valley();
    let homeless = w.join("homeless", valley);
    let err = transfer_resource(&mut w.store, homeless.id, wood_id, 1, TransferDirection::ToStorage)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn item_transfers_conserve_counts() {
    let mut w = world();
    let (player, base) = at_home(&mut w);
    let torch = w.ids.item("torch").unwrap();
    for _ in 0..4 {
        craft_item(&mut w.store, player.id, torch).unwrap();
    }
    let key = StackKey::item(torch, 1);
    let entry = w.store.entries(Owner::Inventory(player.id)).unwrap()
        .into_iter()
        .find(|e| e.kind == EntryKind::Item)
        .unwrap();
    assert_eq!(entry.count, 4);

    transfer_item(&mut w.store, player.id, entry.id, 3, TransferDirection::ToStorage).unwrap();
    assert_eq!(w.held(Owner::Inventory(player.id), key), 1);
    assert_eq!(w.held(Owner::Storage(base.id), key), 3);

    let stored = w.store.entries(Owner::Storage(base.id)).unwrap()[0].clone();
    let err = transfer_item(&mut w.store, player.id, stored.id, 4, TransferDirection::FromStorage)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    transfer_item(&mut w.store, player.id, stored.id, 3, TransferDirection::FromStorage).unwrap();
    assert_eq!(w.held(Owner::Inventory(player.id), key), 4);
    assert_eq!(w.store.entries(Owner::Inventory(player.id)).unwrap().iter().filter(|e| e.kind == EntryKind::Item).count(), 1);
}

// ── Crafting and discarding ────────────────────────────────────────────

#[test]
fn crafting_consumes_recipe() {
    let mut w = world();
    let valley = w.valley();
    let player = w.join("crafter", valley);
    let (wood, stone) = (w.wood(), w.stone());
    w.give(player.id, wood, 3);
    w.give(player.id, stone, 2);
    let axe = w.ids.item("axe").unwrap();

    craft_item(&mut w.store, player.id, axe).unwrap();
    assert_eq!(w.held(Owner::Inventory(player.id), StackKey::resource(wood)), 0);
    assert_eq!(w.held(Owner::Inventory(player.id), StackKey::item(axe, 1)), 1);

    let err = craft_item(&mut w.store, player.id, axe).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    let err = craft_item(&mut w.store, player.id, 9999).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn full_inventory_keeps_resources() {
    let mut w = world();
    let valley = w.valley();
    let mut player = w.join("crafter", valley);
    player.inventory_slots = 1;
    w.store.update_player(&player).unwrap();
    let wood = w.wood();
    w.give(player.id, wood, 8);
    let rod = w.ids.item("fishing_rod").unwrap();

    craft_item(&mut w.store, player.id, rod).unwrap();
    let err = craft_item(&mut w.store, player.id, rod).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert!(err.to_string().contains("Inventory is full"));
    assert_eq!(w.held(Owner::Inventory(player.id), StackKey::resource(wood)), 4);
}

#[test]
fn discard_removes_units() {
    let mut w = world();
    let valley = w.valley();
    let player = w.join("litterbug", valley);
    let wood = w.wood();
    w.give(player.id, wood, 5);
    let entry = w.store.entries(Owner::Inventory(player.id)).unwrap()[0].clone();

    let err = discard_entry(&mut w.store, player.id, ItemLocation::Inventory, entry.id, 6).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    discard_entry(&mut w.store, player.id, ItemLocation::Inventory, entry.id, 2).unwrap();
    assert_eq!(w.held(Owner::Inventory(player.id), StackKey::resource(wood)), 3);
    discard_entry(&mut w.store, player.id, ItemLocation::Inventory, entry.id, 3).unwrap();
    assert!(w.store.entries(Owner::Inventory(player.id)).unwrap().is_empty());

    let err = discard_entry(&mut w.store, player.id, ItemLocation::Storage, entry.id, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ── Overview ───────────────────────────────────────────────────────────

#[test]
fn overview_shows_running_session() {
    let mut w = world();
    let player = w.forester();
    start_farming(&mut w.store, player.id, FarmRequest::for_minutes(&w.config, 2), T0).unwrap();
    let overview = player_overview(&w.store, player.id, T0 + 30 * MICROS_PER_SECOND).unwrap();
    let progress = overview.session.unwrap();
    assert_eq!(progress.seconds_passed, 30);
    assert_eq!(progress.total_seconds, 120);
    assert_eq!(overview.player.status, PlayerStatus::Farming);
}
