//! Homestead Headless Harness
//!
//! Drives the economy end to end against the in-memory store: catalog seed,
//! farming through the job dispatcher, base building, transfers, crafting,
//! restart survival. No SpacetimeDB, no networking.
//!
//! Usage:
//!   cargo run -p homestead-simtest
//!   cargo run -p homestead-simtest -- --verbose
//!   cargo run -p homestead-simtest -- --config tuning.json --json

use std::path::PathBuf;

use homestead_logic::catalog::{seed, Catalog, SeedIds};
use homestead_logic::config::EngineConfig;
use homestead_logic::constants::{tiers, topics, Micros, MICROS_PER_MINUTE, MICROS_PER_SECOND};
use homestead_logic::dispatch::{DispatchReport, Dispatcher};
use homestead_logic::economy::{self, TransferDirection};
use homestead_logic::error::{EngineError, EngineResult};
use homestead_logic::farm::{self, farm_yield, FarmRequest};
use homestead_logic::ledger::{adjust, resource_limit, Direction, Inventory};
use homestead_logic::memory::MemoryStore;
use homestead_logic::model::{Owner, PlayerStatus, StackKey};
use homestead_logic::notify::RecordingNotifier;
use homestead_logic::player;
use homestead_logic::regen;
use homestead_logic::store::Store;
use serde::Serialize;

const T0: Micros = 1_700_000_000 * MICROS_PER_SECOND;

// ── Test harness ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn failed(name: &str, err: EngineError) -> TestResult {
    check(name, false, format!("engine error: {}", err))
}

struct Options {
    verbose: bool,
    json: bool,
    config: Option<PathBuf>,
}

fn parse_args() -> Options {
    let mut opts = Options {
        verbose: false,
        json: false,
        config: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--verbose" => opts.verbose = true,
            "--json" => opts.json = true,
            "--config" => opts.config = args.next().map(PathBuf::from),
            other => log::warn!("ignoring unknown argument '{}'", other),
        }
    }
    opts
}

fn main() {
    let opts = parse_args();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if opts.verbose {
        "debug"
    } else {
        "warn"
    }))
    .init();

    let config = match &opts.config {
        Some(path) => match EngineConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        },
        None => EngineConfig::default(),
    };

    if !opts.json {
        println!("=== Homestead Harness ===\n");
    }

    let mut results = Vec::new();

    // 1. Bundled catalog
    results.extend(validate_catalog());

    // 2. Full-length farm session through the dispatcher
    results.extend(scenario_full_session(&config));

    // 3. Early stop
    results.extend(scenario_early_stop(&config));

    // 4. Base, storage, crafting, regeneration
    results.extend(scenario_homestead(&config));

    // 5. Restart with a job in flight
    results.extend(scenario_restart(&config));

    // 6. Storage fault on delivery
    results.extend(scenario_fault_redelivery(&config));

    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    if opts.json {
        match serde_json::to_string_pretty(&results) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("failed to encode results: {}", e),
        }
    } else {
        for r in &results {
            let icon = if r.passed { "✓" } else { "✗" };
            if !r.passed || opts.verbose {
                println!("  {} {}: {}", icon, r.name, r.detail);
            }
        }
        println!(
            "\n=== RESULT: {}/{} passed, {} failed ===",
            passed,
            results.len(),
            failed
        );
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── World setup ─────────────────────────────────────────────────────────

struct World {
    store: MemoryStore,
    ids: SeedIds,
    notifier: RecordingNotifier,
}

fn world() -> EngineResult<World> {
    let mut store = MemoryStore::new();
    let ids = seed(&mut store, &Catalog::bundled()?)?;
    Ok(World {
        store,
        ids,
        notifier: RecordingNotifier::default(),
    })
}

impl World {
    fn dispatch(&mut self, config: &EngineConfig, now: Micros) -> EngineResult<DispatchReport> {
        let mut dispatcher = Dispatcher::new(config);
        dispatcher.subscribe(topics::FARM_COMPLETE, farm::completion_handler(&mut self.notifier));
        dispatcher.dispatch_due(&mut self.store, now)
    }

    fn held(&self, owner: Owner, resource_id: u64) -> EngineResult<u64> {
        Ok(self
            .store
            .entries(owner)?
            .iter()
            .filter(|e| e.key() == StackKey::resource(resource_id))
            .map(|e| e.count as u64)
            .sum())
    }

    fn give(&mut self, player_id: u64, resource_id: u64, count: u32) -> EngineResult<()> {
        let player = self.store.require_player(player_id)?;
        let mut inventory = Inventory::load(&self.store, &player)?;
        adjust(
            &mut inventory,
            StackKey::resource(resource_id),
            count,
            Direction::Increase,
            resource_limit(),
        )?;
        self.store.save_container(&inventory)
    }

    /// Join the valley and walk into `object`.
    fn arrive(&mut self, config: &EngineConfig, who: &str, object: &str) -> EngineResult<u64> {
        let valley = self.ids.map("valley")?;
        let joined = player::join(&mut self.store, config, who, who, valley)?;
        let object = self.ids.object(object)?;
        Ok(player::travel(&mut self.store, joined.id, object)?.id)
    }
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog() -> Vec<TestResult> {
    log::info!("--- Catalog ---");
    let catalog = match Catalog::bundled() {
        Ok(c) => c,
        Err(e) => return vec![failed("catalog_parse", e)],
    };
    let mut results = vec![check(
        "catalog_not_empty",
        !catalog.resources.is_empty() && !catalog.items.is_empty() && !catalog.maps.is_empty(),
        format!(
            "{} resources, {} items, {} maps",
            catalog.resources.len(),
            catalog.items.len(),
            catalog.maps.len()
        ),
    )];

    let mut store = MemoryStore::new();
    results.push(match seed(&mut store, &catalog) {
        Ok(ids) => check(
            "catalog_seeds",
            ids.objects.len() == catalog.maps.iter().map(|m| m.objects.len()).sum::<usize>(),
            format!("{} map objects placed", ids.objects.len()),
        ),
        Err(e) => failed("catalog_seeds", e),
    });
    results
}

// ── 2. Full session ─────────────────────────────────────────────────────

fn scenario_full_session(config: &EngineConfig) -> Vec<TestResult> {
    log::info!("--- Full farm session ---");
    match run_full_session(config) {
        Ok(results) => results,
        Err(e) => vec![failed("full_session", e)],
    }
}

fn run_full_session(config: &EngineConfig) -> EngineResult<Vec<TestResult>> {
    let mut w = world()?;
    let wood = w.ids.resource("wood")?;
    let player_id = w.arrive(config, "alice", "old_forest")?;
    let energy_before = w.store.require_player(player_id)?.energy;

    let ticket = farm::start_farming(
        &mut w.store,
        player_id,
        FarmRequest::for_minutes(config, 5),
        T0,
    )?;
    let mut results = vec![check(
        "energy_charged",
        w.store.require_player(player_id)?.energy as u32
            == energy_before as u32 - config.farm_energy_cost(5),
        format!("session #{} job #{}", ticket.session.id, ticket.job_id),
    )];

    let early = w.dispatch(config, T0 + 4 * MICROS_PER_MINUTE)?;
    results.push(check(
        "not_due_early",
        early.handled() == 0,
        format!("{:?}", early),
    ));

    let due = w.dispatch(config, T0 + 5 * MICROS_PER_MINUTE)?;
    let granted = w.held(Owner::Inventory(player_id), wood)?;
    results.push(check(
        "granted_on_completion",
        due.completed == 1 && granted == farm_yield(5) as u64,
        format!("{} wood after 5 min", granted),
    ));
    results.push(check(
        "player_notified",
        w.notifier.messages_for("alice").len() == 1,
        format!("{:?}", w.notifier.messages_for("alice")),
    ));

    let again = farm::complete_farming(&mut w.store, &mut w.notifier, ticket.session.id)?;
    results.push(check(
        "completion_idempotent",
        w.held(Owner::Inventory(player_id), wood)? == granted,
        format!("{:?}", again),
    ));
    Ok(results)
}

// ── 3. Early stop ───────────────────────────────────────────────────────

fn scenario_early_stop(config: &EngineConfig) -> Vec<TestResult> {
    log::info!("--- Early stop ---");
    match run_early_stop(config) {
        Ok(results) => results,
        Err(e) => vec![failed("early_stop", e)],
    }
}

fn run_early_stop(config: &EngineConfig) -> EngineResult<Vec<TestResult>> {
    let mut w = world()?;
    let stone = w.ids.resource("stone")?;
    let player_id = w.arrive(config, "bob", "grey_quarry")?;
    farm::start_farming(
        &mut w.store,
        player_id,
        FarmRequest::for_minutes(config, 10),
        T0,
    )?;

    let stopped = farm::stop_farming(&mut w.store, player_id, T0 + 3 * MICROS_PER_MINUTE + 30 * MICROS_PER_SECOND)?;
    let mut results = vec![check(
        "partial_yield",
        stopped.minutes_farmed == 3 && stopped.granted == farm_yield(3),
        format!("{} min, +{}", stopped.minutes_farmed, stopped.granted),
    )];

    let late = w.dispatch(config, T0 + 10 * MICROS_PER_MINUTE)?;
    let held = w.held(Owner::Inventory(player_id), stone)?;
    results.push(check(
        "late_job_is_noop",
        late.completed == 1 && held == stopped.granted as u64 && w.notifier.sent.is_empty(),
        format!("{} stone held", held),
    ));
    results.push(check(
        "player_idle_again",
        w.store.require_player(player_id)?.status == PlayerStatus::Waiting,
        String::new(),
    ));
    Ok(results)
}

// ── 4. Homestead ────────────────────────────────────────────────────────

fn scenario_homestead(config: &EngineConfig) -> Vec<TestResult> {
    log::info!("--- Base, storage, crafting ---");
    match run_homestead(config) {
        Ok(results) => results,
        Err(e) => vec![failed("homestead", e)],
    }
}

fn run_homestead(config: &EngineConfig) -> EngineResult<Vec<TestResult>> {
    let mut w = world()?;
    let (wood, stone) = (w.ids.resource("wood")?, w.ids.resource("stone")?);
    let player_id = w.arrive(config, "carol", "crossroads")?;
    w.give(player_id, wood, 20)?;
    w.give(player_id, stone, 10)?;

    let quote = economy::building_quote(&w.store, player_id, "base")?;
    let mut results = vec![check(
        "base_affordable",
        quote.affordable,
        format!("{} cost lines", quote.lines.len()),
    )];

    let base = economy::build_base(&mut w.store, config, player_id, 150, 90)?;
    let second = economy::build_base(&mut w.store, config, player_id, 160, 90);
    results.push(check(
        "one_base_per_map",
        second.is_err(),
        format!("base #{} at object #{}", base.id, base.map_object_id),
    ));

    let axe = w.ids.item("axe")?;
    economy::craft_item(&mut w.store, player_id, axe)?;
    let has_axe = w
        .store
        .entries(Owner::Inventory(player_id))?
        .iter()
        .any(|e| e.key() == StackKey::item(axe, tiers::BASIC));
    results.push(check("crafted_axe", has_axe, String::new()));

    // 20 - 10 (base) - 3 (axe)
    player::travel(&mut w.store, player_id, base.map_object_id)?;
    economy::transfer_resource(&mut w.store, player_id, wood, 5, TransferDirection::ToStorage)?;
    let stored = w.held(Owner::Storage(base.id), wood)?;
    let carried = w.held(Owner::Inventory(player_id), wood)?;
    results.push(check(
        "transfer_conserves",
        stored == 5 && carried + stored == 7,
        format!("{} carried, {} stored", carried, stored),
    ));

    let mut tired = w.store.require_player(player_id)?;
    tired.health = 40;
    tired.energy = 99;
    w.store.update_player(&tired)?;
    regen::regenerate_players(&mut w.store, config.regen_rule())?;
    let rested = w.store.require_player(player_id)?;
    results.push(check(
        "regen_at_base",
        rested.status == PlayerStatus::Recovery && rested.health > 40 && rested.energy <= config.stat_cap,
        format!("health {} energy {}", rested.health, rested.energy),
    ));
    Ok(results)
}

// ── 5. Restart ──────────────────────────────────────────────────────────

fn scenario_restart(config: &EngineConfig) -> Vec<TestResult> {
    log::info!("--- Restart ---");
    match run_restart(config) {
        Ok(results) => results,
        Err(e) => vec![failed("restart", e)],
    }
}

fn run_restart(config: &EngineConfig) -> EngineResult<Vec<TestResult>> {
    let mut w = world()?;
    let fish = w.ids.resource("fish")?;
    let player_id = w.arrive(config, "dana", "mirror_lake")?;
    farm::start_farming(&mut w.store, player_id, FarmRequest::for_minutes(config, 6), T0)?;

    let snapshot = w.store.snapshot_json()?;
    w.store = MemoryStore::restore_json(&snapshot)?;
    let report = w.dispatch(config, T0 + 6 * MICROS_PER_MINUTE)?;
    let held = w.held(Owner::Inventory(player_id), fish)?;
    Ok(vec![check(
        "job_survives_restart",
        report.completed == 1 && held == farm_yield(6) as u64,
        format!("{} fish after restart", held),
    )])
}

// ── 6. Fault redelivery ─────────────────────────────────────────────────

fn scenario_fault_redelivery(config: &EngineConfig) -> Vec<TestResult> {
    log::info!("--- Fault redelivery ---");
    match run_fault_redelivery(config) {
        Ok(results) => results,
        Err(e) => vec![failed("fault_redelivery", e)],
    }
}

fn run_fault_redelivery(config: &EngineConfig) -> EngineResult<Vec<TestResult>> {
    let mut w = world()?;
    let herbs = w.ids.resource("herbs")?;
    let player_id = w.arrive(config, "eve", "meadow")?;
    farm::start_farming(&mut w.store, player_id, FarmRequest::for_minutes(config, 1), T0)?;

    let due = T0 + MICROS_PER_MINUTE;
    w.store.inject_faults(1);
    let first = w.dispatch(config, due)?;
    let mut results = vec![check(
        "fault_reschedules",
        first.retried == 1 && w.held(Owner::Inventory(player_id), herbs)? == 0,
        format!("{:?}", first),
    )];

    let second = w.dispatch(config, due + config.retry_backoff_micros())?;
    results.push(check(
        "redelivered_once",
        second.completed == 1 && w.held(Owner::Inventory(player_id), herbs)? == farm_yield(1) as u64,
        format!("{:?}", second),
    ));
    Ok(results)
}
