//! Resource/item ledger — quantity adjustment and stack-aware transfers.
//!
//! A [`Container`] is a working copy of one owner's rows, loaded inside a
//! unit of work, mutated in memory and written back with [`save`]. Every
//! operation validates its whole plan before touching a single entry, so an
//! `Err` always leaves both containers exactly as they were.
//!
//! Conservation: for any successful [`move_entry`], the total count of the
//! moved stack key across source and target is unchanged.

use std::collections::HashMap;

use crate::constants::RESOURCE_STACK_LIMIT;
use crate::error::{EngineError, EngineResult};
use crate::model::{EntryKind, LedgerEntry, Owner, Player, PlayerBase, StackKey};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

// ── Entry sets ──────────────────────────────────────────────────────────

/// In-memory rows of one owner plus the bookkeeping needed to write back a
/// diff. New rows carry `id: 0` until saved.
#[derive(Debug, Clone, Default)]
pub struct EntrySet {
    entries: Vec<LedgerEntry>,
    removed: Vec<u64>,
    loaded: HashMap<u64, u32>,
}

impl EntrySet {
    pub fn from_rows(rows: Vec<LedgerEntry>) -> Self {
        let loaded = rows.iter().map(|e| (e.id, e.count)).collect();
        Self {
            entries: rows,
            removed: Vec::new(),
            loaded,
        }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Total count held under `key` across all stacks.
    pub fn quantity(&self, key: StackKey) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.key() == key)
            .map(|e| e.count as u64)
            .sum()
    }

    fn push(&mut self, key: StackKey, count: u32) {
        self.entries.push(LedgerEntry {
            id: 0,
            kind: key.kind,
            target_id: key.target_id,
            tier: key.tier,
            count,
        });
    }

    /// Drop zero-count rows, remembering persisted ids for deletion.
    fn prune(&mut self) {
        let removed = &mut self.removed;
        self.entries.retain(|e| {
            if e.count > 0 {
                return true;
            }
            if e.id != 0 {
                removed.push(e.id);
            }
            false
        });
    }

    fn item_stacks(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Item)
            .count()
    }
}

// ── Containers ──────────────────────────────────────────────────────────

/// A collection of ledger rows owned by one player or base.
///
/// Implementors supply ownership and capacity; listing and stack creation
/// are shared.
pub trait Container {
    fn owner(&self) -> Owner;
    fn entry_set(&self) -> &EntrySet;
    fn entry_set_mut(&mut self) -> &mut EntrySet;

    /// How many more stacks of `kind` fit, `None` when unlimited.
    fn free_stacks(&self, kind: EntryKind) -> Option<usize>;

    fn describe(&self) -> &'static str;

    fn list(&self) -> &[LedgerEntry] {
        self.entry_set().entries()
    }

    /// Open a new stack of `count` units.
    fn create(&mut self, key: StackKey, count: u32) -> EngineResult<()> {
        if self.free_stacks(key.kind) == Some(0) {
            return Err(EngineError::precondition(format!(
                "{} is full",
                self.describe()
            )));
        }
        self.entry_set_mut().push(key, count);
        Ok(())
    }
}

/// Rows carried by a player. Only item stacks occupy inventory slots.
#[derive(Debug, Clone)]
pub struct Inventory {
    player_id: u64,
    slots: u32,
    set: EntrySet,
}

impl Inventory {
    pub fn new(player_id: u64, slots: u32, rows: Vec<LedgerEntry>) -> Self {
        Self {
            player_id,
            slots,
            set: EntrySet::from_rows(rows),
        }
    }

    pub fn load<S: Store>(store: &S, player: &Player) -> EngineResult<Self> {
        let rows = store.entries(Owner::Inventory(player.id))?;
        Ok(Self::new(player.id, player.inventory_slots, rows))
    }
}

impl Container for Inventory {
    fn owner(&self) -> Owner {
        Owner::Inventory(self.player_id)
    }

    fn entry_set(&self) -> &EntrySet {
        &self.set
    }

    fn entry_set_mut(&mut self) -> &mut EntrySet {
        &mut self.set
    }

    fn free_stacks(&self, kind: EntryKind) -> Option<usize> {
        match kind {
            EntryKind::Resource => None,
            EntryKind::Item => Some((self.slots as usize).saturating_sub(self.set.item_stacks())),
        }
    }

    fn describe(&self) -> &'static str {
        "Inventory"
    }
}

/// Rows kept at a player's base. Unlimited stacks.
#[derive(Debug, Clone)]
pub struct Storage {
    base_id: u64,
    set: EntrySet,
}

impl Storage {
    pub fn new(base_id: u64, rows: Vec<LedgerEntry>) -> Self {
        Self {
            base_id,
            set: EntrySet::from_rows(rows),
        }
    }

    pub fn load<S: Store>(store: &S, base: &PlayerBase) -> EngineResult<Self> {
        let rows = store.entries(Owner::Storage(base.id))?;
        Ok(Self::new(base.id, rows))
    }
}

impl Container for Storage {
    fn owner(&self) -> Owner {
        Owner::Storage(self.base_id)
    }

    fn entry_set(&self) -> &EntrySet {
        &self.set
    }

    fn entry_set_mut(&mut self) -> &mut EntrySet {
        &mut self.set
    }

    fn free_stacks(&self, _kind: EntryKind) -> Option<usize> {
        None
    }

    fn describe(&self) -> &'static str {
        "Storage"
    }
}

// ── Operations ──────────────────────────────────────────────────────────

/// Largest stack allowed for a resource key.
pub fn resource_limit() -> u32 {
    RESOURCE_STACK_LIMIT
}

fn stacks_needed(count: u64, limit: u32) -> usize {
    let limit = limit.max(1) as u64;
    count.div_ceil(limit) as usize
}

fn ensure_room<C: Container + ?Sized>(c: &C, kind: EntryKind, new_stacks: usize) -> EngineResult<()> {
    match c.free_stacks(kind) {
        Some(free) if free < new_stacks => Err(EngineError::precondition(format!(
            "{} is full",
            c.describe()
        ))),
        _ => Ok(()),
    }
}

/// Apply `delta` to the stacks under `key`.
///
/// Increases top up existing stacks below `limit` and open new stacks for
/// the rest. Decreases drain the smallest stacks first and fail with
/// [`EngineError::InsufficientQuantity`] when the total is too small.
pub fn adjust<C: Container + ?Sized>(
    c: &mut C,
    key: StackKey,
    delta: u32,
    direction: Direction,
    limit: u32,
) -> EngineResult<()> {
    if delta == 0 {
        return Ok(());
    }
    let limit = limit.max(1);
    match direction {
        Direction::Increase => {
            let headroom: u64 = c
                .list()
                .iter()
                .filter(|e| e.key() == key)
                .map(|e| limit.saturating_sub(e.count) as u64)
                .sum();
            let overflow = (delta as u64).saturating_sub(headroom);
            ensure_room(c, key.kind, stacks_needed(overflow, limit))?;

            let mut remaining = delta;
            for entry in c.entry_set_mut().entries.iter_mut() {
                if remaining == 0 {
                    break;
                }
                if entry.key() == key && entry.count < limit {
                    let take = remaining.min(limit - entry.count);
                    entry.count += take;
                    remaining -= take;
                }
            }
            while remaining > 0 {
                let take = remaining.min(limit);
                c.create(key, take)?;
                remaining -= take;
            }
        }
        Direction::Decrease => {
            let available = c.entry_set().quantity(key);
            if available < delta as u64 {
                return Err(EngineError::InsufficientQuantity {
                    target_id: key.target_id,
                    available,
                    requested: delta as u64,
                });
            }
            let set = c.entry_set_mut();
            let mut order: Vec<usize> = (0..set.entries.len())
                .filter(|&i| set.entries[i].key() == key)
                .collect();
            order.sort_by_key(|&i| set.entries[i].count);

            let mut remaining = delta;
            for i in order {
                if remaining == 0 {
                    break;
                }
                let take = remaining.min(set.entries[i].count);
                set.entries[i].count -= take;
                remaining -= take;
            }
            set.prune();
        }
    }
    Ok(())
}

/// Result of a successful [`move_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Units merged into an existing target stack.
    pub merged: u32,
    /// New stacks opened in the target.
    pub new_stacks: usize,
    /// Units left on the source entry (0 means it was removed).
    pub source_remaining: u32,
}

/// Move `count` units of the source entry `entry_id` into `target`.
///
/// The first compatible target stack (same key, below `limit`) is filled to
/// capacity; any overflow opens new stacks of at most `limit` each. The
/// source shrinks, or disappears when emptied.
pub fn move_entry<S, T>(
    source: &mut S,
    entry_id: u64,
    count: u32,
    limit: u32,
    target: &mut T,
) -> EngineResult<MoveOutcome>
where
    S: Container + ?Sized,
    T: Container + ?Sized,
{
    let limit = limit.max(1);
    let index = source
        .list()
        .iter()
        .position(|e| e.id == entry_id && e.id != 0)
        .ok_or_else(|| EngineError::not_found(format!("entry #{}", entry_id)))?;
    let entry = source.list()[index].clone();
    if count == 0 {
        return Err(EngineError::precondition("transfer count must be positive"));
    }
    if count > entry.count {
        return Err(EngineError::InsufficientQuantity {
            target_id: entry.target_id,
            available: entry.count as u64,
            requested: count as u64,
        });
    }

    let key = entry.key();
    let compatible = target
        .list()
        .iter()
        .position(|e| e.key() == key && e.count < limit);
    let merged = compatible
        .map(|j| count.min(limit - target.list()[j].count))
        .unwrap_or(0);
    let overflow = count - merged;
    let new_stacks = stacks_needed(overflow as u64, limit);
    ensure_room(target, key.kind, new_stacks)?;

    if let Some(j) = compatible {
        target.entry_set_mut().entries[j].count += merged;
    }
    let mut rest = overflow;
    while rest > 0 {
        let take = rest.min(limit);
        target.create(key, take)?;
        rest -= take;
    }

    let set = source.entry_set_mut();
    set.entries[index].count -= count;
    let source_remaining = set.entries[index].count;
    set.prune();

    Ok(MoveOutcome {
        merged,
        new_stacks,
        source_remaining,
    })
}

/// Remove `count` units from one specific entry, deleting it when emptied.
pub fn take_from_entry<C: Container + ?Sized>(c: &mut C, entry_id: u64, count: u32) -> EngineResult<()> {
    let index = c
        .list()
        .iter()
        .position(|e| e.id == entry_id && e.id != 0)
        .ok_or_else(|| EngineError::not_found(format!("entry #{}", entry_id)))?;
    if count == 0 {
        return Err(EngineError::precondition("count must be positive"));
    }
    let set = c.entry_set_mut();
    let entry = &mut set.entries[index];
    if count > entry.count {
        return Err(EngineError::InsufficientQuantity {
            target_id: entry.target_id,
            available: entry.count as u64,
            requested: count as u64,
        });
    }
    entry.count -= count;
    set.prune();
    Ok(())
}

/// Move `count` units of `key` regardless of which source stacks hold them.
///
/// Used for resources, which players address by resource id rather than by
/// row.
pub fn move_quantity<S, T>(
    source: &mut S,
    key: StackKey,
    count: u32,
    limit: u32,
    target: &mut T,
) -> EngineResult<()>
where
    S: Container + ?Sized,
    T: Container + ?Sized,
{
    if count == 0 {
        return Err(EngineError::precondition("transfer count must be positive"));
    }
    let available = source.entry_set().quantity(key);
    if available < count as u64 {
        return Err(EngineError::InsufficientQuantity {
            target_id: key.target_id,
            available,
            requested: count as u64,
        });
    }
    // Increase first: it is the only side that can still fail (capacity).
    adjust(target, key, count, Direction::Increase, limit)?;
    adjust(source, key, count, Direction::Decrease, limit)
}

/// Write the container's changes back through `store`.
pub fn save<S: Store, C: Container + ?Sized>(store: &mut S, c: &C) -> EngineResult<()> {
    let owner = c.owner();
    let set = c.entry_set();
    for id in &set.removed {
        store.delete_entry(owner, *id)?;
    }
    for entry in &set.entries {
        if entry.id == 0 {
            store.insert_entry(owner, entry.clone())?;
        } else if set.loaded.get(&entry.id) != Some(&entry.count) {
            store.update_entry(owner, entry)?;
        }
    }
    Ok(())
}
