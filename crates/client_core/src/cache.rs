//! Owned entity cache with a watch-channel subscription contract.
//!
//! Every patch produces a new [`CacheSnapshot`]. Patches that change nothing
//! publish nothing, so subscribers never see a spurious update and the record
//! sequence stays pointer-equal.
//!
//! List loads go through [`EntityCache::begin_fetch`] /
//! [`EntityCache::complete_fetch`]. Only the newest ticket may land, and the
//! patches applied while it was in flight are replayed over its result.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::{UserId, UserRecord};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::ListError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Error(ListError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Update,
    Delete,
}

/// Latest pending kind for an id plus how many intents still hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingMark {
    kind: PendingKind,
    holds: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    records: Arc<Vec<UserRecord>>,
    status: QueryStatus,
    pending: Arc<BTreeMap<UserId, PendingMark>>,
    pending_creates: usize,
    loaded: bool,
}

impl CacheSnapshot {
    pub fn records(&self) -> &[UserRecord] {
        &self.records
    }

    pub fn records_arc(&self) -> &Arc<Vec<UserRecord>> {
        &self.records
    }

    /// True when both snapshots share the same record sequence allocation.
    pub fn same_records(&self, other: &CacheSnapshot) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }

    pub fn get(&self, id: UserId) -> Option<&UserRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn status(&self) -> &QueryStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn list_error(&self) -> Option<&ListError> {
        match &self.status {
            QueryStatus::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Whether a list result has ever been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn pending(&self, id: UserId) -> Option<PendingKind> {
        self.pending.get(&id).map(|mark| mark.kind)
    }

    pub fn pending_creates(&self) -> usize {
        self.pending_creates
    }
}

/// Generation token for one list load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Patch {
    Insert(UserRecord),
    Replace(UserId, UserRecord),
    Remove(UserId),
}

#[derive(Default)]
struct FetchState {
    latest: u64,
    in_flight: bool,
    journal: Vec<Patch>,
}

pub struct EntityCache {
    fetch: Mutex<FetchState>,
    snapshots: watch::Sender<CacheSnapshot>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(CacheSnapshot::default());
        Self {
            fetch: Mutex::new(FetchState::default()),
            snapshots,
        }
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CacheSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.snapshots.borrow().contains(id)
    }

    pub fn get(&self, id: UserId) -> Option<UserRecord> {
        self.snapshots.borrow().get(id).cloned()
    }

    fn fetch_state(&self) -> MutexGuard<'_, FetchState> {
        self.fetch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the record sequence verbatim, keeping server order. A repeated
    /// id keeps its first occurrence.
    pub fn replace_all(&self, records: Vec<UserRecord>) {
        let records = dedupe(records);
        self.snapshots.send_modify(|snap| {
            snap.records = Arc::new(records);
            snap.loaded = true;
        });
    }

    /// Appends `record`. Returns `false` and leaves the cache untouched when the
    /// id is already present.
    pub fn insert(&self, record: UserRecord) -> bool {
        self.apply(Patch::Insert(record))
    }

    /// Replaces the record keyed by `id` in place. No-op when absent.
    pub fn replace_by_id(&self, id: UserId, record: UserRecord) -> bool {
        self.apply(Patch::Replace(id, record))
    }

    /// Removes the record keyed by `id`. No-op when absent.
    pub fn remove_by_id(&self, id: UserId) -> bool {
        self.apply(Patch::Remove(id))
    }

    fn apply(&self, patch: Patch) -> bool {
        let mut fetch = self.fetch_state();
        let changed = self.snapshots.send_if_modified(|snap| {
            match apply_patch(&snap.records, &patch, false) {
                Some(next) => {
                    snap.records = Arc::new(next);
                    true
                }
                None => false,
            }
        });
        if let (Patch::Insert(record), false) = (&patch, changed) {
            warn!(id = record.id.0, "cache: insert rejected, id already present");
        }
        // A rejected insert must not resurface when the journal is replayed.
        if fetch.in_flight && (changed || !matches!(patch, Patch::Insert(_))) {
            fetch.journal.push(patch);
        }
        changed
    }

    /// Starts a list load. Any older ticket still in flight becomes stale.
    pub fn begin_fetch(&self) -> FetchTicket {
        let mut fetch = self.fetch_state();
        fetch.latest += 1;
        fetch.in_flight = true;
        let ticket = FetchTicket(fetch.latest);
        self.snapshots.send_if_modified(|snap| {
            if snap.status == QueryStatus::Loading {
                return false;
            }
            snap.status = QueryStatus::Loading;
            true
        });
        debug!(generation = ticket.0, "cache: fetch started");
        ticket
    }

    /// Lands a list load. Returns `false` when the ticket was stale and the
    /// result was discarded.
    pub fn complete_fetch(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<UserRecord>, ListError>,
    ) -> bool {
        let mut fetch = self.fetch_state();
        if ticket.0 != fetch.latest || !fetch.in_flight {
            debug!(
                generation = ticket.0,
                latest = fetch.latest,
                "cache: discarding stale fetch result"
            );
            return false;
        }
        fetch.in_flight = false;
        let journal = std::mem::take(&mut fetch.journal);

        match result {
            Ok(listed) => {
                let replayed = journal.len();
                self.snapshots.send_modify(|snap| {
                    let mut records = dedupe(listed);
                    retain_local_records(&mut records, &snap.records);
                    for patch in &journal {
                        if let Some(next) = apply_patch(&records, patch, true) {
                            records = next;
                        }
                    }
                    snap.records = Arc::new(records);
                    snap.status = QueryStatus::Idle;
                    snap.loaded = true;
                });
                debug!(generation = ticket.0, replayed, "cache: fetch applied");
            }
            Err(err) => {
                warn!(generation = ticket.0, error = %err, "cache: fetch failed");
                self.snapshots.send_modify(|snap| {
                    snap.status = QueryStatus::Error(err);
                });
            }
        }
        true
    }

    /// Marks `id` as having an intent in flight. Overlapping intents on the
    /// same id each hold the mark; it clears when the last one releases it.
    pub fn mark_pending(&self, id: UserId, kind: PendingKind) {
        self.snapshots.send_if_modified(|snap| {
            let pending = Arc::make_mut(&mut snap.pending);
            match pending.get_mut(&id) {
                Some(mark) => {
                    mark.holds += 1;
                    let changed = mark.kind != kind;
                    mark.kind = kind;
                    changed
                }
                None => {
                    pending.insert(id, PendingMark { kind, holds: 1 });
                    true
                }
            }
        });
    }

    pub fn clear_pending(&self, id: UserId) {
        self.snapshots.send_if_modified(|snap| {
            let Some(mark) = snap.pending.get(&id).copied() else {
                return false;
            };
            let pending = Arc::make_mut(&mut snap.pending);
            if mark.holds > 1 {
                if let Some(mark) = pending.get_mut(&id) {
                    mark.holds -= 1;
                }
                return false;
            }
            pending.remove(&id);
            true
        });
    }

    pub fn begin_create(&self) {
        self.snapshots.send_modify(|snap| snap.pending_creates += 1);
    }

    pub fn end_create(&self) {
        self.snapshots.send_if_modified(|snap| {
            if snap.pending_creates == 0 {
                return false;
            }
            snap.pending_creates -= 1;
            true
        });
    }
}

/// Returns the patched sequence, or `None` when the patch changes nothing.
/// With `upsert`, an insert whose id is already present replaces it instead.
fn apply_patch(records: &[UserRecord], patch: &Patch, upsert: bool) -> Option<Vec<UserRecord>> {
    match patch {
        Patch::Insert(record) => match position(records, record.id) {
            Some(pos) if upsert => replace_at(records, pos, record.clone()),
            Some(_) => None,
            None => {
                let mut next = Vec::with_capacity(records.len() + 1);
                next.extend_from_slice(records);
                next.push(record.clone());
                Some(next)
            }
        },
        Patch::Replace(id, record) => {
            let pos = position(records, *id)?;
            let mut record = record.clone();
            record.id = *id;
            replace_at(records, pos, record)
        }
        Patch::Remove(id) => {
            let pos = position(records, *id)?;
            let mut next = records.to_vec();
            next.remove(pos);
            Some(next)
        }
    }
}

fn replace_at(records: &[UserRecord], pos: usize, record: UserRecord) -> Option<Vec<UserRecord>> {
    if records[pos] == record {
        return None;
    }
    let mut next = records.to_vec();
    next[pos] = record;
    Some(next)
}

fn position(records: &[UserRecord], id: UserId) -> Option<usize> {
    records.iter().position(|record| record.id == id)
}

fn dedupe(records: Vec<UserRecord>) -> Vec<UserRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let before = records.len();
    let records: Vec<_> = records
        .into_iter()
        .filter(|record| seen.insert(record.id))
        .collect();
    if records.len() != before {
        warn!(
            dropped = before - records.len(),
            "cache: list contained repeated ids"
        );
    }
    records
}

/// Locally created records were never persisted remotely, so a fresh list
/// cannot contain them. Carry them over after the listed records.
fn retain_local_records(records: &mut Vec<UserRecord>, previous: &[UserRecord]) {
    for record in previous.iter().filter(|record| record.is_local()) {
        if position(records, record.id).is_none() {
            records.push(record.clone());
        }
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
