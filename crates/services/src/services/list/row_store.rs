//! Ordered, keyed row collection backing a list instance.
//!
//! Invariants:
//! 1. Every id in `order` has an entry in exactly one of `rows` or `hidden`; no id repeats.
//! 2. At most one pending mutation targets a given id.
//! 3. A row hidden by a pending delete leaves `rows` but keeps its slot in
//!    `order` as a tombstone until the delete is confirmed or rolled back.
//!    Snapshots and positional reads skip tombstones.

use std::{
    collections::{HashMap, HashSet},
    ops::Range,
};

use tracing::debug;

use super::{
    config::{ConflictPolicy, InsertPosition, ListConfig},
    error::ListError,
    types::{MergePosition, MutationId, MutationKind, Page, PendingMutation, Row, SyncState},
};

/// Result of confirming or rolling back a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// The store was reset (or the mutation superseded) since it was applied
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow<R> {
    pub row: R,
    pub sync_state: SyncState,
}

/// Immutable snapshot of a store, handed to readers
#[derive(Debug, Clone)]
pub struct ListView<R> {
    pub generation: u64,
    pub rows: Vec<ViewRow<R>>,
    pub has_more: bool,
    pub pending: usize,
}

impl<R> ListView<R> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ViewRow<R>> {
        self.rows.get(index)
    }

    /// Rows backing `range`, clamped to what is loaded.
    pub fn slice(&self, range: Range<usize>) -> &[ViewRow<R>] {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        &self.rows[start..end]
    }
}

impl<R: Row> ListView<R> {
    pub fn ids(&self) -> Vec<R::Id> {
        self.rows.iter().map(|r| r.row.id()).collect()
    }

    pub fn find(&self, id: &R::Id) -> Option<&ViewRow<R>> {
        self.rows.iter().find(|r| &r.row.id() == id)
    }
}

#[derive(Debug, Clone)]
struct StoredRow<R> {
    row: R,
    sync: SyncState,
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    mutation_id: MutationId,
    kind: MutationKind,
}

#[derive(Debug, Clone)]
pub struct RowStore<R: Row> {
    rows: HashMap<R::Id, StoredRow<R>>,
    order: Vec<R::Id>,
    pending: HashMap<R::Id, PendingEntry>,
    /// Tombstoned ids in `order`, hidden by a pending delete
    hidden: HashSet<R::Id>,
    generation: u64,
    has_more: bool,
    insert_position: InsertPosition,
    conflict_policy: ConflictPolicy,
}

impl<R: Row> Default for RowStore<R> {
    fn default() -> Self {
        Self::new(InsertPosition::default(), ConflictPolicy::default())
    }
}

impl<R: Row> RowStore<R> {
    pub fn new(insert_position: InsertPosition, conflict_policy: ConflictPolicy) -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
            pending: HashMap::new(),
            hidden: HashSet::new(),
            generation: 0,
            has_more: true,
            insert_position,
            conflict_policy,
        }
    }

    pub fn from_config(config: &ListConfig) -> Self {
        Self::new(config.insert_position, config.conflict_policy)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the source reported more rows after the last merged page
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &R::Id) -> bool {
        self.pending.contains_key(id)
    }

    pub fn get(&self, id: &R::Id) -> Option<&R> {
        self.rows.get(id).map(|stored| &stored.row)
    }

    pub fn sync_state(&self, id: &R::Id) -> Option<SyncState> {
        self.rows.get(id).map(|stored| stored.sync)
    }

    /// Visible ids in list order
    pub fn ids(&self) -> Vec<R::Id> {
        self.rows().map(|row| row.id()).collect()
    }

    pub fn row_at(&self, index: usize) -> Option<&R> {
        self.rows().nth(index)
    }

    pub fn rows(&self) -> impl Iterator<Item = &R> + '_ {
        self.order.iter().filter_map(|id| self.get(id))
    }

    fn position(&self, id: &R::Id) -> Option<usize> {
        self.order.iter().position(|candidate| candidate == id)
    }

    fn insert_at_policy(&mut self, row: R, sync: SyncState) {
        let id = row.id();
        match self.insert_position {
            InsertPosition::Front => self.order.insert(0, id.clone()),
            InsertPosition::Back => self.order.push(id.clone()),
        }
        self.rows.insert(id, StoredRow { row, sync });
    }

    fn overwrite(&mut self, id: &R::Id, row: R, sync: SyncState) {
        if let Some(stored) = self.rows.get_mut(id) {
            stored.row = row;
            stored.sync = sync;
        }
    }

    /// Merge a fetched page. Known ids are updated in place and keep their position.
    pub fn merge_page(&mut self, page: Page<R>, position: MergePosition) -> MergeStats {
        let mut stats = MergeStats::default();

        if position == MergePosition::Replace {
            self.rows.clear();
            self.order.clear();
            self.hidden.clear();
        }

        for row in page.rows {
            let id = row.id();
            let pending = self.pending.get(&id).map(|entry| entry.kind);

            if pending == Some(MutationKind::Delete) {
                if self.hidden.insert(id.clone()) {
                    self.order.push(id);
                }
                stats.skipped += 1;
                continue;
            }

            match self.rows.get_mut(&id) {
                Some(stored) => {
                    if pending.is_some() && self.conflict_policy == ConflictPolicy::ClientWins {
                        stats.skipped += 1;
                        continue;
                    }
                    stored.row = row;
                    if pending.is_none() {
                        stored.sync = SyncState::Confirmed;
                    }
                    stats.updated += 1;
                }
                None => {
                    let sync = if pending.is_some() {
                        SyncState::Pending
                    } else {
                        SyncState::Confirmed
                    };
                    self.order.push(id.clone());
                    self.rows.insert(id, StoredRow { row, sync });
                    stats.inserted += 1;
                }
            }
        }

        self.has_more = page.has_more;
        stats
    }

    /// Apply a mutation locally and register it as pending.
    ///
    /// Captures `snapshot_before` from the current row and stamps the store
    /// generation; the returned mutation is what `confirm`/`rollback` expect.
    pub fn apply_optimistic(
        &mut self,
        mut mutation: PendingMutation<R>,
    ) -> Result<PendingMutation<R>, ListError> {
        let target = mutation.target_id.clone();
        if self.pending.contains_key(&target) {
            return Err(ListError::MutationConflict {
                target_id: target.to_string(),
            });
        }
        let not_loaded = || ListError::InvalidArgument(format!("row {target} is not loaded"));

        match mutation.kind {
            MutationKind::Create => {
                let row = mutation.optimistic_row.clone().ok_or_else(|| {
                    ListError::InvalidArgument("create requires an optimistic row".to_string())
                })?;
                if self.rows.contains_key(&target) || self.hidden.contains(&target) {
                    return Err(ListError::InvalidArgument(format!(
                        "row {target} already exists"
                    )));
                }
                mutation.snapshot_before = None;
                self.insert_at_policy(row, SyncState::Pending);
            }
            MutationKind::Update => {
                let row = mutation.optimistic_row.clone().ok_or_else(|| {
                    ListError::InvalidArgument("update requires an optimistic row".to_string())
                })?;
                if row.id() != target {
                    return Err(ListError::InvalidArgument(format!(
                        "optimistic row {} does not match target {target}",
                        row.id()
                    )));
                }
                let stored = self.rows.get_mut(&target).ok_or_else(not_loaded)?;
                mutation.snapshot_before = Some(std::mem::replace(&mut stored.row, row));
                stored.sync = SyncState::Pending;
            }
            MutationKind::Delete => {
                let stored = self.rows.remove(&target).ok_or_else(not_loaded)?;
                mutation.snapshot_before = Some(stored.row);
                self.hidden.insert(target.clone());
            }
        }

        self.pending.insert(
            target,
            PendingEntry {
                mutation_id: mutation.id,
                kind: mutation.kind,
            },
        );
        mutation.generation = self.generation;
        Ok(mutation)
    }

    /// Drop the pending entry for `mutation`; false if it is stale.
    fn release(&mut self, mutation: &PendingMutation<R>) -> bool {
        if mutation.generation != self.generation {
            return false;
        }
        match self.pending.get(&mutation.target_id) {
            Some(entry) if entry.mutation_id == mutation.id => {
                self.pending.remove(&mutation.target_id);
                true
            }
            _ => false,
        }
    }

    /// Undo a failed mutation, restoring `snapshot_before`.
    pub fn rollback(&mut self, mutation: &PendingMutation<R>) -> Result<Resolution, ListError> {
        if !self.release(mutation) {
            debug!(mutation_id = %mutation.id, "Ignoring rollback of stale mutation");
            return Ok(Resolution::Stale);
        }

        let target = &mutation.target_id;
        let missing = || ListError::RollbackTargetMissing {
            target_id: target.to_string(),
        };

        match mutation.kind {
            MutationKind::Create => {
                if self.rows.remove(target).is_none() {
                    return Err(missing());
                }
                self.order.retain(|id| id != target);
            }
            MutationKind::Update => {
                let snapshot = mutation.snapshot_before.clone().ok_or_else(missing)?;
                let stored = self.rows.get_mut(target).ok_or_else(missing)?;
                stored.row = snapshot;
                stored.sync = SyncState::Failed;
            }
            MutationKind::Delete => {
                let snapshot = mutation.snapshot_before.clone().ok_or_else(missing)?;
                if !self.hidden.remove(target) {
                    return Err(missing());
                }
                // The tombstone still holds the row's slot.
                self.rows.insert(
                    target.clone(),
                    StoredRow {
                        row: snapshot,
                        sync: SyncState::Failed,
                    },
                );
            }
        }

        Ok(Resolution::Applied)
    }

    /// Settle a mutation the server accepted. `server_row` wins over the optimistic copy.
    pub fn confirm(&mut self, mutation: &PendingMutation<R>, server_row: Option<R>) -> Resolution {
        if !self.release(mutation) {
            debug!(mutation_id = %mutation.id, "Ignoring confirmation of stale mutation");
            return Resolution::Stale;
        }

        let target = &mutation.target_id;
        match mutation.kind {
            MutationKind::Create => {
                let placeholder_index = self.position(target);
                if placeholder_index.is_some() {
                    self.rows.remove(target);
                }
                let Some(row) = server_row.or_else(|| mutation.optimistic_row.clone()) else {
                    if let Some(index) = placeholder_index {
                        self.order.remove(index);
                    }
                    return Resolution::Applied;
                };

                let id = row.id();
                let already_loaded = self.rows.contains_key(&id);
                match (placeholder_index, already_loaded) {
                    (Some(index), true) => {
                        // A page delivered the server copy first.
                        self.order.remove(index);
                        self.overwrite(&id, row, SyncState::Confirmed);
                    }
                    (Some(index), false) => {
                        self.order[index] = id.clone();
                        self.rows.insert(
                            id,
                            StoredRow {
                                row,
                                sync: SyncState::Confirmed,
                            },
                        );
                    }
                    (None, true) => self.overwrite(&id, row, SyncState::Confirmed),
                    (None, false) => self.insert_at_policy(row, SyncState::Confirmed),
                }
            }
            MutationKind::Update => {
                if let Some(row) = server_row.or_else(|| mutation.optimistic_row.clone()) {
                    self.overwrite(target, row, SyncState::Confirmed);
                }
            }
            MutationKind::Delete => {
                let was_hidden = self.hidden.remove(target);
                if self.rows.remove(target).is_some() || was_hidden {
                    self.order.retain(|id| id != target);
                }
            }
        }

        Resolution::Applied
    }

    /// Remove a row deleted on the server outside this list's own mutations.
    pub fn remove(&mut self, id: &R::Id) -> Option<R> {
        let was_hidden = self.hidden.remove(id);
        let stored = self.rows.remove(id);
        if stored.is_some() || was_hidden {
            self.order.retain(|candidate| candidate != id);
        }
        stored.map(|stored| stored.row)
    }

    /// Clear a `Failed` marker once the UI has shown it.
    pub fn acknowledge_failure(&mut self, id: &R::Id) -> bool {
        match self.rows.get_mut(id) {
            Some(stored) if stored.sync == SyncState::Failed => {
                stored.sync = SyncState::Confirmed;
                true
            }
            _ => false,
        }
    }

    /// Discard everything and move to `generation`.
    pub fn reset_to(&mut self, generation: u64) {
        self.rows.clear();
        self.order.clear();
        self.pending.clear();
        self.hidden.clear();
        self.has_more = true;
        self.generation = generation;
    }

    pub fn reset(&mut self) -> u64 {
        self.reset_to(self.generation + 1);
        self.generation
    }

    pub fn snapshot(&self) -> ListView<R> {
        ListView {
            generation: self.generation,
            rows: self
                .order
                .iter()
                .filter_map(|id| self.rows.get(id))
                .map(|stored| ViewRow {
                    row: stored.row.clone(),
                    sync_state: stored.sync,
                })
                .collect(),
            has_more: self.has_more,
            pending: self.pending.len(),
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(
            self.order.len(),
            self.rows.len() + self.hidden.len(),
            "order and map diverged"
        );
        let unique: HashSet<_> = self.order.iter().collect();
        assert_eq!(unique.len(), self.order.len(), "duplicate ids in order");
        for id in &self.order {
            assert!(
                self.rows.contains_key(id) != self.hidden.contains(id),
                "ordered id {id} must be either visible or hidden"
            );
        }
    }
}
