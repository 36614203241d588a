use std::{
    fmt::{self, Debug, Display},
    hash::Hash,
    time::Instant,
};

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

/// An entity that can live in a [`RowStore`](super::row_store::RowStore)
pub trait Row: Clone + Debug + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

/// Opaque pagination token issued by the data source; only equality is meaningful
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fetched batch of rows
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    /// Cursor the page was requested with; `None` for the first page
    pub cursor: Option<Cursor>,
    pub next_cursor: Option<Cursor>,
    pub rows: Vec<R>,
    pub has_more: bool,
}

impl<R> Page<R> {
    /// A first page
    pub fn first(rows: Vec<R>, next_cursor: Option<Cursor>, has_more: bool) -> Self {
        Self {
            cursor: None,
            next_cursor,
            rows,
            has_more,
        }
    }
}

/// Local synchronization state of a row, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SyncState {
    Confirmed,
    Pending,
    /// Restored by a rollback and not yet acknowledged
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePosition {
    Append,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(Uuid);

impl MutationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A mutation the caller asks a list to perform
#[derive(Debug, Clone)]
pub enum Mutation<Id, C, U> {
    Create { payload: C },
    Update { id: Id, payload: U },
    Delete { id: Id },
}

impl<Id, C, U> Mutation<Id, C, U> {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Create { .. } => MutationKind::Create,
            Mutation::Update { .. } => MutationKind::Update,
            Mutation::Delete { .. } => MutationKind::Delete,
        }
    }
}

/// A locally applied mutation waiting for the server.
///
/// `snapshot_before` is captured by the store when the mutation is applied.
#[derive(Debug, Clone)]
pub struct PendingMutation<R: Row> {
    pub id: MutationId,
    pub kind: MutationKind,
    pub target_id: R::Id,
    pub snapshot_before: Option<R>,
    pub optimistic_row: Option<R>,
    pub dispatched_at: Instant,
    pub(crate) generation: u64,
}

impl<R: Row> PendingMutation<R> {
    fn new(kind: MutationKind, target_id: R::Id, optimistic_row: Option<R>) -> Self {
        Self {
            id: MutationId::new(),
            kind,
            target_id,
            snapshot_before: None,
            optimistic_row,
            dispatched_at: Instant::now(),
            generation: 0,
        }
    }

    /// Create targeting the placeholder id carried by `row`
    pub fn create(row: R) -> Self {
        Self::new(MutationKind::Create, row.id(), Some(row))
    }

    pub fn update(target_id: R::Id, optimistic_row: R) -> Self {
        Self::new(MutationKind::Update, target_id, Some(optimistic_row))
    }

    pub fn delete(target_id: R::Id) -> Self {
        Self::new(MutationKind::Delete, target_id, None)
    }

    /// Store generation the mutation was applied in
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
