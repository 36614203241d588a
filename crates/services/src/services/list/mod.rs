//! Virtualized, paginated lists with optimistic mutations.
//!
//! A [`ListInstance`] composes four parts:
//!
//! * [`CursorPaginator`] walks a [`RowSource`] forward page by page and drops
//!   pages that were requested before the last filter change.
//! * [`RowStore`] holds the ordered, de-duplicated rows. It is owned by one
//!   worker task and every write goes through its command queue.
//! * [`MutationCoordinator`] applies create/update/delete locally, calls the
//!   source, then confirms or rolls back.
//! * [`WindowedRenderer`] decides which indices a viewport still needs.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod instance;
pub mod paginator;
pub(crate) mod queue;
pub mod row_store;
pub mod source;
#[cfg(test)]
pub(crate) mod test_support;
pub mod types;
pub mod window;

pub use config::{ConflictPolicy, InsertPosition, ListConfig};
pub use coordinator::{DispatchedMutation, MutationCoordinator, MutationOutcome, Settled};
pub use error::{ListError, SourceError};
pub use instance::ListInstance;
pub use paginator::{CursorPaginator, FetchedPage};
pub use queue::MergeOutcome;
pub use row_store::{ListView, MergeStats, Resolution, RowStore, ViewRow};
pub use source::{RowId, RowSource, SourceMutation};
pub use types::{
    Cursor, MergePosition, Mutation, MutationId, MutationKind, Page, PendingMutation, Row,
    SyncState,
};
pub use window::{RenderState, Viewport, WindowedRenderer};
