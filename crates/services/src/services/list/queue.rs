//! Serialized access to a list's [`RowStore`].
//!
//! A single worker task owns the store and drains commands one at a time.
//! Each command is applied synchronously, then a fresh [`ListView`] is
//! published before the caller is answered, so readers never see a partial
//! update and callers always observe their own write.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace};

use super::{
    error::ListError,
    row_store::{ListView, MergeStats, Resolution, RowStore},
    types::{MergePosition, Page, PendingMutation, Row},
};

const QUEUE_DEPTH: usize = 64;

/// Builds the pending mutation from the store state it will be applied to
pub(crate) type BuildMutation<R> =
    Box<dyn FnOnce(&RowStore<R>) -> Result<PendingMutation<R>, ListError> + Send>;

/// Outcome of merging a page through the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(MergeStats),
    /// Fetched for an older generation; dropped
    Stale,
}

enum StoreCommand<R: Row> {
    Merge {
        generation: u64,
        page: Page<R>,
        position: MergePosition,
        reply: oneshot::Sender<MergeOutcome>,
    },
    Apply {
        build: BuildMutation<R>,
        reply: oneshot::Sender<Result<PendingMutation<R>, ListError>>,
    },
    Confirm {
        mutation: PendingMutation<R>,
        server_row: Option<R>,
        reply: oneshot::Sender<Resolution>,
    },
    Rollback {
        mutation: PendingMutation<R>,
        reply: oneshot::Sender<Result<Resolution, ListError>>,
    },
    Remove {
        id: R::Id,
        reply: oneshot::Sender<Option<R>>,
    },
    AcknowledgeFailure {
        id: R::Id,
        reply: oneshot::Sender<bool>,
    },
    Reset {
        generation: u64,
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a store worker
pub(crate) struct StoreHandle<R: Row> {
    list: Arc<str>,
    tx: mpsc::Sender<StoreCommand<R>>,
    view: watch::Receiver<Arc<ListView<R>>>,
}

impl<R: Row> Clone for StoreHandle<R> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            tx: self.tx.clone(),
            view: self.view.clone(),
        }
    }
}

/// Start the worker owning `store`. Must be called inside a Tokio runtime.
pub(crate) fn spawn_store<R: Row>(list: Arc<str>, store: RowStore<R>) -> StoreHandle<R> {
    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
    let (view_tx, view_rx) = watch::channel(Arc::new(store.snapshot()));

    let worker = StoreWorker {
        list: list.clone(),
        store,
        view_tx,
    };
    tokio::spawn(worker.run(rx));

    StoreHandle {
        list,
        tx,
        view: view_rx,
    }
}

struct StoreWorker<R: Row> {
    list: Arc<str>,
    store: RowStore<R>,
    view_tx: watch::Sender<Arc<ListView<R>>>,
}

impl<R: Row> StoreWorker<R> {
    async fn run(mut self, mut rx: mpsc::Receiver<StoreCommand<R>>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!(list = %self.list, "Store worker stopped");
    }

    fn publish(&self) {
        self.view_tx.send_replace(Arc::new(self.store.snapshot()));
    }

    fn handle(&mut self, command: StoreCommand<R>) {
        match command {
            StoreCommand::Merge {
                generation,
                page,
                position,
                reply,
            } => {
                let outcome = if generation == self.store.generation() {
                    let stats = self.store.merge_page(page, position);
                    trace!(list = %self.list, ?stats, "Merged page");
                    self.publish();
                    MergeOutcome::Merged(stats)
                } else {
                    debug!(
                        list = %self.list,
                        page_generation = generation,
                        store_generation = self.store.generation(),
                        "Discarding page from previous generation"
                    );
                    MergeOutcome::Stale
                };
                let _ = reply.send(outcome);
            }
            StoreCommand::Apply { build, reply } => {
                let result =
                    build(&self.store).and_then(|mutation| self.store.apply_optimistic(mutation));
                if result.is_ok() {
                    self.publish();
                }
                let _ = reply.send(result);
            }
            StoreCommand::Confirm {
                mutation,
                server_row,
                reply,
            } => {
                let resolution = self.store.confirm(&mutation, server_row);
                self.publish();
                let _ = reply.send(resolution);
            }
            StoreCommand::Rollback { mutation, reply } => {
                let result = self.store.rollback(&mutation);
                self.publish();
                let _ = reply.send(result);
            }
            StoreCommand::Remove { id, reply } => {
                let removed = self.store.remove(&id);
                self.publish();
                let _ = reply.send(removed);
            }
            StoreCommand::AcknowledgeFailure { id, reply } => {
                let changed = self.store.acknowledge_failure(&id);
                if changed {
                    self.publish();
                }
                let _ = reply.send(changed);
            }
            StoreCommand::Reset { generation, reply } => {
                self.store.reset_to(generation);
                self.publish();
                let _ = reply.send(());
            }
        }
    }
}

impl<R: Row> StoreHandle<R> {
    pub(crate) fn view(&self) -> Arc<ListView<R>> {
        self.view.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<ListView<R>>> {
        self.view.clone()
    }

    fn closed(&self) -> ListError {
        ListError::Closed(self.list.to_string())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> StoreCommand<R>,
    ) -> Result<T, ListError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    pub(crate) async fn merge(
        &self,
        generation: u64,
        page: Page<R>,
        position: MergePosition,
    ) -> Result<MergeOutcome, ListError> {
        self.request(|reply| StoreCommand::Merge {
            generation,
            page,
            position,
            reply,
        })
        .await
    }

    pub(crate) async fn apply(
        &self,
        build: BuildMutation<R>,
    ) -> Result<PendingMutation<R>, ListError> {
        self.request(|reply| StoreCommand::Apply { build, reply })
            .await?
    }

    pub(crate) async fn confirm(
        &self,
        mutation: PendingMutation<R>,
        server_row: Option<R>,
    ) -> Result<Resolution, ListError> {
        self.request(|reply| StoreCommand::Confirm {
            mutation,
            server_row,
            reply,
        })
        .await
    }

    pub(crate) async fn rollback(
        &self,
        mutation: PendingMutation<R>,
    ) -> Result<Resolution, ListError> {
        self.request(|reply| StoreCommand::Rollback { mutation, reply })
            .await?
    }

    pub(crate) async fn remove(&self, id: R::Id) -> Result<Option<R>, ListError> {
        self.request(|reply| StoreCommand::Remove { id, reply }).await
    }

    pub(crate) async fn acknowledge_failure(&self, id: R::Id) -> Result<bool, ListError> {
        self.request(|reply| StoreCommand::AcknowledgeFailure { id, reply })
            .await
    }

    pub(crate) async fn reset(&self, generation: u64) -> Result<(), ListError> {
        self.request(|reply| StoreCommand::Reset { generation, reply })
            .await
    }
}
