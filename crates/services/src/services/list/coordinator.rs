//! Optimistic mutations: apply locally, call the source, then confirm or roll back.

use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{
    error::{ListError, SourceError},
    queue::{BuildMutation, StoreHandle},
    row_store::{Resolution, RowStore},
    source::{RowId, RowSource, SourceMutation},
    types::{Mutation, MutationId, MutationKind, PendingMutation, Row},
};
use crate::services::notification::{ListEvent, ListNotifier};

/// How a dispatched mutation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Confirmed,
    /// The remote call failed or timed out; carries `ListError::MutationFailed`
    RolledBack(ListError),
    /// The list was reset before the mutation resolved
    Stale,
}

/// Final state of a dispatched mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled<Id> {
    pub outcome: MutationOutcome,
    /// Row the confirmed mutation left behind: the server id for a create,
    /// the target for an update. `None` for deletes and unconfirmed outcomes.
    pub row_id: Option<Id>,
}

/// Returned by `dispatch`; the mutation resolves in the background
#[derive(Debug)]
pub struct DispatchedMutation<Id> {
    id: MutationId,
    settled: oneshot::Receiver<Settled<Id>>,
}

impl<Id> DispatchedMutation<Id> {
    pub fn id(&self) -> MutationId {
        self.id
    }

    /// Wait for the server to settle the mutation.
    pub async fn settled(self) -> Settled<Id> {
        self.settled.await.unwrap_or(Settled {
            outcome: MutationOutcome::Stale,
            row_id: None,
        })
    }

    pub async fn resolved(self) -> MutationOutcome {
        self.settled().await.outcome
    }
}

pub struct MutationCoordinator<S: RowSource> {
    list: Arc<str>,
    source: Arc<S>,
    store: StoreHandle<S::Row>,
    notifier: Arc<dyn ListNotifier>,
    timeout: Duration,
}

impl<S: RowSource> MutationCoordinator<S> {
    pub(crate) fn new(
        list: Arc<str>,
        source: Arc<S>,
        store: StoreHandle<S::Row>,
        notifier: Arc<dyn ListNotifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            list,
            source,
            store,
            notifier,
            timeout,
        }
    }

    /// Apply `mutation` optimistically and start the remote call.
    ///
    /// Fails immediately with `MutationConflict` when the row already has a
    /// pending mutation, or `InvalidArgument` when the row is not loaded.
    pub async fn dispatch(
        &self,
        mutation: SourceMutation<S>,
    ) -> Result<DispatchedMutation<RowId<S>>, ListError> {
        let build = self.build(&mutation);
        let pending = self.store.apply(build).await?;
        let id = pending.id;

        info!(
            list = %self.list,
            mutation_id = %id,
            kind = %pending.kind,
            target_id = %pending.target_id,
            "Applied optimistic mutation"
        );

        let (tx, rx) = oneshot::channel();
        let task = Resolver {
            list: self.list.clone(),
            source: self.source.clone(),
            store: self.store.clone(),
            notifier: self.notifier.clone(),
            timeout: self.timeout,
        };
        tokio::spawn(async move {
            let outcome = task.resolve(pending, mutation).await;
            let _ = tx.send(outcome);
        });

        Ok(DispatchedMutation { id, settled: rx })
    }

    fn build(&self, mutation: &SourceMutation<S>) -> BuildMutation<S::Row> {
        match mutation {
            Mutation::Create { payload } => {
                let row = self.source.project_create(payload);
                Box::new(move |_: &RowStore<S::Row>| Ok(PendingMutation::create(row)))
            }
            Mutation::Update { id, payload } => {
                let source = self.source.clone();
                let id = id.clone();
                let payload = payload.clone();
                Box::new(move |store: &RowStore<S::Row>| {
                    let current = store.get(&id).ok_or_else(|| {
                        ListError::InvalidArgument(format!("row {id} is not loaded"))
                    })?;
                    let optimistic = source.project_update(current, &payload);
                    Ok(PendingMutation::update(id, optimistic))
                })
            }
            Mutation::Delete { id } => {
                let id = id.clone();
                Box::new(move |_: &RowStore<S::Row>| Ok(PendingMutation::delete(id)))
            }
        }
    }
}

struct Resolver<S: RowSource> {
    list: Arc<str>,
    source: Arc<S>,
    store: StoreHandle<S::Row>,
    notifier: Arc<dyn ListNotifier>,
    timeout: Duration,
}

impl<S: RowSource> Resolver<S> {
    async fn call_remote(
        &self,
        mutation: &SourceMutation<S>,
    ) -> Result<Option<S::Row>, SourceError> {
        match mutation {
            Mutation::Create { payload } => self.source.create_row(payload).await.map(Some),
            Mutation::Update { id, payload } => {
                self.source.update_row(id, payload).await.map(Some)
            }
            Mutation::Delete { id } => self.source.delete_row(id).await.map(|_| None),
        }
    }

    async fn resolve(
        self,
        pending: PendingMutation<S::Row>,
        mutation: SourceMutation<S>,
    ) -> Settled<RowId<S>> {
        let result = match tokio::time::timeout(self.timeout, self.call_remote(&mutation)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    list = %self.list,
                    mutation_id = %pending.id,
                    timeout = ?self.timeout,
                    "Mutation timed out"
                );
                Err(SourceError::Timeout)
            }
        };

        match result {
            Ok(server_row) => {
                let row_id = match pending.kind {
                    MutationKind::Create => server_row
                        .as_ref()
                        .or(pending.optimistic_row.as_ref())
                        .map(Row::id),
                    MutationKind::Update => Some(pending.target_id.clone()),
                    MutationKind::Delete => None,
                };
                let outcome = self.confirm(pending, server_row).await;
                let row_id = row_id.filter(|_| outcome == MutationOutcome::Confirmed);
                Settled { outcome, row_id }
            }
            Err(cause) => Settled {
                outcome: self.fail(pending, cause).await,
                row_id: None,
            },
        }
    }

    async fn confirm(
        &self,
        pending: PendingMutation<S::Row>,
        server_row: Option<S::Row>,
    ) -> MutationOutcome {
        let mutation_id = pending.id;
        match self.store.confirm(pending, server_row).await {
            Ok(Resolution::Applied) => {
                debug!(list = %self.list, mutation_id = %mutation_id, "Mutation confirmed");
                MutationOutcome::Confirmed
            }
            Ok(Resolution::Stale) => MutationOutcome::Stale,
            Err(e) => {
                warn!(list = %self.list, mutation_id = %mutation_id, error = %e, "Could not confirm mutation");
                MutationOutcome::Stale
            }
        }
    }

    async fn fail(&self, pending: PendingMutation<S::Row>, cause: SourceError) -> MutationOutcome {
        let mutation_id = pending.id;
        let kind = pending.kind;
        let target_id = pending.target_id.to_string();

        warn!(
            list = %self.list,
            mutation_id = %mutation_id,
            kind = %kind,
            target_id = %target_id,
            error = %cause,
            "Mutation failed, rolling back"
        );

        match self.store.rollback(pending).await {
            Ok(_) => {}
            Err(ListError::RollbackTargetMissing { target_id }) => {
                self.notifier
                    .notify(ListEvent::RollbackTargetMissing {
                        list: self.list.to_string(),
                        mutation_id,
                        target_id,
                    })
                    .await;
            }
            Err(e) => {
                warn!(list = %self.list, mutation_id = %mutation_id, error = %e, "Rollback failed");
            }
        }

        self.notifier
            .notify(ListEvent::MutationFailed {
                list: self.list.to_string(),
                kind,
                target_id: target_id.clone(),
                cause: cause.clone(),
            })
            .await;

        MutationOutcome::RolledBack(ListError::MutationFailed {
            kind,
            target_id,
            cause,
        })
    }
}
