//! One admin list: paginator, store queue, mutation coordinator and renderer state.

use std::{
    ops::Range,
    sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError},
};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use super::{
    config::ListConfig,
    coordinator::{DispatchedMutation, MutationCoordinator},
    error::ListError,
    paginator::CursorPaginator,
    queue::{MergeOutcome, StoreHandle, spawn_store},
    row_store::{ListView, RowStore},
    source::{RowId, RowSource, SourceMutation},
    types::{MergePosition, Row},
    window::{RenderState, Viewport, WindowedRenderer},
};
use crate::services::notification::{ListEvent, ListNotifier};

pub struct ListInstance<S: RowSource> {
    name: Arc<str>,
    config: ListConfig,
    paginator: CursorPaginator<S>,
    coordinator: MutationCoordinator<S>,
    store: StoreHandle<S::Row>,
    renderer: SyncMutex<WindowedRenderer>,
    /// Forward pagination has a single frontier, so fetches run one at a time
    fetch_lock: Mutex<()>,
    notifier: Arc<dyn ListNotifier>,
}

impl<S: RowSource> ListInstance<S> {
    /// Build a list over `source`. Spawns the store worker, so call it inside a Tokio runtime.
    pub fn new(
        name: impl Into<Arc<str>>,
        source: Arc<S>,
        notifier: Arc<dyn ListNotifier>,
        config: ListConfig,
    ) -> Result<Self, ListError> {
        config.validate()?;
        let name: Arc<str> = name.into();

        let store = spawn_store(name.clone(), RowStore::from_config(&config));
        let paginator = CursorPaginator::new(name.clone(), source.clone(), S::Filter::default());
        let coordinator = MutationCoordinator::new(
            name.clone(),
            source,
            store.clone(),
            notifier.clone(),
            config.mutation_timeout(),
        );

        info!(
            list = %name,
            page_size = config.page_size,
            overscan = config.overscan,
            "List instance ready"
        );

        Ok(Self {
            renderer: SyncMutex::new(WindowedRenderer::new(config.overscan)),
            name,
            config,
            paginator,
            coordinator,
            store,
            fetch_lock: Mutex::new(()),
            notifier,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Current snapshot of the rows
    pub fn view(&self) -> Arc<ListView<S::Row>> {
        self.store.view()
    }

    /// Receiver that changes on every store write
    pub fn subscribe(&self) -> watch::Receiver<Arc<ListView<S::Row>>> {
        self.store.subscribe()
    }

    fn renderer(&self) -> MutexGuard<'_, WindowedRenderer> {
        self.renderer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn render_state(&self) -> RenderState {
        self.renderer().state()
    }

    pub fn last_error(&self) -> Option<ListError> {
        self.renderer().last_error().cloned()
    }

    pub async fn filter(&self) -> S::Filter {
        self.paginator.filter().await
    }

    /// Make sure rows back `range` (plus overscan), fetching forward as needed.
    pub async fn ensure_range(&self, range: Range<usize>) -> Result<(), ListError> {
        let _fetching = self.fetch_lock.lock().await;

        loop {
            let view = self.view();
            let (missing, guard) = {
                let mut renderer = self.renderer();
                let missing = renderer.missing(range.clone(), view.len(), view.has_more)?;
                if missing.is_none() {
                    return Ok(());
                }
                if renderer.state() == RenderState::Error {
                    renderer.acknowledge_error();
                }
                if !renderer.begin_fetch() {
                    // Fetches hold `fetch_lock`, so only a reset can be in the way.
                    debug!(list = %self.name, state = %renderer.state(), "Fetch skipped");
                    return Err(ListError::Superseded(self.name.to_string()));
                }
                (missing, FetchGuard::new(&self.renderer))
            };
            debug!(list = %self.name, ?missing, "Fetching rows");

            let fetched = match self.paginator.fetch_next(self.config.page_size).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    guard.fail(e.clone());
                    if let ListError::FetchFailed(cause) = &e {
                        self.notifier
                            .notify(ListEvent::FetchFailed {
                                list: self.name.to_string(),
                                cause: cause.clone(),
                            })
                            .await;
                    }
                    return Err(e);
                }
            };

            let merged = match fetched {
                Some(fetched) => {
                    let position = if fetched.page.cursor.is_none() {
                        MergePosition::Replace
                    } else {
                        MergePosition::Append
                    };
                    self.store
                        .merge(fetched.generation, fetched.page, position)
                        .await?
                }
                None => MergeOutcome::Stale,
            };

            guard.finish();
            if merged == MergeOutcome::Stale {
                // Exhausted, or superseded by a reset; the caller re-plans from the new view.
                return Ok(());
            }
        }
    }

    pub async fn ensure_viewport(&self, viewport: Viewport) -> Result<(), ListError> {
        self.ensure_range(viewport.visible_range()).await
    }

    /// Rows of `viewport` that are loaded right now.
    pub fn visible_rows(&self, viewport: Viewport) -> Vec<S::Row> {
        let view = self.view();
        let range = self.renderer().render_range(viewport, view.len());
        view.slice(range).iter().map(|r| r.row.clone()).collect()
    }

    /// Switch filter: drop in-flight fetches and every row, then return to `Idle`.
    pub async fn set_filter(&self, filter: S::Filter) -> Result<(), ListError> {
        self.renderer().begin_reset();
        let generation = self.paginator.reset(filter).await;
        let result = self.store.reset(generation).await;
        self.renderer().finish_reset();
        info!(list = %self.name, generation, "List reset");
        result
    }

    /// Reload from the first page with the current filter.
    pub async fn refresh(&self) -> Result<(), ListError> {
        let filter = self.paginator.filter().await;
        self.set_filter(filter).await
    }

    /// Back to the default filter and an empty store.
    pub async fn reset(&self) -> Result<(), ListError> {
        self.set_filter(S::Filter::default()).await
    }

    pub async fn dispatch(
        &self,
        mutation: SourceMutation<S>,
    ) -> Result<DispatchedMutation<RowId<S>>, ListError> {
        self.coordinator.dispatch(mutation).await
    }

    /// Drop a row the server removed outside this list (e.g. another admin's delete).
    pub async fn remove_confirmed(&self, id: RowId<S>) -> Result<Option<S::Row>, ListError> {
        self.store.remove(id).await
    }

    pub async fn acknowledge_failure(&self, id: RowId<S>) -> Result<bool, ListError> {
        self.store.acknowledge_failure(id).await
    }

    pub fn find(&self, id: &RowId<S>) -> Option<S::Row> {
        self.view()
            .rows
            .iter()
            .find(|r| &r.row.id() == id)
            .map(|r| r.row.clone())
    }
}

/// Holds `Fetching` for one page. Dropping it unsettled, because the caller
/// gave up on the future or the store worker went away, returns to `Idle`.
struct FetchGuard<'a> {
    renderer: &'a SyncMutex<WindowedRenderer>,
    settled: bool,
}

impl<'a> FetchGuard<'a> {
    fn new(renderer: &'a SyncMutex<WindowedRenderer>) -> Self {
        Self {
            renderer,
            settled: false,
        }
    }

    fn lock(&self) -> MutexGuard<'a, WindowedRenderer> {
        self.renderer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(mut self) {
        self.settled = true;
        self.lock().finish_fetch();
    }

    fn fail(mut self, error: ListError) {
        self.settled = true;
        self.lock().fail_fetch(error);
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            // No-op if a reset already took over.
            self.lock().finish_fetch();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use super::*;
    use crate::services::{
        list::{
            coordinator::MutationOutcome,
            error::SourceError,
            test_support::{FakeSource, Item, ItemFilter},
            types::{Mutation, MutationKind, SyncState},
        },
        notification::NotificationService,
    };

    fn list(
        source: Arc<FakeSource>,
        config: ListConfig,
    ) -> (ListInstance<FakeSource>, NotificationService) {
        let notifications = NotificationService::default();
        let instance =
            ListInstance::new("items", source, Arc::new(notifications.clone()), config).unwrap();
        (instance, notifications)
    }

    fn config(page_size: usize, overscan: usize) -> ListConfig {
        ListConfig {
            page_size,
            overscan,
            ..ListConfig::default()
        }
    }

    #[tokio::test]
    async fn test_two_pages_merge_without_duplicates() {
        let source = Arc::new(FakeSource::with_rows(60));
        let (list, _) = list(source, config(20, 0));

        list.ensure_range(0..20).await.unwrap();
        let view = list.view();
        assert_eq!(view.len(), 20);
        assert_eq!(view.ids(), (1..=20).collect::<Vec<u32>>());
        assert!(view.has_more);

        list.ensure_range(20..40).await.unwrap();
        let ids = list.view().ids();
        assert_eq!(ids, (1..=40).collect::<Vec<u32>>());
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 40);
        assert_eq!(list.render_state(), RenderState::Idle);
    }

    #[tokio::test]
    async fn test_overscan_prefetches_past_viewport() {
        let source = Arc::new(FakeSource::with_rows(100));
        let (list, _) = list(source.clone(), config(10, 5));

        list.ensure_viewport(Viewport::new(0, 10)).await.unwrap();
        assert_eq!(list.view().len(), 20);
        assert_eq!(
            source.fetch_calls.load(std::sync::atomic::Ordering::SeqCst),
            2
        );

        let visible = list.visible_rows(Viewport::new(5, 10));
        assert_eq!(visible.first().map(|r| r.id), Some(6));
        assert_eq!(visible.len(), 10);
    }

    #[tokio::test]
    async fn test_fetch_stops_when_source_is_exhausted() {
        let source = Arc::new(FakeSource::with_rows(7));
        let (list, _) = list(source, config(5, 0));

        list.ensure_range(0..50).await.unwrap();
        let view = list.view();
        assert_eq!(view.len(), 7);
        assert!(!view.has_more);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported_and_retryable() {
        let source = Arc::new(FakeSource::with_rows(30));
        source.fail_fetches(true);
        let (list, notifications) = list(source.clone(), config(10, 0));

        let err = list.ensure_range(0..10).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(list.render_state(), RenderState::Error);
        assert!(list.view().is_empty());
        let recent = notifications.recent().await;
        assert!(matches!(recent[0].event, ListEvent::FetchFailed { .. }));

        source.fail_fetches(false);
        list.ensure_range(0..10).await.unwrap();
        assert_eq!(list.view().len(), 10);
        assert_eq!(list.render_state(), RenderState::Idle);
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back_and_notifies() {
        let source = Arc::new(FakeSource::with_rows(3));
        let (list, notifications) = list(source.clone(), config(10, 0));
        list.ensure_range(0..3).await.unwrap();
        let original = list.find(&2).unwrap();

        source.fail_mutations(true);
        let dispatched = list
            .dispatch(Mutation::Update {
                id: 2,
                payload: "X".to_string(),
            })
            .await
            .unwrap();
        // Visible immediately, before the server answers
        assert_eq!(list.find(&2).unwrap().name, "X");

        let outcome = dispatched.resolved().await;
        assert_eq!(
            outcome,
            MutationOutcome::RolledBack(ListError::MutationFailed {
                kind: MutationKind::Update,
                target_id: "2".to_string(),
                cause: SourceError::Transport("connection reset".to_string()),
            })
        );

        let view = list.view();
        assert_eq!(view.ids(), vec![1, 2, 3]);
        assert_eq!(view.rows[1].row, original);
        assert_eq!(view.rows[1].sync_state, SyncState::Failed);

        let recent = notifications.recent().await;
        assert_eq!(recent.len(), 1);
        assert!(matches!(
            &recent[0].event,
            ListEvent::MutationFailed { kind: MutationKind::Update, target_id, .. } if target_id == "2"
        ));
    }

    #[tokio::test]
    async fn test_confirmed_create_carries_server_id() {
        let source = Arc::new(FakeSource::with_rows(2));
        let (list, _) = list(source.clone(), config(10, 0));
        list.ensure_range(0..2).await.unwrap();

        let dispatched = list
            .dispatch(Mutation::Create {
                payload: "walk-in".to_string(),
            })
            .await
            .unwrap();
        let placeholder = list.view().rows[0].row.clone();
        assert_eq!(placeholder.name, "walk-in");
        assert_eq!(list.view().rows[0].sync_state, SyncState::Pending);

        assert_eq!(dispatched.resolved().await, MutationOutcome::Confirmed);
        let view = list.view();
        assert_eq!(view.ids(), vec![1_000, 1, 2]);
        assert!(view.find(&placeholder.id).is_none());
        assert_eq!(view.rows[0].sync_state, SyncState::Confirmed);
        assert_eq!(view.pending, 0);
    }

    #[tokio::test]
    async fn test_second_dispatch_on_pending_row_conflicts() {
        let source = Arc::new(FakeSource::with_rows(3));
        let (list, _) = list(source.clone(), config(10, 0));
        list.ensure_range(0..3).await.unwrap();
        source.delay_mutations(Duration::from_millis(50));

        let first = list
            .dispatch(Mutation::Update {
                id: 1,
                payload: "first".to_string(),
            })
            .await
            .unwrap();
        let err = list.dispatch(Mutation::Delete { id: 1 }).await.unwrap_err();
        assert_eq!(
            err,
            ListError::MutationConflict {
                target_id: "1".to_string()
            }
        );
        assert_eq!(list.find(&1).unwrap().name, "first");

        assert_eq!(first.resolved().await, MutationOutcome::Confirmed);
        // Once resolved, the row accepts new mutations.
        let second = list.dispatch(Mutation::Delete { id: 1 }).await.unwrap();
        assert_eq!(second.resolved().await, MutationOutcome::Confirmed);
        assert_eq!(list.view().ids(), vec![2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_mutation_times_out_and_rolls_back() {
        let source = Arc::new(FakeSource::with_rows(3));
        let config = ListConfig {
            mutation_timeout_ms: 1_000,
            ..config(10, 0)
        };
        let (list, notifications) = list(source.clone(), config);
        list.ensure_range(0..3).await.unwrap();
        source.delay_mutations(Duration::from_secs(60));

        let dispatched = list.dispatch(Mutation::Delete { id: 3 }).await.unwrap();
        assert_eq!(list.view().ids(), vec![1, 2]);

        let outcome = dispatched.resolved().await;
        assert!(matches!(
            outcome,
            MutationOutcome::RolledBack(ListError::MutationFailed {
                cause: SourceError::Timeout,
                ..
            })
        ));
        assert_eq!(list.view().ids(), vec![1, 2, 3]);
        assert_eq!(list.view().pending, 0);
        assert_eq!(notifications.recent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_change_discards_in_flight_page() {
        let source = Arc::new(FakeSource::with_rows(30));
        let gate = source.gate_fetches();
        let (list, _) = list(source.clone(), config(10, 0));
        let list = Arc::new(list);

        let stale_fetch = {
            let list = list.clone();
            tokio::spawn(async move { list.ensure_range(0..10).await })
        };
        while source.fetch_calls.load(std::sync::atomic::Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        list.set_filter(ItemFilter { min_id: Some(21) }).await.unwrap();
        gate.add_permits(1);
        stale_fetch.await.unwrap().unwrap();
        assert!(list.view().is_empty());
        assert_eq!(list.render_state(), RenderState::Idle);

        gate.add_permits(10);
        list.ensure_range(0..10).await.unwrap();
        let ids = list.view().ids();
        assert_eq!(ids, (21..=30).collect::<Vec<u32>>());
        assert!(!list.view().has_more);
    }

    #[tokio::test]
    async fn test_abandoned_fetch_does_not_wedge_the_list() {
        let source = Arc::new(FakeSource::with_rows(30));
        let gate = source.gate_fetches();
        let (list, _) = list(source.clone(), config(10, 0));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), list.ensure_range(0..10)).await;
        assert!(abandoned.is_err());
        assert_eq!(list.render_state(), RenderState::Idle);

        gate.add_permits(10);
        list.ensure_range(0..10).await.unwrap();
        assert_eq!(list.view().len(), 10);
        assert_eq!(list.render_state(), RenderState::Idle);
    }

    #[tokio::test]
    async fn test_rollback_of_removed_row_reports_missing_target() {
        let source = Arc::new(FakeSource::with_rows(3));
        let (list, notifications) = list(source.clone(), config(10, 0));
        list.ensure_range(0..3).await.unwrap();
        source.fail_mutations(true);
        source.delay_mutations(Duration::from_millis(50));

        let dispatched = list
            .dispatch(Mutation::Update {
                id: 2,
                payload: "X".to_string(),
            })
            .await
            .unwrap();
        // Another admin deleted the row while the update was in flight.
        assert!(list.remove_confirmed(2).await.unwrap().is_some());

        let outcome = dispatched.resolved().await;
        assert!(matches!(
            outcome,
            MutationOutcome::RolledBack(ListError::MutationFailed { .. })
        ));
        assert_eq!(list.view().ids(), vec![1, 3]);
        assert_eq!(list.view().pending, 0);

        let events: Vec<ListEvent> = notifications
            .recent()
            .await
            .into_iter()
            .map(|n| n.event)
            .collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| matches!(
            e,
            ListEvent::RollbackTargetMissing { target_id, .. } if target_id == "2"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ListEvent::MutationFailed { kind: MutationKind::Update, target_id, .. } if target_id == "2"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_deletes_restore_original_order() {
        let source = Arc::new(FakeSource::with_rows(5));
        let config = ListConfig {
            mutation_timeout_ms: 1_000,
            ..config(10, 0)
        };
        let (list, _) = list(source.clone(), config);
        list.ensure_range(0..5).await.unwrap();
        source.delay_mutations(Duration::from_secs(60));

        let first = list.dispatch(Mutation::Delete { id: 2 }).await.unwrap();
        let second = list.dispatch(Mutation::Delete { id: 3 }).await.unwrap();
        let created = list
            .dispatch(Mutation::Create {
                payload: "walk-in".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(list.view().len(), 4);

        first.resolved().await;
        second.resolved().await;
        created.resolved().await;
        assert_eq!(list.view().ids(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_lists_are_independent() {
        let customers = Arc::new(FakeSource::with_rows(5));
        let bookings = Arc::new(FakeSource::with_rows(5));
        bookings.fail_fetches(true);
        let (customer_list, _) = list(customers, config(5, 0));
        let (booking_list, _) = list(bookings, config(5, 0));

        let (a, b) = tokio::join!(
            customer_list.ensure_range(0..5),
            booking_list.ensure_range(0..5)
        );
        assert!(a.is_ok());
        assert!(b.is_err());
        assert_eq!(customer_list.view().len(), 5);
        assert_eq!(customer_list.render_state(), RenderState::Idle);
        assert_eq!(booking_list.render_state(), RenderState::Error);
    }

    #[tokio::test]
    async fn test_update_of_unloaded_row_is_rejected() {
        let source = Arc::new(FakeSource::with_rows(3));
        let (list, _) = list(source, config(10, 0));

        let err = list
            .dispatch(Mutation::Update {
                id: 2,
                payload: "nope".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ListError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let source = Arc::new(FakeSource::with_rows(3));
        let result = ListInstance::new(
            "items",
            source,
            Arc::new(NotificationService::default()),
            config(0, 0),
        );
        assert!(matches!(result, Err(ListError::InvalidArgument(_))));
    }

    #[allow(dead_code)]
    fn assert_send_sync() {
        fn check<T: Send + Sync>() {}
        check::<ListInstance<FakeSource>>();
        check::<Item>();
    }
}
