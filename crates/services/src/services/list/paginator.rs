//! Forward-only cursor pagination over a [`RowSource`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    error::ListError,
    source::RowSource,
    types::{Cursor, Page},
};

/// A page tagged with the generation (filter epoch) it was fetched for
#[derive(Debug, Clone)]
pub struct FetchedPage<R> {
    pub generation: u64,
    pub page: Page<R>,
}

struct PaginatorState<F> {
    filter: F,
    generation: u64,
    /// Request cursors of fetched pages, in fetch order
    known_cursors: Vec<Cursor>,
    next_cursor: Option<Cursor>,
    started: bool,
    has_more: bool,
    cancel: CancellationToken,
}

impl<F> PaginatorState<F> {
    fn new(filter: F, generation: u64) -> Self {
        Self {
            filter,
            generation,
            known_cursors: Vec::new(),
            next_cursor: None,
            started: false,
            has_more: true,
            cancel: CancellationToken::new(),
        }
    }
}

pub struct CursorPaginator<S: RowSource> {
    list: Arc<str>,
    source: Arc<S>,
    state: Mutex<PaginatorState<S::Filter>>,
}

impl<S: RowSource> CursorPaginator<S> {
    pub fn new(list: Arc<str>, source: Arc<S>, filter: S::Filter) -> Self {
        Self {
            list,
            source,
            state: Mutex::new(PaginatorState::new(filter, 0)),
        }
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    pub async fn filter(&self) -> S::Filter {
        self.state.lock().await.filter.clone()
    }

    pub async fn has_more(&self) -> bool {
        let state = self.state.lock().await;
        !state.started || state.has_more
    }

    pub async fn known_cursors(&self) -> Vec<Cursor> {
        self.state.lock().await.known_cursors.clone()
    }

    /// Fetch the page at `cursor` for the active filter.
    ///
    /// Returns `Ok(None)` when a reset superseded the request while it was in
    /// flight; such a page must never be merged.
    pub async fn fetch_page(
        &self,
        cursor: Option<Cursor>,
        page_size: usize,
    ) -> Result<Option<FetchedPage<S::Row>>, ListError> {
        if page_size == 0 {
            return Err(ListError::InvalidArgument(
                "page size must be at least 1".to_string(),
            ));
        }

        let (filter, generation, cancel) = {
            let state = self.state.lock().await;
            (state.filter.clone(), state.generation, state.cancel.clone())
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(list = %self.list, generation, "Fetch cancelled by reset");
                return Ok(None);
            }
            result = self.source.fetch_page(&filter, cursor.as_ref(), page_size) => result,
        };
        let mut page = result.map_err(ListError::FetchFailed)?;
        page.cursor = cursor;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(
                list = %self.list,
                fetched_generation = generation,
                active_generation = state.generation,
                "Dropping stale page"
            );
            return Ok(None);
        }

        let at_frontier = match &page.cursor {
            None => !state.started,
            Some(cursor) => state.next_cursor.as_ref() == Some(cursor),
        };
        if let Some(cursor) = &page.cursor {
            if !state.known_cursors.contains(cursor) {
                state.known_cursors.push(cursor.clone());
            }
        }
        if at_frontier {
            state.started = true;
            state.next_cursor = page.next_cursor.clone();
            state.has_more = page.has_more && page.next_cursor.is_some();
        }

        debug!(
            list = %self.list,
            generation,
            rows = page.rows.len(),
            has_more = page.has_more,
            "Fetched page"
        );
        Ok(Some(FetchedPage { generation, page }))
    }

    /// Fetch the page after the last one received, or the first page.
    ///
    /// `Ok(None)` once the source is exhausted or when the fetch went stale.
    pub async fn fetch_next(
        &self,
        page_size: usize,
    ) -> Result<Option<FetchedPage<S::Row>>, ListError> {
        let cursor = {
            let state = self.state.lock().await;
            if state.started && !state.has_more {
                return Ok(None);
            }
            state.next_cursor.clone()
        };
        self.fetch_page(cursor, page_size).await
    }

    /// Switch to `filter`, cancelling in-flight fetches. Returns the new generation.
    pub async fn reset(&self, filter: S::Filter) -> u64 {
        let mut state = self.state.lock().await;
        state.cancel.cancel();
        let generation = state.generation + 1;
        *state = PaginatorState::new(filter, generation);
        debug!(list = %self.list, generation, "Paginator reset");
        generation
    }
}
