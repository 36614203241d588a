//! Fixtures shared by the list tests.

use std::{
    ops::Range,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{
    error::SourceError,
    source::RowSource,
    types::{Cursor, Page, Row},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: u32,
    pub name: String,
}

impl Row for Item {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }
}

pub fn item(id: u32, name: &str) -> Item {
    Item {
        id,
        name: name.to_string(),
    }
}

pub fn page_of(ids: Range<u32>, has_more: bool) -> Page<Item> {
    Page {
        cursor: None,
        next_cursor: None,
        rows: ids.map(|id| item(id, &format!("item {id}"))).collect(),
        has_more,
    }
}

/// Only rows with `id >= min_id` are listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    pub min_id: Option<u32>,
}

/// In-memory source with offset cursors, switchable failures and a fetch gate.
pub struct FakeSource {
    rows: Mutex<Vec<Item>>,
    next_server_id: AtomicU32,
    next_placeholder_id: AtomicU32,
    fail_fetches: AtomicBool,
    fail_mutations: AtomicBool,
    mutation_delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    pub fetch_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_rows(count: u32) -> Self {
        Self {
            rows: Mutex::new((1..=count).map(|id| item(id, &format!("item {id}"))).collect()),
            next_server_id: AtomicU32::new(1_000),
            next_placeholder_id: AtomicU32::new(900_000),
            fail_fetches: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
            mutation_delay: Mutex::new(None),
            gate: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn delay_mutations(&self, delay: Duration) {
        *self.mutation_delay.lock().unwrap() = Some(delay);
    }

    /// Hold every subsequent fetch until a permit is added to the returned semaphore.
    pub fn gate_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn server_row(&self, id: u32) -> Option<Item> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    async fn before_mutation(&self) -> Result<(), SourceError> {
        let delay = *self.mutation_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(SourceError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RowSource for FakeSource {
    type Row = Item;
    type Filter = ItemFilter;
    type CreatePayload = String;
    type UpdatePayload = String;

    async fn fetch_page(
        &self,
        filter: &ItemFilter,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<Item>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| SourceError::Transport(e.to_string()))?
                .forget();
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(SourceError::Transport("connection refused".to_string()));
        }

        let offset: usize = match cursor {
            Some(cursor) => cursor
                .as_str()
                .parse()
                .map_err(|_| SourceError::Validation("bad cursor".to_string()))?,
            None => 0,
        };
        let matching: Vec<Item> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.min_id.is_none_or(|min| r.id >= min))
            .cloned()
            .collect();
        let rows: Vec<Item> = matching.iter().skip(offset).take(page_size).cloned().collect();
        let end = offset + rows.len();
        let has_more = end < matching.len();

        Ok(Page {
            cursor: cursor.cloned(),
            next_cursor: has_more.then(|| Cursor::new(end.to_string())),
            rows,
            has_more,
        })
    }

    async fn create_row(&self, payload: &String) -> Result<Item, SourceError> {
        self.before_mutation().await?;
        let row = item(self.next_server_id.fetch_add(1, Ordering::SeqCst), payload);
        self.rows.lock().unwrap().insert(0, row.clone());
        Ok(row)
    }

    async fn update_row(&self, id: &u32, payload: &String) -> Result<Item, SourceError> {
        self.before_mutation().await?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        row.name = payload.clone();
        Ok(row.clone())
    }

    async fn delete_row(&self, id: &u32) -> Result<(), SourceError> {
        self.before_mutation().await?;
        self.rows.lock().unwrap().retain(|r| r.id != *id);
        Ok(())
    }

    fn project_create(&self, payload: &String) -> Item {
        item(
            self.next_placeholder_id.fetch_add(1, Ordering::SeqCst),
            payload,
        )
    }

    fn project_update(&self, current: &Item, payload: &String) -> Item {
        Item {
            id: current.id,
            name: payload.clone(),
        }
    }
}
