//! The customer and booking lists of the admin dashboard, backed by SQLite.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use db::{
    DBService,
    models::{
        booking::{Booking, BookingFilter, BookingStatus, CreateBooking, UpdateBooking},
        customer::{CreateCustomer, Customer, CustomerFilter, UpdateCustomer},
        page::{PageCursor, Paginated, clamp_page_size},
    },
};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    app_state::{AppState, AppStore},
    list::{Cursor, ListConfig, ListError, ListInstance, Page, Row, RowSource, SourceError},
    notification::ListNotifier,
};

impl Row for Customer {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Row for Booking {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

fn decode_cursor(cursor: Option<&Cursor>) -> Result<Option<PageCursor>, SourceError> {
    cursor
        .map(|c| PageCursor::decode(c.as_str()))
        .transpose()
        .map_err(|e| SourceError::Validation(e.to_string()))
}

fn into_page<T>(cursor: Option<&Cursor>, paginated: Paginated<T>) -> Page<T> {
    Page {
        cursor: cursor.cloned(),
        next_cursor: paginated.next_cursor.map(Cursor::new),
        rows: paginated.items,
        has_more: paginated.has_more,
    }
}

fn require(field: &str, value: &str) -> Result<(), SourceError> {
    if value.trim().is_empty() {
        return Err(SourceError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_email(value: &str) -> Result<(), SourceError> {
    require("email", value)?;
    if !value.contains('@') {
        return Err(SourceError::Validation(format!(
            "{} is not an email address",
            value.trim()
        )));
    }
    Ok(())
}

fn page_limit(page_size: usize) -> i64 {
    clamp_page_size(i64::try_from(page_size).unwrap_or(i64::MAX))
}

pub struct CustomerSource {
    pool: SqlitePool,
}

impl CustomerSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowSource for CustomerSource {
    type Row = Customer;
    type Filter = CustomerFilter;
    type CreatePayload = CreateCustomer;
    type UpdatePayload = UpdateCustomer;

    async fn fetch_page(
        &self,
        filter: &CustomerFilter,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<Customer>, SourceError> {
        let after = decode_cursor(cursor)?;
        let paginated = Customer::find_page(&self.pool, filter, after, page_limit(page_size)).await?;
        Ok(into_page(cursor, paginated))
    }

    async fn create_row(&self, payload: &CreateCustomer) -> Result<Customer, SourceError> {
        require("name", &payload.name)?;
        require_email(&payload.email)?;
        Ok(Customer::create(&self.pool, Uuid::new_v4(), payload).await?)
    }

    async fn update_row(&self, id: &Uuid, payload: &UpdateCustomer) -> Result<Customer, SourceError> {
        if let Some(name) = &payload.name {
            require("name", name)?;
        }
        if let Some(email) = &payload.email {
            require_email(email)?;
        }
        Customer::update(&self.pool, *id, payload)
            .await?
            .ok_or_else(|| SourceError::NotFound(format!("customer {id}")))
    }

    async fn delete_row(&self, id: &Uuid) -> Result<(), SourceError> {
        let rows_affected = Customer::delete(&self.pool, *id).await?;
        if rows_affected == 0 {
            debug!(customer_id = %id, "Customer already deleted");
        }
        Ok(())
    }

    fn project_create(&self, payload: &CreateCustomer) -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_string(),
            phone: payload.phone.clone(),
            notes: payload.notes.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn project_update(&self, current: &Customer, payload: &UpdateCustomer) -> Customer {
        let mut row = current.clone();
        if let Some(name) = &payload.name {
            row.name = name.trim().to_string();
        }
        if let Some(email) = &payload.email {
            row.email = email.trim().to_string();
        }
        if payload.phone.is_some() {
            row.phone = payload.phone.clone();
        }
        if payload.notes.is_some() {
            row.notes = payload.notes.clone();
        }
        row.updated_at = Utc::now();
        row
    }
}

pub struct BookingSource {
    pool: SqlitePool,
}

impl BookingSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate_deposit(deposit_cents: Option<i64>) -> Result<(), SourceError> {
        match deposit_cents {
            Some(cents) if cents < 0 => Err(SourceError::Validation(
                "deposit cannot be negative".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RowSource for BookingSource {
    type Row = Booking;
    type Filter = BookingFilter;
    type CreatePayload = CreateBooking;
    type UpdatePayload = UpdateBooking;

    async fn fetch_page(
        &self,
        filter: &BookingFilter,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<Booking>, SourceError> {
        let after = decode_cursor(cursor)?;
        let paginated = Booking::find_page(&self.pool, filter, after, page_limit(page_size)).await?;
        Ok(into_page(cursor, paginated))
    }

    async fn create_row(&self, payload: &CreateBooking) -> Result<Booking, SourceError> {
        require("client name", &payload.client_name)?;
        require_email(&payload.email)?;
        require("service", &payload.service)?;
        Self::validate_deposit(payload.deposit_cents)?;
        Ok(Booking::create(&self.pool, Uuid::new_v4(), payload).await?)
    }

    async fn update_row(&self, id: &Uuid, payload: &UpdateBooking) -> Result<Booking, SourceError> {
        if let Some(client_name) = &payload.client_name {
            require("client name", client_name)?;
        }
        if let Some(email) = &payload.email {
            require_email(email)?;
        }
        if let Some(service) = &payload.service {
            require("service", service)?;
        }
        Self::validate_deposit(payload.deposit_cents)?;
        Booking::update(&self.pool, *id, payload)
            .await?
            .ok_or_else(|| SourceError::NotFound(format!("booking {id}")))
    }

    async fn delete_row(&self, id: &Uuid) -> Result<(), SourceError> {
        let rows_affected = Booking::delete(&self.pool, *id).await?;
        if rows_affected == 0 {
            debug!(booking_id = %id, "Booking already deleted");
        }
        Ok(())
    }

    fn project_create(&self, payload: &CreateBooking) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            customer_id: payload.customer_id,
            client_name: payload.client_name.trim().to_string(),
            email: payload.email.trim().to_string(),
            service: payload.service.trim().to_string(),
            placement: payload.placement.clone(),
            status: BookingStatus::default(),
            scheduled_at: payload.scheduled_at,
            deposit_cents: payload.deposit_cents,
            notes: payload.notes.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn project_update(&self, current: &Booking, payload: &UpdateBooking) -> Booking {
        let mut row = current.clone();
        if let Some(client_name) = &payload.client_name {
            row.client_name = client_name.trim().to_string();
        }
        if let Some(email) = &payload.email {
            row.email = email.trim().to_string();
        }
        if let Some(service) = &payload.service {
            row.service = service.trim().to_string();
        }
        if payload.placement.is_some() {
            row.placement = payload.placement.clone();
        }
        if let Some(status) = payload.status {
            row.status = status;
        }
        if payload.scheduled_at.is_some() {
            row.scheduled_at = payload.scheduled_at;
        }
        if payload.deposit_cents.is_some() {
            row.deposit_cents = payload.deposit_cents;
        }
        if payload.notes.is_some() {
            row.notes = payload.notes.clone();
        }
        row.updated_at = Utc::now();
        row
    }
}

/// Both dashboard lists, each with its own store queue
#[derive(Clone)]
pub struct AdminLists {
    pub customers: Arc<ListInstance<CustomerSource>>,
    pub bookings: Arc<ListInstance<BookingSource>>,
}

impl AdminLists {
    pub fn new(
        db: &DBService,
        notifier: Arc<dyn ListNotifier>,
        config: ListConfig,
    ) -> Result<Self, ListError> {
        let customers = ListInstance::new(
            "customers",
            Arc::new(CustomerSource::new(db.pool.clone())),
            notifier.clone(),
            config.clone(),
        )?;
        let bookings = ListInstance::new(
            "bookings",
            Arc::new(BookingSource::new(db.pool.clone())),
            notifier,
            config,
        )?;

        Ok(Self {
            customers: Arc::new(customers),
            bookings: Arc::new(bookings),
        })
    }

    /// Reset the lists whose filter differs from `state`.
    pub async fn apply_filters(&self, state: &AppState) -> Result<(), ListError> {
        if self.customers.filter().await != state.customer_filter {
            self.customers
                .set_filter(state.customer_filter.clone())
                .await?;
        }
        if self.bookings.filter().await != state.booking_filter {
            self.bookings.set_filter(state.booking_filter.clone()).await?;
        }
        Ok(())
    }

    pub async fn reset_all(&self) -> Result<(), ListError> {
        self.customers.reset().await?;
        self.bookings.reset().await?;
        Ok(())
    }

    /// End the admin session and drop every loaded row.
    pub async fn sign_out(&self, store: &AppStore) -> Result<(), ListError> {
        store.sign_out();
        self.reset_all().await?;
        info!("Admin lists cleared after sign-out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::services::{
        list::{Mutation, MutationOutcome, SyncState},
        notification::{ListEvent, NotificationService},
    };

    async fn seeded(customers: usize) -> (DBService, AdminLists, NotificationService) {
        let db = DBService::new_in_memory().await.unwrap();
        for i in 0..customers {
            Customer::create(
                &db.pool,
                Uuid::new_v4(),
                &CreateCustomer {
                    name: format!("Client {i}"),
                    email: format!("client{i}@example.com"),
                    phone: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        }
        let notifications = NotificationService::default();
        let config = ListConfig {
            page_size: 10,
            overscan: 0,
            ..ListConfig::default()
        };
        let lists = AdminLists::new(&db, Arc::new(notifications.clone()), config).unwrap();
        (db, lists, notifications)
    }

    fn booking(client_name: &str) -> CreateBooking {
        CreateBooking {
            customer_id: None,
            client_name: client_name.to_string(),
            email: "walkin@example.com".to_string(),
            service: "Flash".to_string(),
            placement: None,
            scheduled_at: None,
            deposit_cents: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_customer_list_pages_through_database() {
        let (_db, lists, _) = seeded(30).await;

        lists.customers.ensure_range(0..25).await.unwrap();
        let view = lists.customers.view();
        assert_eq!(view.len(), 30);
        assert!(!view.has_more);
        assert_eq!(view.ids().into_iter().collect::<HashSet<_>>().len(), 30);
        // Newest first
        assert_eq!(view.rows[0].row.name, "Client 29");
        assert_eq!(view.rows[29].row.name, "Client 0");
    }

    #[tokio::test]
    async fn test_created_booking_gets_database_id() {
        let (db, lists, _) = seeded(0).await;
        lists.bookings.ensure_range(0..10).await.unwrap();

        let dispatched = lists
            .bookings
            .dispatch(Mutation::Create {
                payload: booking("Mira"),
            })
            .await
            .unwrap();
        let placeholder = lists.bookings.view().rows[0].row.id;
        assert_eq!(dispatched.resolved().await, MutationOutcome::Confirmed);

        let view = lists.bookings.view();
        assert_eq!(view.len(), 1);
        let stored = &view.rows[0];
        assert_ne!(stored.row.id, placeholder);
        assert_eq!(stored.sync_state, SyncState::Confirmed);
        let persisted = Booking::find_by_id(&db.pool, stored.row.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.client_name, "Mira");
        assert_eq!(persisted.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_invalid_update_is_rolled_back() {
        let (db, lists, notifications) = seeded(3).await;
        lists.customers.ensure_range(0..3).await.unwrap();
        let target = lists.customers.view().rows[1].row.clone();

        let dispatched = lists
            .customers
            .dispatch(Mutation::Update {
                id: target.id,
                payload: UpdateCustomer {
                    email: Some("not-an-email".to_string()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert!(matches!(
            dispatched.resolved().await,
            MutationOutcome::RolledBack(ListError::MutationFailed {
                cause: SourceError::Validation(_),
                ..
            })
        ));

        let view = lists.customers.view();
        assert_eq!(view.rows[1].row, target);
        assert_eq!(view.rows[1].sync_state, SyncState::Failed);
        let persisted = Customer::find_by_id(&db.pool, target.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.email, target.email);
        assert!(matches!(
            notifications.recent().await[0].event,
            ListEvent::MutationFailed { .. }
        ));

        assert!(lists.customers.acknowledge_failure(target.id).await.unwrap());
        assert_eq!(lists.customers.view().rows[1].sync_state, SyncState::Confirmed);
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_is_idempotent() {
        let (db, lists, _) = seeded(2).await;
        lists.customers.ensure_range(0..2).await.unwrap();
        let target = lists.customers.view().rows[0].row.id;

        Customer::delete(&db.pool, target).await.unwrap();
        // Already gone on the server: the delete still confirms.
        let dispatched = lists
            .customers
            .dispatch(Mutation::Delete { id: target })
            .await
            .unwrap();
        assert_eq!(dispatched.resolved().await, MutationOutcome::Confirmed);
        assert_eq!(lists.customers.view().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_cursor_is_a_validation_error() {
        let db = DBService::new_in_memory().await.unwrap();
        let source = CustomerSource::new(db.pool.clone());
        let err = source
            .fetch_page(&CustomerFilter::default(), Some(&Cursor::new("???")), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_filters_follow_app_state_and_sign_out_clears_lists() {
        let (db, lists, _) = seeded(0).await;
        let first = Booking::create(&db.pool, Uuid::new_v4(), &booking("Ana"))
            .await
            .unwrap();
        Booking::create(&db.pool, Uuid::new_v4(), &booking("Bo"))
            .await
            .unwrap();
        Booking::update_status(&db.pool, first.id, BookingStatus::Confirmed)
            .await
            .unwrap();

        let store = AppStore::default();
        store.sign_in("owner@studio.test");
        store.set_booking_filter(BookingFilter {
            status: Some(BookingStatus::Confirmed),
            ..Default::default()
        });
        lists.apply_filters(&store.current()).await.unwrap();
        lists.bookings.ensure_range(0..10).await.unwrap();
        assert_eq!(lists.bookings.view().ids(), vec![first.id]);

        lists.sign_out(&store).await.unwrap();
        assert!(!store.is_signed_in());
        assert!(lists.bookings.view().is_empty());
        assert_eq!(lists.bookings.filter().await, BookingFilter::default());
    }
}
