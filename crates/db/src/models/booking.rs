use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::page::{PageCursor, Paginated, search_pattern};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

/// A tattoo session request or appointment
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Option<Uuid>, // Foreign key to Customer, kept when the customer is removed
    pub client_name: String,
    pub email: String,
    pub service: String,
    pub placement: Option<String>,
    pub status: BookingStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub deposit_cents: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateBooking {
    pub customer_id: Option<Uuid>,
    pub client_name: String,
    pub email: String,
    pub service: String,
    pub placement: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub deposit_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateBooking {
    pub client_name: Option<String>,
    pub email: Option<String>,
    pub service: Option<String>,
    pub placement: Option<String>,
    pub status: Option<BookingStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub deposit_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Filter applied to the booking listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct BookingFilter {
    pub search: Option<String>,
    pub status: Option<BookingStatus>,
}

#[derive(FromRow)]
struct BookingRow {
    row_seq: i64,
    #[sqlx(flatten)]
    booking: Booking,
}

const BOOKING_COLUMNS: &str = "id, customer_id, client_name, email, service, placement, status, \
     scheduled_at, deposit_cents, notes, created_at, updated_at";

impl Booking {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateBooking,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"INSERT INTO bookings
                   (id, customer_id, client_name, email, service, placement, scheduled_at, deposit_cents, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {BOOKING_COLUMNS}"#
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(data.customer_id)
            .bind(data.client_name.trim())
            .bind(data.email.trim())
            .bind(data.service.trim())
            .bind(&data.placement)
            .bind(data.scheduled_at)
            .bind(data.deposit_cents)
            .bind(&data.notes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_customer_id(
        pool: &SqlitePool,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE customer_id = $1 ORDER BY rowid DESC"
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(customer_id)
            .fetch_all(pool)
            .await
    }

    /// Newest-first page of bookings matching `filter`, starting after `cursor`.
    pub async fn find_page(
        pool: &SqlitePool,
        filter: &BookingFilter,
        cursor: Option<PageCursor>,
        limit: i64,
    ) -> Result<Paginated<Self>, sqlx::Error> {
        let sql = format!(
            r#"SELECT rowid AS row_seq, {BOOKING_COLUMNS}
               FROM bookings
               WHERE ($1 IS NULL OR rowid < $1)
                 AND ($2 IS NULL OR client_name LIKE $2 ESCAPE '\' OR email LIKE $2 ESCAPE '\'
                      OR service LIKE $2 ESCAPE '\')
                 AND ($3 IS NULL OR status = $3)
               ORDER BY rowid DESC
               LIMIT $4"#
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(cursor.map(|c| c.row_seq()))
            .bind(search_pattern(filter.search.as_deref()))
            .bind(filter.status)
            .bind(limit.max(1) + 1)
            .fetch_all(pool)
            .await?;

        Ok(Paginated::from_rows(
            rows.into_iter().map(|r| (r.row_seq, r.booking)).collect(),
            limit,
        ))
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateBooking,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"UPDATE bookings
               SET client_name = COALESCE($2, client_name),
                   email = COALESCE($3, email),
                   service = COALESCE($4, service),
                   placement = COALESCE($5, placement),
                   status = COALESCE($6, status),
                   scheduled_at = COALESCE($7, scheduled_at),
                   deposit_cents = COALESCE($8, deposit_cents),
                   notes = COALESCE($9, notes),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {BOOKING_COLUMNS}"#
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(data.client_name.as_deref().map(str::trim))
            .bind(data.email.as_deref().map(str::trim))
            .bind(data.service.as_deref().map(str::trim))
            .bind(&data.placement)
            .bind(data.status)
            .bind(data.scheduled_at)
            .bind(data.deposit_cents)
            .bind(&data.notes)
            .fetch_optional(pool)
            .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::update(
            pool,
            id,
            &UpdateBooking {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
