use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::page::{PageCursor, Paginated, search_pattern};

/// A studio client
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Filter applied to the customer listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct CustomerFilter {
    pub search: Option<String>,
}

#[derive(FromRow)]
struct CustomerRow {
    row_seq: i64,
    #[sqlx(flatten)]
    customer: Customer,
}

impl Customer {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateCustomer,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"INSERT INTO customers (id, name, email, phone, notes)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, name, email, phone, notes, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(data.email.trim())
        .bind(&data.phone)
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"SELECT id, name, email, phone, notes, created_at, updated_at
               FROM customers
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Newest-first page of customers matching `filter`, starting after `cursor`.
    pub async fn find_page(
        pool: &SqlitePool,
        filter: &CustomerFilter,
        cursor: Option<PageCursor>,
        limit: i64,
    ) -> Result<Paginated<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"SELECT rowid AS row_seq, id, name, email, phone, notes, created_at, updated_at
               FROM customers
               WHERE ($1 IS NULL OR rowid < $1)
                 AND ($2 IS NULL OR name LIKE $2 ESCAPE '\' OR email LIKE $2 ESCAPE '\')
               ORDER BY rowid DESC
               LIMIT $3"#,
        )
        .bind(cursor.map(|c| c.row_seq()))
        .bind(search_pattern(filter.search.as_deref()))
        .bind(limit.max(1) + 1)
        .fetch_all(pool)
        .await?;

        Ok(Paginated::from_rows(
            rows.into_iter().map(|r| (r.row_seq, r.customer)).collect(),
            limit,
        ))
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateCustomer,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"UPDATE customers
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   phone = COALESCE($4, phone),
                   notes = COALESCE($5, notes),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, email, phone, notes, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.as_deref().map(str::trim))
        .bind(data.email.as_deref().map(str::trim))
        .bind(&data.phone)
        .bind(&data.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::DBService;

    fn new_customer(name: &str) -> CreateCustomer {
        CreateCustomer {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_pages_cover_every_customer_once() {
        let db = DBService::new_in_memory().await.unwrap();
        for i in 0..7 {
            Customer::create(&db.pool, Uuid::new_v4(), &new_customer(&format!("Client{i}")))
                .await
                .unwrap();
        }

        let filter = CustomerFilter::default();
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = Customer::find_page(&db.pool, &filter, cursor, 3).await.unwrap();
            assert!(page.items.len() <= 3);
            seen.extend(page.items.iter().map(|c| c.name.clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(PageCursor::decode(&next).unwrap()),
                None => {
                    assert!(!page.has_more);
                    break;
                }
            }
        }

        assert_eq!(seen.len(), 7);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 7);
        // Newest first
        assert_eq!(seen.first().map(String::as_str), Some("Client6"));
        assert_eq!(seen.last().map(String::as_str), Some("Client0"));
    }

    #[tokio::test]
    async fn test_search_filters_by_name_or_email() {
        let db = DBService::new_in_memory().await.unwrap();
        Customer::create(&db.pool, Uuid::new_v4(), &new_customer("Rosa"))
            .await
            .unwrap();
        Customer::create(&db.pool, Uuid::new_v4(), &new_customer("Marco"))
            .await
            .unwrap();

        let filter = CustomerFilter {
            search: Some("ros".to_string()),
        };
        let page = Customer::find_page(&db.pool, &filter, None, 10).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Rosa");
    }

    #[tokio::test]
    async fn test_update_keeps_untouched_columns() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        let created = Customer::create(&db.pool, id, &new_customer("Ines"))
            .await
            .unwrap();

        let updated = Customer::update(
            &db.pool,
            id,
            &UpdateCustomer {
                phone: Some("555-0101".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, created.name);
        assert_eq!(updated.email, created.email);
        assert_eq!(updated.phone.as_deref(), Some("555-0101"));

        assert_eq!(Customer::delete(&db.pool, id).await.unwrap(), 1);
        assert!(Customer::find_by_id(&db.pool, id).await.unwrap().is_none());
        assert!(
            Customer::update(&db.pool, id, &UpdateCustomer::default())
                .await
                .unwrap()
                .is_none()
        );
    }
}
