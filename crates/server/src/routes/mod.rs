use axum::Router;
use db::models::page::{MAX_PAGE_SIZE, Paginated};
use services::services::list::Page;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{DeploymentImpl, error::ApiError};

pub mod bookings;
pub mod customers;
pub mod health;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(customers::router(&deployment))
        .merge(bookings::router(&deployment));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deployment)
}

/// Validate the `limit` query parameter, falling back to the configured page size.
pub(crate) fn resolve_limit(limit: Option<i64>, default: usize) -> Result<usize, ApiError> {
    match limit {
        None => Ok(default),
        Some(limit) if (1..=MAX_PAGE_SIZE).contains(&limit) => Ok(limit as usize),
        Some(limit) => Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
        ))),
    }
}

pub(crate) fn into_paginated<T>(page: Page<T>) -> Paginated<T> {
    Paginated {
        items: page.rows,
        next_cursor: page.next_cursor.map(|c| c.as_str().to_string()),
        has_more: page.has_more,
    }
}
