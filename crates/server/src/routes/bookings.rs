use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    booking::{Booking, BookingFilter, BookingStatus, CreateBooking, UpdateBooking},
    customer::Customer,
    page::Paginated,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    admin_lists::BookingSource,
    list::{Cursor, RowSource},
};
use tracing::info;
use uuid::Uuid;
use utils::response::ApiResponse;

use super::{into_paginated, resolve_limit};
use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct BookingQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<BookingStatus>,
}

fn source(deployment: &DeploymentImpl) -> BookingSource {
    BookingSource::new(deployment.db().pool.clone())
}

/// GET /api/bookings
/// Newest-first page of bookings, optionally narrowed to one status
pub async fn list_bookings(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<BookingQuery>,
) -> Result<ResponseJson<ApiResponse<Paginated<Booking>>>, ApiError> {
    let limit = resolve_limit(query.limit, deployment.list_config().page_size)?;
    let filter = BookingFilter {
        search: query.search,
        status: query.status,
    };
    let cursor = query.cursor.map(Cursor::new);

    let page = source(&deployment)
        .fetch_page(&filter, cursor.as_ref(), limit)
        .await?;

    Ok(ResponseJson(ApiResponse::success(into_paginated(page))))
}

/// GET /api/bookings/{id}
pub async fn get_booking(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    let booking = Booking::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("booking {id}")))?;

    Ok(ResponseJson(ApiResponse::success(booking)))
}

/// POST /api/bookings
/// New bookings start as pending
pub async fn create_booking(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateBooking>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    if let Some(customer_id) = payload.customer_id {
        if Customer::find_by_id(&deployment.db().pool, customer_id)
            .await?
            .is_none()
        {
            return Err(ApiError::BadRequest(format!(
                "customer {customer_id} does not exist"
            )));
        }
    }

    let booking = source(&deployment).create_row(&payload).await?;
    info!(booking_id = %booking.id, service = %booking.service, "Booking created");

    Ok(ResponseJson(ApiResponse::success(booking)))
}

/// PUT /api/bookings/{id}
pub async fn update_booking(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateBooking>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    let booking = source(&deployment).update_row(&id, &payload).await?;
    if payload.status.is_some() {
        info!(booking_id = %id, status = %booking.status, "Booking status changed");
    }

    Ok(ResponseJson(ApiResponse::success(booking)))
}

/// DELETE /api/bookings/{id}
pub async fn delete_booking(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Booking::delete(&deployment.db().pool, id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound(format!("booking {id}")));
    }
    info!(booking_id = %id, "Booking deleted");

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/bookings",
        Router::new()
            .route("/", get(list_bookings).post(create_booking))
            .route(
                "/{id}",
                get(get_booking).put(update_booking).delete(delete_booking),
            ),
    )
}
