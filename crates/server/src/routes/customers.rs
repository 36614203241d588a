use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    customer::{CreateCustomer, Customer, CustomerFilter, UpdateCustomer},
    page::Paginated,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    admin_lists::CustomerSource,
    list::{Cursor, RowSource},
};
use tracing::info;
use uuid::Uuid;
use utils::response::ApiResponse;

use super::{into_paginated, resolve_limit};
use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

fn source(deployment: &DeploymentImpl) -> CustomerSource {
    CustomerSource::new(deployment.db().pool.clone())
}

/// GET /api/customers
/// Newest-first page of customers
pub async fn list_customers(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<CustomerQuery>,
) -> Result<ResponseJson<ApiResponse<Paginated<Customer>>>, ApiError> {
    let limit = resolve_limit(query.limit, deployment.list_config().page_size)?;
    let filter = CustomerFilter {
        search: query.search,
    };
    let cursor = query.cursor.map(Cursor::new);

    let page = source(&deployment)
        .fetch_page(&filter, cursor.as_ref(), limit)
        .await?;

    Ok(ResponseJson(ApiResponse::success(into_paginated(page))))
}

/// GET /api/customers/{id}
pub async fn get_customer(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = Customer::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("customer {id}")))?;

    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// POST /api/customers
pub async fn create_customer(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = source(&deployment).create_row(&payload).await?;
    info!(customer_id = %customer.id, "Customer created");

    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// PUT /api/customers/{id}
pub async fn update_customer(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = source(&deployment).update_row(&id, &payload).await?;

    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// DELETE /api/customers/{id}
/// Bookings of the customer are kept and detached
pub async fn delete_customer(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Customer::delete(&deployment.db().pool, id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound(format!("customer {id}")));
    }
    info!(customer_id = %id, "Customer deleted");

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/customers",
        Router::new()
            .route("/", get(list_customers).post(create_customer))
            .route(
                "/{id}",
                get(get_customer)
                    .put(update_customer)
                    .delete(delete_customer),
            ),
    )
}
