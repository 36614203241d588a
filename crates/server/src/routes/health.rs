use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use serde::Serialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
}

/// GET /api/health
pub async fn health(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Health>>, ApiError> {
    sqlx::query("SELECT 1")
        .execute(&deployment.db().pool)
        .await?;

    Ok(ResponseJson(ApiResponse::success(Health {
        status: "ok",
        database: true,
    })))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health))
}
