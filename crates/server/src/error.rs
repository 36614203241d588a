use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::list::SourceError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Validation(msg) => Self::BadRequest(msg),
            SourceError::NotFound(what) => Self::NotFound(what),
            SourceError::Transport(msg) | SourceError::Database(msg) => Self::Unavailable(msg),
            SourceError::Timeout => Self::Unavailable("timed out".to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let message = match &self {
            // Internal details stay in the log
            Self::Database(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_map_to_status_codes() {
        let cases = [
            (SourceError::Validation("email is required".into()), StatusCode::BAD_REQUEST),
            (SourceError::NotFound("customer".into()), StatusCode::NOT_FOUND),
            (SourceError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (source, expected) in cases {
            assert_eq!(ApiError::from(source).into_response().status(), expected);
        }
        assert_eq!(
            ApiError::from(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
