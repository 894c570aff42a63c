use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docqa_core::QueryError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::Validation(message) => ApiError::BadRequest(message),
            QueryError::NotFound(id) => {
                ApiError::NotFound(format!("Document with ID '{id}' not found or has no content."))
            }
            QueryError::NotReady => ApiError::Unavailable(
                "AI agent not initialized. Please ensure the backend started correctly.".to_string(),
            ),
            other => {
                tracing::error!(error = %other, "request failed");
                ApiError::Internal(
                    "An internal server error occurred while processing your request. Please try again."
                        .to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::{CompletionError, SearchError};

    fn status_of(error: QueryError) -> StatusCode {
        ApiError::from(error).into_response().status()
    }

    #[test]
    fn query_errors_map_to_http_statuses() {
        assert_eq!(status_of(QueryError::Validation("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(QueryError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(QueryError::NotReady), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(QueryError::Completion(CompletionError::EmptyResponse)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(QueryError::Search(SearchError::EmptyInput)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
