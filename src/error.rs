use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::schema::FieldErrors;

/// Every way an API request can end without a success envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request")]
    MalformedBody,

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedBody | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            Self::Validation(errors) => json!({"status": "error", "errors": errors}),
            Self::Database(err) => {
                tracing::error!(error = %err, "database operation failed");
                json!({"status": "error", "message": "internal server error"})
            }
            other => json!({"status": "error", "message": other.to_string()}),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ApiError::MalformedBody, StatusCode::BAD_REQUEST)]
    #[case(ApiError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE)]
    #[case(ApiError::Unauthorized, StatusCode::UNAUTHORIZED)]
    #[case(ApiError::NotFound, StatusCode::NOT_FOUND)]
    #[case(ApiError::Validation(FieldErrors::default()), StatusCode::BAD_REQUEST)]
    #[case(ApiError::Database(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_to_status(#[case] error: ApiError, #[case] expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
        assert_eq!(error.into_response().status(), expected);
    }

    #[rstest]
    fn gateway_messages_match_envelope() {
        assert_eq!(ApiError::MalformedBody.to_string(), "bad request");
        assert_eq!(ApiError::Unauthorized.to_string(), "unauthorized");
        assert_eq!(ApiError::PayloadTooLarge.to_string(), "payload too large");
    }
}
