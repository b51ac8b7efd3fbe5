use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nq_core::Error;
use serde_json::json;
use thiserror::Error;

/// Failure of a request, rendered as a JSON body.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.message();
        let body = match self.0 {
            Error::NotFound(_) => json!({ "message": message }),
            _ => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
