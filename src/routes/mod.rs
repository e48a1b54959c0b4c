use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

pub mod alerts;
pub mod bleeding;
pub mod cycle;
pub mod cycle_stats;
pub mod symptoms;

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps core failures onto HTTP status codes.
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::Validation(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            CoreError::CycleNotFound(_) | CoreError::SymptomNotFound(_) => {
                (StatusCode::NOT_FOUND, self.0.to_string())
            }
            CoreError::Store(e) => {
                tracing::error!("❌ DB error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "DB error".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
