use axum::{extract::{State, Query}, Json, Router, routing::get};

use super::{ApiError, UserQuery};
use crate::models::BleedingRun;
use crate::service::CycleService;

pub fn routes(service: CycleService) -> Router {
    Router::new()
        .route("/bleeding-history", get(get_bleeding_history))
        .with_state(service)
}

pub async fn get_bleeding_history(
    State(service): State<CycleService>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<BleedingRun>>, ApiError> {
    Ok(Json(service.bleeding_history(params.user_id).await?))
}
