use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};

use super::{ApiError, UserQuery};
use crate::models::CycleStatistics;
use crate::service::CycleService;

pub async fn get_cycle_stats(
    State(service): State<CycleService>,
    Query(query): Query<UserQuery>,
) -> Result<Json<CycleStatistics>, ApiError> {
    Ok(Json(service.cycle_statistics(query.user_id).await?))
}

pub fn routes(service: CycleService) -> Router {
    Router::new()
        .route("/cycles/statistics", get(get_cycle_stats))
        .with_state(service)
}
