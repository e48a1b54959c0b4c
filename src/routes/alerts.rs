use axum::{extract::{Query, State}, routing::get, Json, Router};

use super::{ApiError, UserQuery};
use crate::models::Alert;
use crate::service::CycleService;

pub fn routes(service: CycleService) -> Router {
    Router::new()
        .route("/alerts", get(get_alerts))
        .with_state(service)
}

async fn get_alerts(
    State(service): State<CycleService>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(service.alerts(params.user_id).await?))
}
