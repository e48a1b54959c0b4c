use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, UserQuery};
use crate::models::{parse_date, Alert, Cycle, CycleSummary};
use crate::service::CycleService;

#[derive(Deserialize)]
pub struct NewCycle {
    pub user_id: Uuid,
    pub start_date: Option<String>,
}

#[derive(Deserialize)]
pub struct CycleEndUpdate {
    pub user_id: Uuid,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
pub struct CycleResponse {
    pub cycle: Cycle,
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: Uuid,
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn routes(service: CycleService) -> Router {
    Router::new()
        .route("/cycle", get(get_cycle_summary))
        .route("/cycles", get(list_cycles))
        .route("/cycles/start", post(start_cycle))
        .route("/cycles/:id", put(edit_cycle_end).delete(delete_cycle))
        .with_state(service)
}

async fn start_cycle(
    State(service): State<CycleService>,
    Json(body): Json<NewCycle>,
) -> Result<(StatusCode, Json<CycleResponse>), ApiError> {
    let start_date = parse_date("start_date", body.start_date.as_deref().unwrap_or_default())?;
    let outcome = service.start_cycle(body.user_id, start_date).await?;

    Ok((
        StatusCode::CREATED,
        Json(CycleResponse {
            cycle: outcome.value,
            alerts: outcome.alerts,
            warnings: outcome.warnings,
        }),
    ))
}

async fn list_cycles(
    State(service): State<CycleService>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<Cycle>>, ApiError> {
    Ok(Json(service.list_cycles(params.user_id).await?))
}

async fn edit_cycle_end(
    State(service): State<CycleService>,
    Path(id): Path<Uuid>,
    Json(body): Json<CycleEndUpdate>,
) -> Result<Json<CycleResponse>, ApiError> {
    let end_date = parse_date("end_date", body.end_date.as_deref().unwrap_or_default())?;
    let outcome = service.edit_cycle_end(body.user_id, id, end_date).await?;

    Ok(Json(CycleResponse {
        cycle: outcome.value,
        alerts: outcome.alerts,
        warnings: outcome.warnings,
    }))
}

async fn delete_cycle(
    State(service): State<CycleService>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserQuery>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let outcome = service.delete_cycle(params.user_id, id).await?;

    Ok(Json(DeletedResponse {
        deleted: outcome.value.id,
        alerts: outcome.alerts,
        warnings: outcome.warnings,
    }))
}

async fn get_cycle_summary(
    State(service): State<CycleService>,
    Query(params): Query<UserQuery>,
) -> Result<Json<CycleSummary>, (StatusCode, String)> {
    match service.current_summary(params.user_id).await {
        Ok(Some(summary)) => Ok(Json(summary)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "No cycles recorded".into())),
        Err(e) => {
            tracing::error!("❌ Failed to build cycle summary: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "DB error".into()))
        }
    }
}
