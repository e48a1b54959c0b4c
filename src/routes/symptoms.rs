use axum::{
    Router,
    routing::get,
    extract::{Path, Query, State},
    Json,
    http::StatusCode,
};
use serde::Serialize;

use super::{ApiError, UserQuery};
use crate::models::{parse_date, Alert, Symptom, SymptomEntry, SymptomPatch};
use crate::service::CycleService;

#[derive(Serialize)]
pub struct SymptomSaved {
    pub created: bool,
    pub alerts: Vec<Alert>,
}

#[derive(Serialize)]
pub struct SymptomUpdated {
    pub symptom: Symptom,
    pub alerts: Vec<Alert>,
}

#[derive(Serialize)]
pub struct SymptomDeleted {
    pub alerts: Vec<Alert>,
}

pub fn routes(service: CycleService) -> Router {
    Router::new()
        .route("/symptoms", get(list_symptom_dates))
        .route(
            "/symptoms/:date",
            get(get_symptom)
                .post(save_symptom)
                .put(update_symptom)
                .delete(delete_symptom),
        )
        .with_state(service)
}

async fn list_symptom_dates(
    State(service): State<CycleService>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(service.symptom_dates(query.user_id).await?))
}

async fn get_symptom(
    State(service): State<CycleService>,
    Path(date): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Symptom>, ApiError> {
    let date = parse_date("date", &date)?;
    Ok(Json(service.get_symptom(query.user_id, date).await?))
}

async fn save_symptom(
    State(service): State<CycleService>,
    Path(date): Path<String>,
    Query(query): Query<UserQuery>,
    Json(entry): Json<SymptomEntry>,
) -> Result<(StatusCode, Json<SymptomSaved>), ApiError> {
    let date = parse_date("date", &date)?;
    let outcome = service.save_symptom(query.user_id, date, entry).await?;

    let status = if outcome.value { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(SymptomSaved {
            created: outcome.value,
            alerts: outcome.alerts,
        }),
    ))
}

async fn update_symptom(
    State(service): State<CycleService>,
    Path(date): Path<String>,
    Query(query): Query<UserQuery>,
    Json(patch): Json<SymptomPatch>,
) -> Result<Json<SymptomUpdated>, ApiError> {
    let date = parse_date("date", &date)?;
    let outcome = service.update_symptom(query.user_id, date, patch).await?;

    Ok(Json(SymptomUpdated {
        symptom: outcome.value,
        alerts: outcome.alerts,
    }))
}

async fn delete_symptom(
    State(service): State<CycleService>,
    Path(date): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<SymptomDeleted>, ApiError> {
    let date = parse_date("date", &date)?;
    let outcome = service.delete_symptom(query.user_id, date).await?;

    Ok(Json(SymptomDeleted { alerts: outcome.alerts }))
}
