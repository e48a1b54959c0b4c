use axum::{routing::get, Router};

pub mod alerts;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod service;
pub mod store;

use service::CycleService;

pub fn app(service: CycleService) -> Router {
    Router::new()
        .merge(routes::cycle::routes(service.clone()))
        .merge(routes::cycle_stats::routes(service.clone()))
        .merge(routes::symptoms::routes(service.clone()))
        .merge(routes::bleeding::routes(service.clone()))
        .merge(routes::alerts::routes(service))
        .route("/health", get(|| async { "✅ Backend up" }))
}
