//! Contains all HTTP endpoint handlers.
//!
//! Use [`routes`] to create a router with all endpoints.

use axum::Router;

use crate::state::ServiceState;

mod api;
pub mod common;
pub mod health;

pub use api::{BatchData, CpuData, InfoData, QueryData, RangeData, ResultData, StressData};

/// Creates the router serving the health checks and the simulation API under `/api`.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .merge(health::router())
        .nest("/api", api::router())
}
