use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch;
use crate::error::AppError;
use crate::models::driver::{DeliveryOffer, DriverProfile, DriverStatus};
use crate::models::shipment::Shipment;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/deliveries", get(list_deliveries))
        .route("/deliveries/:id/claim", post(claim_delivery))
        .route("/deliveries/:id/complete", post(complete_delivery))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub seller_ids: Vec<Uuid>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let now = Utc::now();
    let driver = DriverProfile {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
        status: DriverStatus::Offline,
        seller_ids: payload.seller_ids,
        total_deliveries: 0,
        available_earnings_minor_units: 0,
        created_at: now,
        updated_at: now,
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverProfile>, AppError> {
    let driver = state
        .drivers
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;
    Ok(Json(driver))
}

#[derive(Deserialize)]
pub struct UpdateDriverStatusRequest {
    pub status: DriverStatus,
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDriverStatusRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    Ok(Json(dispatch::set_driver_status(&state, id, payload.status)?))
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryOffer>>, AppError> {
    Ok(Json(dispatch::list_available(&state, id)?))
}

#[derive(Deserialize)]
pub struct ClaimRequest {
    pub driver_id: Uuid,
}

async fn claim_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(dispatch::claim(&state, id, payload.driver_id)?))
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(dispatch::complete(&state, id, payload.driver_id)?))
}
