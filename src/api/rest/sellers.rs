use std::collections::HashSet;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::address::Address;
use crate::models::rate::DeliveryService;
use crate::models::seller::{InHousePricing, SellerProfile};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sellers", post(create_seller).get(list_sellers))
        .route("/sellers/:id", get(get_seller))
}

#[derive(Deserialize)]
pub struct CreateSellerRequest {
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub enabled_services: Vec<DeliveryService>,
    pub origin_locker_id: Option<Uuid>,
    #[serde(default)]
    pub pricing: InHousePricing,
}

async fn create_seller(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSellerRequest>,
) -> Result<Json<SellerProfile>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.enabled_services.is_empty() {
        return Err(AppError::BadRequest(
            "at least one delivery service must be enabled".to_string(),
        ));
    }

    if let Some(locker_id) = payload.origin_locker_id {
        if state.locker(locker_id).is_none() {
            return Err(AppError::BadRequest(format!(
                "origin locker {locker_id} is not registered"
            )));
        }
    }

    let mut seen = HashSet::new();
    let mut enabled_services = payload.enabled_services;
    enabled_services.retain(|service| seen.insert(*service));

    let seller = SellerProfile {
        id: Uuid::new_v4(),
        name: payload.name,
        contact_name: payload.contact_name,
        phone: payload.phone,
        address: payload.address,
        enabled_services,
        origin_locker_id: payload.origin_locker_id,
        pricing: payload.pricing,
        created_at: Utc::now(),
    };

    state.sellers.insert(seller.id, seller.clone());
    Ok(Json(seller))
}

async fn list_sellers(State(state): State<Arc<AppState>>) -> Json<Vec<SellerProfile>> {
    let sellers = state
        .sellers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(sellers)
}

async fn get_seller(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SellerProfile>, AppError> {
    Ok(Json(state.seller(id)?))
}
