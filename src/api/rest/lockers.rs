use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::address::Address;
use crate::models::locker::{Locker, LockerStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/lockers", post(create_locker).get(list_lockers))
}

#[derive(Deserialize)]
pub struct CreateLockerRequest {
    pub code: String,
    pub name: String,
    pub address: Address,
    pub status: Option<LockerStatus>,
}

async fn create_locker(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateLockerRequest>,
) -> Result<Json<Locker>, AppError> {
    if payload.code.trim().is_empty() {
        return Err(AppError::BadRequest("code cannot be empty".to_string()));
    }

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let duplicate = state
        .lockers
        .iter()
        .any(|entry| entry.value().code == payload.code);
    if duplicate {
        return Err(AppError::Conflict(format!(
            "locker code {} is already registered",
            payload.code
        )));
    }

    let locker = Locker {
        id: Uuid::new_v4(),
        code: payload.code,
        name: payload.name,
        address: payload.address,
        status: payload.status.unwrap_or(LockerStatus::Operational),
    };

    state.lockers.insert(locker.id, locker.clone());
    Ok(Json(locker))
}

async fn list_lockers(State(state): State<Arc<AppState>>) -> Json<Vec<Locker>> {
    let lockers = state
        .lockers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(lockers)
}
