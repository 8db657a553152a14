use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::quotes::record_quote_outcome;
use crate::engine::dispatch;
use crate::engine::quotes::QuoteContext;
use crate::error::AppError;
use crate::models::order::Parcel;
use crate::models::rate::{QuotedRate, RateQuote};
use crate::models::shipment::{Actor, Shipment, ShipmentStatus, TrackingEvent};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shipments/:id", get(get_shipment))
        .route("/shipments/:id/history", get(get_history))
        .route("/shipments/:id/quotes", post(quote_shipment))
        .route("/shipments/:id/rate", post(select_rate))
        .route("/shipments/:id/transition", post(transition_shipment))
}

async fn get_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Shipment>, AppError> {
    let shipment = state
        .shipments
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))?;
    Ok(Json(shipment))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TrackingEvent>>, AppError> {
    let history = state
        .shipments
        .get(&id)
        .map(|entry| entry.value().status_history.clone())
        .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))?;
    Ok(Json(history))
}

#[derive(Deserialize, Default)]
pub struct ShipmentQuoteRequest {
    #[serde(default)]
    pub destination_locker_id: Option<Uuid>,
}

/// Quotes the shipment's consignment and caches every returned rate so a
/// later selection can bind the server-side copy. Re-quoting replaces the
/// shipment's previous cache entries rather than piling onto them.
async fn quote_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShipmentQuoteRequest>,
) -> Result<Json<RateQuote>, AppError> {
    let shipment = state
        .shipments
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))?;

    if shipment.status != ShipmentStatus::Pending {
        return Err(AppError::Conflict(
            "rates can only be quoted while the shipment is pending".to_string(),
        ));
    }

    let seller = state.seller(shipment.seller_id)?;
    let context = QuoteContext {
        seller,
        destination: shipment.destination.clone(),
        parcels: Parcel::per_item(&shipment.items),
        lockers: state.operational_lockers(),
        preferred_destination_locker_id: payload.destination_locker_id,
    };

    let result = state.aggregator().quote(&context).await;
    record_quote_outcome(&state, &result);
    let quote = result?;

    let now = Utc::now();
    state.quoted_rates.retain(|_, quoted| quoted.shipment_id != id);
    for rate in &quote.rates {
        state.quoted_rates.insert(
            rate.id,
            QuotedRate {
                shipment_id: id,
                rate: rate.clone(),
                quoted_at: now,
            },
        );
    }

    Ok(Json(quote))
}

#[derive(Deserialize)]
pub struct SelectRateRequest {
    pub rate_id: Uuid,
}

async fn select_rate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectRateRequest>,
) -> Result<Json<Shipment>, AppError> {
    let quoted = state
        .quoted_rates
        .get(&payload.rate_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| {
            AppError::NotFound("unknown rate id; request a fresh quote".to_string())
        })?;

    if quoted.is_stale(Utc::now()) {
        state.quoted_rates.remove(&payload.rate_id);
        return Err(AppError::NotFound(
            "quote has expired; request a fresh quote".to_string(),
        ));
    }

    if quoted.shipment_id != id {
        return Err(AppError::BadRequest(
            "rate was not quoted for this shipment".to_string(),
        ));
    }

    let updated = {
        let mut shipment = state
            .shipments
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))?;

        if shipment.status != ShipmentStatus::Pending {
            return Err(AppError::Conflict(
                "rate can only be selected while the shipment is pending".to_string(),
            ));
        }

        let rate = quoted.rate;
        shipment.provider_family = Some(rate.provider_family);
        shipment.origin_locker_id = rate.origin_locker_id;
        shipment.destination_locker_id = rate.destination_locker_id;
        shipment.selected_rate = Some(rate);
        shipment.updated_at = Utc::now();
        shipment.clone()
    };

    // The frozen copy now lives on the shipment; the cached quotes are
    // spent. Changing the choice means quoting again.
    state.quoted_rates.retain(|_, quoted| quoted.shipment_id != id);

    info!(shipment_id = %id, "rate selected");
    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: ShipmentStatus,
    pub message: Option<String>,
    pub location: Option<String>,
    pub actor: Option<Actor>,
}

async fn transition_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<Shipment>, AppError> {
    let shipment = dispatch::apply_transition(
        &state,
        id,
        payload.status,
        payload.message,
        payload.location,
        payload.actor.unwrap_or(Actor::Staff),
    )?;

    Ok(Json(shipment))
}
