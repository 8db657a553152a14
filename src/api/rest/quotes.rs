use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::quotes::QuoteContext;
use crate::error::AppError;
use crate::models::address::Address;
use crate::models::order::Parcel;
use crate::models::rate::RateQuote;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/quotes", post(quote_rates))
}

/// Checkout-time quote for an arbitrary consignment. Nothing is cached;
/// binding quotes go through the shipment quote endpoint.
#[derive(Deserialize)]
pub struct QuoteRequest {
    pub seller_id: Uuid,
    pub destination: Address,
    pub parcels: Vec<Parcel>,
    #[serde(default)]
    pub destination_locker_id: Option<Uuid>,
}

async fn quote_rates(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<RateQuote>, AppError> {
    if payload.parcels.is_empty() {
        return Err(AppError::BadRequest(
            "at least one parcel is required".to_string(),
        ));
    }

    let seller = state.seller(payload.seller_id)?;
    let context = QuoteContext {
        seller,
        destination: payload.destination,
        parcels: payload.parcels,
        lockers: state.operational_lockers(),
        preferred_destination_locker_id: payload.destination_locker_id,
    };

    let result = state.aggregator().quote(&context).await;
    record_quote_outcome(&state, &result);
    Ok(Json(result?))
}

/// Shared by every quoting endpoint so the counters see one entry per
/// aggregator run regardless of which surface triggered it.
pub(crate) fn record_quote_outcome(state: &AppState, result: &Result<RateQuote, AppError>) {
    match result {
        Ok(quote) => {
            state
                .metrics
                .rate_quotes_total
                .with_label_values(&["ok"])
                .inc();
            for error in &quote.provider_errors {
                state
                    .metrics
                    .provider_errors_total
                    .with_label_values(&[error.provider.as_str()])
                    .inc();
            }
        }
        Err(AppError::NoRouteFound(errors)) => {
            state
                .metrics
                .rate_quotes_total
                .with_label_values(&["no_route"])
                .inc();
            for error in errors {
                state
                    .metrics
                    .provider_errors_total
                    .with_label_values(&[error.provider.as_str()])
                    .inc();
            }
        }
        Err(_) => {}
    }
}
