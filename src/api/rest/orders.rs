use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::splitter;
use crate::error::AppError;
use crate::models::address::Address;
use crate::models::order::{Order, OrderItem};
use crate::models::shipment::Shipment;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/shipments", get(list_order_shipments))
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub seller_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price_minor_units: i64,
    pub unit_weight_kg: f64,
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub buyer_name: Option<String>,
    pub delivery_address: Address,
    pub delivery_note: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    pub shipments: Vec<Shipment>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest(
            "order must contain at least one item".to_string(),
        ));
    }

    for item in &payload.items {
        if item.name.trim().is_empty() {
            return Err(AppError::BadRequest(
                "item name cannot be empty".to_string(),
            ));
        }
        if item.quantity == 0 {
            return Err(AppError::BadRequest(
                "item quantity must be at least 1".to_string(),
            ));
        }
        if !state.sellers.contains_key(&item.seller_id) {
            return Err(AppError::BadRequest(format!(
                "unknown seller {}",
                item.seller_id
            )));
        }
    }

    let items = payload
        .items
        .into_iter()
        .map(|item| OrderItem {
            id: Uuid::new_v4(),
            seller_id: item.seller_id,
            name: item.name,
            quantity: item.quantity,
            unit_price_minor_units: item.unit_price_minor_units,
            unit_weight_kg: item.unit_weight_kg,
            length_cm: item.length_cm,
            width_cm: item.width_cm,
            height_cm: item.height_cm,
        })
        .collect();

    let order = Order {
        id: Uuid::new_v4(),
        buyer_name: payload.buyer_name,
        delivery_address: payload.delivery_address,
        delivery_note: payload.delivery_note,
        items,
        created_at: Utc::now(),
    };

    let shipments = splitter::split_order(&order);
    state.orders.insert(order.id, order.clone());
    for shipment in &shipments {
        state.shipments.insert(shipment.id, shipment.clone());
    }

    info!(
        order_id = %order.id,
        shipments = shipments.len(),
        "order received and split"
    );

    Ok(Json(CreateOrderResponse { order, shipments }))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    Ok(Json(order))
}

async fn list_order_shipments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Shipment>>, AppError> {
    if !state.orders.contains_key(&id) {
        return Err(AppError::NotFound(format!("order {id} not found")));
    }

    let shipments = state
        .shipments
        .iter()
        .filter(|entry| entry.value().order_id == id)
        .map(|entry| entry.value().clone())
        .collect();
    Ok(Json(shipments))
}
