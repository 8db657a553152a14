use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::labels::{self, LabelBatchReport};
use crate::error::AppError;
use crate::models::seller::SellerContext;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/labels/batch", post(generate_batch))
}

#[derive(Deserialize)]
pub struct LabelBatchRequest {
    pub shipment_ids: Vec<Uuid>,
    #[serde(default)]
    pub contact: Option<SellerContext>,
}

async fn generate_batch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LabelBatchRequest>,
) -> Result<Json<LabelBatchReport>, AppError> {
    if payload.shipment_ids.is_empty() {
        return Err(AppError::BadRequest(
            "shipment_ids cannot be empty".to_string(),
        ));
    }

    let report = labels::generate_labels(&state, &payload.shipment_ids, payload.contact).await;
    Ok(Json(report))
}
