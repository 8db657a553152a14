use std::collections::HashSet;
use std::time::Instant;

use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::carriers::LabelRequest;
use crate::engine::lifecycle;
use crate::models::locker::Locker;
use crate::models::order::Parcel;
use crate::models::seller::SellerContext;
use crate::models::shipment::{Actor, ShipmentStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSuccess {
    pub shipment_id: Uuid,
    pub tracking_number: String,
    pub tracking_url: String,
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelFailure {
    pub shipment_id: Uuid,
    pub reason: String,
}

/// The batch's normal return shape. Partial failure is data, not an error;
/// callers inspect `failed` and retry those members when they choose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelBatchReport {
    pub succeeded: Vec<LabelSuccess>,
    pub failed: Vec<LabelFailure>,
}

/// Generates labels for the given shipments with bounded concurrency.
/// Every member is fault-isolated and lands in exactly one of
/// `succeeded`/`failed`; once started the batch runs all members to
/// completion. Shipments that already carry a tracking number are reported
/// as successes without a new adapter call.
pub async fn generate_labels(
    state: &AppState,
    shipment_ids: &[Uuid],
    contact_override: Option<SellerContext>,
) -> LabelBatchReport {
    let start = Instant::now();

    // Dedup preserving order so a repeated id cannot race itself within
    // the batch.
    let mut seen = HashSet::new();
    let unique: Vec<Uuid> = shipment_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let results: Vec<Result<LabelSuccess, LabelFailure>> = stream::iter(unique)
        .map(|shipment_id| process_one(state, shipment_id, contact_override.as_ref()))
        .buffer_unordered(state.config.label_batch_size.max(1))
        .collect()
        .await;

    let mut report = LabelBatchReport::default();
    for result in results {
        match result {
            Ok(success) => {
                state
                    .metrics
                    .labels_generated_total
                    .with_label_values(&["success"])
                    .inc();
                report.succeeded.push(success);
            }
            Err(failure) => {
                state
                    .metrics
                    .labels_generated_total
                    .with_label_values(&["error"])
                    .inc();
                warn!(
                    shipment_id = %failure.shipment_id,
                    reason = %failure.reason,
                    "label generation failed"
                );
                report.failed.push(failure);
            }
        }
    }

    let outcome = if report.failed.is_empty() {
        "complete"
    } else {
        "partial"
    };
    state
        .metrics
        .label_batch_duration_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "label batch finished"
    );

    report
}

async fn process_one(
    state: &AppState,
    shipment_id: Uuid,
    contact_override: Option<&SellerContext>,
) -> Result<LabelSuccess, LabelFailure> {
    // Snapshot phase: clone what the adapter call needs and release the
    // entry before any await.
    let snapshot = match state.shipments.get(&shipment_id) {
        Some(entry) => entry.value().clone(),
        None => {
            return Err(LabelFailure {
                shipment_id,
                reason: "shipment not found".to_string(),
            });
        }
    };

    if let Some(tracking_number) = snapshot.tracking_number.clone() {
        return Ok(LabelSuccess {
            shipment_id,
            tracking_number,
            tracking_url: snapshot.tracking_url.clone().unwrap_or_default(),
            access_code: snapshot.access_code.clone(),
        });
    }

    let Some(rate) = snapshot.selected_rate.clone() else {
        return Err(LabelFailure {
            shipment_id,
            reason: "no rate selected".to_string(),
        });
    };

    if !rate.provider_family.supports_labels() {
        return Err(LabelFailure {
            shipment_id,
            reason: format!(
                "{} shipments do not carry labels",
                rate.provider_family.as_str()
            ),
        });
    }

    match snapshot.status {
        ShipmentStatus::Pending | ShipmentStatus::ReadyForShipping => {}
        other => {
            return Err(LabelFailure {
                shipment_id,
                reason: format!("shipment in {other} cannot be labeled"),
            });
        }
    }

    let seller = match contact_override {
        Some(context) => context.clone(),
        None => match state.sellers.get(&snapshot.seller_id) {
            Some(profile) => SellerContext::from_profile(&profile),
            None => {
                return Err(LabelFailure {
                    shipment_id,
                    reason: "seller profile missing".to_string(),
                });
            }
        },
    };

    let origin_locker = resolve_locker(state, rate.origin_locker_id)
        .map_err(|reason| LabelFailure {
            shipment_id,
            reason,
        })?;
    let destination_locker = resolve_locker(state, rate.destination_locker_id)
        .map_err(|reason| LabelFailure {
            shipment_id,
            reason,
        })?;

    let Some(adapter) = state.carriers.labels(rate.service) else {
        return Err(LabelFailure {
            shipment_id,
            reason: format!("no label adapter for {}", rate.service.as_str()),
        });
    };

    let request = LabelRequest {
        shipment_id,
        rate: rate.clone(),
        seller,
        destination: snapshot.destination.clone(),
        parcels: Parcel::per_item(&snapshot.items),
        origin_locker,
        destination_locker,
    };

    let receipt = match timeout(state.config.adapter_timeout(), adapter.create_label(request)).await
    {
        Ok(Ok(receipt)) => receipt,
        Ok(Err(err)) => {
            return Err(LabelFailure {
                shipment_id,
                reason: err.to_string(),
            });
        }
        Err(_) => {
            return Err(LabelFailure {
                shipment_id,
                reason: "label call timed out".to_string(),
            });
        }
    };

    // Persist phase: transition and tracking identifiers land together
    // under the entry lock.
    let Some(mut entry) = state.shipments.get_mut(&shipment_id) else {
        return Err(LabelFailure {
            shipment_id,
            reason: "shipment not found".to_string(),
        });
    };

    if let Some(tracking_number) = entry.tracking_number.clone() {
        // Another path labeled it while our adapter call was in flight.
        return Ok(LabelSuccess {
            shipment_id,
            tracking_number,
            tracking_url: entry.tracking_url.clone().unwrap_or_default(),
            access_code: entry.access_code.clone(),
        });
    }

    lifecycle::transition(
        &mut entry,
        ShipmentStatus::LabelGenerated,
        Some(format!("label created by {}", rate.carrier_label)),
        None,
        Actor::System,
    )
    .map_err(|err| LabelFailure {
        shipment_id,
        reason: err.to_string(),
    })?;

    entry.tracking_number = Some(receipt.tracking_number.clone());
    entry.tracking_url = Some(receipt.tracking_url.clone());
    entry.access_code = receipt.access_code.clone();

    Ok(LabelSuccess {
        shipment_id,
        tracking_number: receipt.tracking_number,
        tracking_url: receipt.tracking_url,
        access_code: receipt.access_code,
    })
}

fn resolve_locker(state: &AppState, id: Option<Uuid>) -> Result<Option<Locker>, String> {
    let Some(id) = id else {
        return Ok(None);
    };

    match state.locker(id) {
        Some(locker) if locker.is_operational() => Ok(Some(locker)),
        Some(_) => Err(format!("locker {id} is out of service")),
        None => Err(format!("locker {id} cannot be resolved")),
    }
}
