use chrono::Utc;

use crate::error::AppError;
use crate::models::shipment::{Actor, Shipment, ShipmentStatus, TrackingEvent};

/// Applies one status transition and appends its history entry. The sole
/// writer of `status` and `status_history`; callers hold the shipment's map
/// entry while calling, so the status write and the history append always
/// land together.
///
/// Forward moves must strictly increase the happy-path rank (skipping ranks
/// is allowed); equal or backward targets are rejected. Branch states are
/// reachable from any non-terminal status; terminal states accept nothing.
pub fn transition(
    shipment: &mut Shipment,
    target: ShipmentStatus,
    message: Option<String>,
    location: Option<String>,
    actor: Actor,
) -> Result<(), AppError> {
    let current = shipment.status;

    if current.is_terminal() {
        return Err(AppError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    if !target.is_branch() {
        match (current.rank(), target.rank()) {
            (Some(from_rank), Some(to_rank)) if to_rank > from_rank => {}
            _ => {
                return Err(AppError::InvalidTransition {
                    from: current,
                    to: target,
                });
            }
        }

        if current == ShipmentStatus::Pending && shipment.selected_rate.is_none() {
            return Err(AppError::Conflict(
                "select a rate before moving a pending shipment forward".to_string(),
            ));
        }

        if target == ShipmentStatus::LabelGenerated
            && !shipment
                .selected_rate
                .as_ref()
                .is_some_and(|rate| rate.provider_family.supports_labels())
        {
            return Err(AppError::Conflict(
                "only courier and locker shipments carry labels".to_string(),
            ));
        }
    }

    let now = Utc::now();
    shipment.status = target;
    shipment.updated_at = now;
    shipment.status_history.push(TrackingEvent {
        status: target,
        at: now,
        message,
        location,
        actor,
    });

    Ok(())
}
