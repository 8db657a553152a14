use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::address::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Offline,
    Available,
    OnDelivery,
}

/// An independent delivery driver. Status is owned by the dispatch service
/// (plus the offline/online toggle); earnings are only credited on
/// delivery completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub status: DriverStatus,
    pub seller_ids: Vec<Uuid>,
    pub total_deliveries: u64,
    pub available_earnings_minor_units: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriverProfile {
    /// An empty authorization list means the driver serves any seller.
    pub fn serves(&self, seller_id: Uuid) -> bool {
        self.seller_ids.is_empty() || self.seller_ids.contains(&seller_id)
    }
}

/// Driver-facing projection of a claimable in-house shipment. Read-only
/// until claimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOffer {
    pub shipment_id: Uuid,
    pub seller_name: String,
    pub pickup: Address,
    pub dropoff: Address,
    pub item_count: u32,
    pub payout_minor_units: i64,
    pub distance_km: Option<f64>,
    pub estimated_minutes: Option<u32>,
    pub delivery_note: Option<String>,
}
