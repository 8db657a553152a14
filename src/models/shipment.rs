use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::address::Address;
use crate::models::order::OrderItem;
use crate::models::rate::{ProviderFamily, ShippingRate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    ReadyForShipping,
    LabelGenerated,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
    Failed,
    Returned,
}

impl ShipmentStatus {
    /// Position on the happy path. Branch states carry no rank and are
    /// reachable from any non-terminal status instead.
    pub fn rank(self) -> Option<u8> {
        match self {
            ShipmentStatus::Pending => Some(0),
            ShipmentStatus::ReadyForShipping => Some(1),
            ShipmentStatus::LabelGenerated => Some(2),
            ShipmentStatus::InTransit => Some(3),
            ShipmentStatus::OutForDelivery => Some(4),
            ShipmentStatus::Delivered => Some(5),
            ShipmentStatus::Cancelled | ShipmentStatus::Failed | ShipmentStatus::Returned => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered
                | ShipmentStatus::Cancelled
                | ShipmentStatus::Failed
                | ShipmentStatus::Returned
        )
    }

    pub fn is_branch(self) -> bool {
        matches!(
            self,
            ShipmentStatus::Cancelled | ShipmentStatus::Failed | ShipmentStatus::Returned
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::ReadyForShipping => "ready_for_shipping",
            ShipmentStatus::LabelGenerated => "label_generated",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Cancelled => "cancelled",
            ShipmentStatus::Failed => "failed",
            ShipmentStatus::Returned => "returned",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    Staff,
    Driver,
    Carrier,
}

/// Append-only history entry. Written exclusively by the lifecycle
/// transition; never mutated or removed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: ShipmentStatus,
    pub at: DateTime<Utc>,
    pub message: Option<String>,
    pub location: Option<String>,
    pub actor: Actor,
}

/// The claim-owner record for an in-house delivery. Present iff claimed;
/// the payout is frozen at claim time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchClaim {
    pub driver_id: Uuid,
    pub payout_minor_units: i64,
    pub claimed_at: DateTime<Utc>,
}

/// The per-seller fulfilment unit of an order. Created by the splitter in
/// `pending`; advanced only through the lifecycle transition; never
/// deleted, only terminally statused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub items: Vec<OrderItem>,
    pub destination: Address,
    pub delivery_note: Option<String>,
    pub selected_rate: Option<ShippingRate>,
    pub provider_family: Option<ProviderFamily>,
    pub status: ShipmentStatus,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub access_code: Option<String>,
    pub origin_locker_id: Option<Uuid>,
    pub destination_locker_id: Option<Uuid>,
    pub claim: Option<DispatchClaim>,
    pub status_history: Vec<TrackingEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(
        order_id: Uuid,
        seller_id: Uuid,
        items: Vec<OrderItem>,
        destination: Address,
        delivery_note: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            seller_id,
            items,
            destination,
            delivery_note,
            selected_rate: None,
            provider_family: None,
            status: ShipmentStatus::Pending,
            tracking_number: None,
            tracking_url: None,
            access_code: None,
            origin_locker_id: None,
            destination_locker_id: None,
            claim: None,
            status_history: vec![TrackingEvent {
                status: ShipmentStatus::Pending,
                at: now,
                message: Some("shipment created".to_string()),
                location: None,
                actor: Actor::System,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}
