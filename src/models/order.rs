use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::address::Address;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price_minor_units: i64,
    pub unit_weight_kg: f64,
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_name: Option<String>,
    pub delivery_address: Address,
    pub delivery_note: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub weight_kg: f64,
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
    pub declared_value_minor_units: i64,
}

impl Parcel {
    /// One parcel per line item, units of the same item stacked. Label
    /// generation works per item.
    pub fn per_item(items: &[OrderItem]) -> Vec<Parcel> {
        items
            .iter()
            .map(|item| {
                let quantity = i64::from(item.quantity);
                Parcel {
                    weight_kg: item.unit_weight_kg * item.quantity as f64,
                    length_cm: item.length_cm,
                    width_cm: item.width_cm,
                    height_cm: item.height_cm * item.quantity as f64,
                    declared_value_minor_units: item.unit_price_minor_units * quantity,
                }
            })
            .collect()
    }

    /// Folds parcels into a single consignment parcel. Courier and locker
    /// rates are requested for the consignment, not per item.
    pub fn aggregate(parcels: &[Parcel]) -> Parcel {
        parcels.iter().fold(
            Parcel {
                weight_kg: 0.0,
                length_cm: 0.0,
                width_cm: 0.0,
                height_cm: 0.0,
                declared_value_minor_units: 0,
            },
            |acc, p| Parcel {
                weight_kg: acc.weight_kg + p.weight_kg,
                length_cm: acc.length_cm.max(p.length_cm),
                width_cm: acc.width_cm.max(p.width_cm),
                height_cm: acc.height_cm + p.height_cm,
                declared_value_minor_units: acc.declared_value_minor_units
                    + p.declared_value_minor_units,
            },
        )
    }
}
