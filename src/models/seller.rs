use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::address::Address;
use crate::models::rate::DeliveryService;

/// In-house delivery pricing knobs. Precedence: flat fee within the radius,
/// per-km rate outside it, legacy flat fee as the final fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InHousePricing {
    pub flat_fee_minor_units: Option<i64>,
    pub flat_fee_radius_km: Option<f64>,
    pub per_km_minor_units: Option<i64>,
    pub legacy_fee_minor_units: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerProfile {
    pub id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub enabled_services: Vec<DeliveryService>,
    pub origin_locker_id: Option<Uuid>,
    pub pricing: InHousePricing,
    pub created_at: DateTime<Utc>,
}

/// Collection address and contact details attached to label requests.
/// Derived from the seller profile unless the caller overrides it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerContext {
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub collection_address: Option<Address>,
}

impl SellerContext {
    pub fn from_profile(seller: &SellerProfile) -> Self {
        Self {
            contact_name: seller.contact_name.clone(),
            phone: seller.phone.clone(),
            collection_address: Some(seller.address.clone()),
        }
    }
}
