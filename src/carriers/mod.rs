pub mod collection;
pub mod courier;
pub mod inhouse;
pub mod locker;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::address::Address;
use crate::models::locker::Locker;
use crate::models::order::Parcel;
use crate::models::rate::{DeliveryService, ShippingRate};
use crate::models::seller::{SellerContext, SellerProfile};

/// Adapter-level failure taxonomy. Always absorbed at the aggregator or
/// batch boundary into per-provider entries, never propagated fatally.
#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("carrier call timed out")]
    Timeout,

    #[error("no coverage: {0}")]
    NoCoverage(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("carrier failure: {0}")]
    Upstream(String),
}

/// Normalized quote request. The seller profile travels as an explicit
/// snapshot so adapters never reach for ambient configuration.
#[derive(Debug, Clone)]
pub struct RateRequest {
    pub service: DeliveryService,
    pub seller: SellerProfile,
    pub destination: Address,
    pub parcels: Vec<Parcel>,
    pub origin_locker: Option<Locker>,
    pub destination_locker: Option<Locker>,
    pub currency: String,
}

/// Normalized label request for one shipment, with per-item parcels.
#[derive(Debug, Clone)]
pub struct LabelRequest {
    pub shipment_id: Uuid,
    pub rate: ShippingRate,
    pub seller: SellerContext,
    pub destination: Address,
    pub parcels: Vec<Parcel>,
    pub origin_locker: Option<Locker>,
    pub destination_locker: Option<Locker>,
}

#[derive(Debug, Clone)]
pub struct LabelReceipt {
    pub tracking_number: String,
    pub tracking_url: String,
    pub access_code: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateAdapter: Send + Sync {
    async fn quote(&self, request: RateRequest) -> Result<Vec<ShippingRate>, CarrierError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LabelAdapter: Send + Sync {
    async fn create_label(&self, request: LabelRequest) -> Result<LabelReceipt, CarrierError>;
}

/// Adapter lookup keyed by `DeliveryService`. Adding a carrier means
/// registering it under a new key; call sites never branch on provider
/// strings.
#[derive(Default)]
pub struct CarrierRegistry {
    rates: HashMap<DeliveryService, Arc<dyn RateAdapter>>,
    labels: HashMap<DeliveryService, Arc<dyn LabelAdapter>>,
}

impl CarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in adapter set: door-to-door courier, the locker network
    /// under all three routing variants, the in-house fleet and store
    /// collection. In-house and collection quote locally and never carry
    /// labels.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        let courier = Arc::new(courier::DoorToDoorCourier::new());
        registry.register_rates(DeliveryService::Courier, courier.clone());
        registry.register_labels(DeliveryService::Courier, courier);

        let locker_net = Arc::new(locker::LockerNetwork::new());
        for service in [
            DeliveryService::DoorToLocker,
            DeliveryService::LockerToDoor,
            DeliveryService::LockerToLocker,
        ] {
            registry.register_rates(service, locker_net.clone());
            registry.register_labels(service, locker_net.clone());
        }

        registry.register_rates(DeliveryService::InHouse, Arc::new(inhouse::InHouseFleet));
        registry.register_rates(
            DeliveryService::Collection,
            Arc::new(collection::StoreCollection),
        );

        registry
    }

    pub fn register_rates(&mut self, service: DeliveryService, adapter: Arc<dyn RateAdapter>) {
        self.rates.insert(service, adapter);
    }

    pub fn register_labels(&mut self, service: DeliveryService, adapter: Arc<dyn LabelAdapter>) {
        self.labels.insert(service, adapter);
    }

    pub fn rates(&self, service: DeliveryService) -> Option<Arc<dyn RateAdapter>> {
        self.rates.get(&service).cloned()
    }

    pub fn labels(&self, service: DeliveryService) -> Option<Arc<dyn LabelAdapter>> {
        self.labels.get(&service).cloned()
    }
}

/// Short uppercase reference for synthesized tracking numbers.
pub(crate) fn tracking_reference() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..10].to_uppercase()
}
