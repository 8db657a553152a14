use async_trait::async_trait;
use uuid::Uuid;

use super::{CarrierError, RateAdapter, RateRequest};
use crate::models::rate::{DeliveryService, ProviderFamily, ShippingRate};

/// Free collection from the seller's premises. Synthesized in-process and
/// infallible, so it survives every other provider failing.
pub struct StoreCollection;

#[async_trait]
impl RateAdapter for StoreCollection {
    async fn quote(&self, request: RateRequest) -> Result<Vec<ShippingRate>, CarrierError> {
        Ok(vec![ShippingRate {
            id: Uuid::new_v4(),
            service: DeliveryService::Collection,
            provider_family: ProviderFamily::Collection,
            carrier_label: format!("Collect from {}", request.seller.name),
            service_level: "collection".to_string(),
            price_minor_units: 0,
            currency: request.currency.clone(),
            estimated_transit: "ready for collection same day".to_string(),
            origin_locker_id: None,
            destination_locker_id: None,
        }])
    }
}
