use async_trait::async_trait;
use uuid::Uuid;

use super::{CarrierError, RateAdapter, RateRequest};
use crate::engine::pricing;
use crate::models::rate::{DeliveryService, ProviderFamily, ShippingRate};

/// The seller's own driver fleet. Pricing is computed locally from the
/// seller's distance-fee configuration; there is no external call and no
/// label, fulfilment runs through the dispatch claim flow.
pub struct InHouseFleet;

#[async_trait]
impl RateAdapter for InHouseFleet {
    async fn quote(&self, request: RateRequest) -> Result<Vec<ShippingRate>, CarrierError> {
        let seller = &request.seller;
        let priced = pricing::price_delivery(
            &seller.pricing,
            seller.address.location,
            request.destination.location,
        );

        let estimated_transit = match (priced.distance_km, priced.estimated_minutes) {
            (Some(km), Some(minutes)) => {
                format!("{km:.1} km away, about {minutes} min once a driver picks up")
            }
            _ => "same-day local delivery".to_string(),
        };

        Ok(vec![ShippingRate {
            id: Uuid::new_v4(),
            service: DeliveryService::InHouse,
            provider_family: ProviderFamily::InHouse,
            carrier_label: seller.name.clone(),
            service_level: "same-day".to_string(),
            price_minor_units: priced.price_minor_units,
            currency: request.currency.clone(),
            estimated_transit,
            origin_locker_id: None,
            destination_locker_id: None,
        }])
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::InHouseFleet;
    use crate::carriers::{RateAdapter, RateRequest};
    use crate::models::address::{Address, GeoPoint};
    use crate::models::rate::DeliveryService;
    use crate::models::seller::{InHousePricing, SellerProfile};

    fn address(location: Option<GeoPoint>) -> Address {
        Address {
            line1: "8 Main Rd".to_string(),
            suburb: None,
            city: "Johannesburg".to_string(),
            postal_code: "2196".to_string(),
            country: "ZA".to_string(),
            location,
        }
    }

    fn request(seller_loc: Option<GeoPoint>, buyer_loc: Option<GeoPoint>) -> RateRequest {
        RateRequest {
            service: DeliveryService::InHouse,
            seller: SellerProfile {
                id: Uuid::new_v4(),
                name: "Greenfields".to_string(),
                contact_name: None,
                phone: None,
                address: address(seller_loc),
                enabled_services: vec![DeliveryService::InHouse],
                origin_locker_id: None,
                pricing: InHousePricing {
                    flat_fee_minor_units: Some(5000),
                    flat_fee_radius_km: Some(10.0),
                    per_km_minor_units: Some(500),
                    legacy_fee_minor_units: 3500,
                },
                created_at: Utc::now(),
            },
            destination: address(buyer_loc),
            parcels: vec![],
            origin_locker: None,
            destination_locker: None,
            currency: "ZAR".to_string(),
        }
    }

    #[tokio::test]
    async fn quotes_the_flat_fee_for_nearby_buyers() {
        let store = GeoPoint {
            lat: -26.2041,
            lng: 28.0473,
        };
        let buyer = GeoPoint {
            lat: -26.1341,
            lng: 28.0473,
        };

        let rates = InHouseFleet
            .quote(request(Some(store), Some(buyer)))
            .await
            .unwrap();

        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].price_minor_units, 5000);
        assert_eq!(rates[0].carrier_label, "Greenfields");
        assert!(rates[0].estimated_transit.contains("km away"));
    }

    #[tokio::test]
    async fn falls_back_to_a_generic_estimate_without_coordinates() {
        let rates = InHouseFleet.quote(request(None, None)).await.unwrap();

        assert_eq!(rates[0].price_minor_units, 5000);
        assert_eq!(rates[0].estimated_transit, "same-day local delivery");
    }
}
