use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::carriers::{CarrierError, CarrierRegistry, RateRequest};
use crate::config::Config;
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::address::Address;
use crate::models::locker::Locker;
use crate::models::order::Parcel;
use crate::models::rate::{DeliveryService, ProviderError, ProviderFamily, RateQuote, ShippingRate};
use crate::models::seller::SellerProfile;

/// Everything one quote needs, snapshotted up front. Seller configuration
/// and the locker directory travel in the context, never as ambient state.
#[derive(Debug, Clone)]
pub struct QuoteContext {
    pub seller: SellerProfile,
    pub destination: Address,
    /// Per-item parcels; courier and locker requests get them folded into
    /// one consignment parcel.
    pub parcels: Vec<Parcel>,
    /// Operational lockers only.
    pub lockers: Vec<Locker>,
    pub preferred_destination_locker_id: Option<Uuid>,
}

enum Resolution {
    /// Service not usable for this seller as configured; nothing attempted.
    Skip,
    /// Attempted but failed before any adapter call.
    Failed(ProviderError),
    Call(RateRequest),
}

pub struct RateAggregator {
    registry: Arc<CarrierRegistry>,
    adapter_timeout: Duration,
    currency: String,
    locker_search_radius_km: f64,
}

impl RateAggregator {
    pub fn new(registry: Arc<CarrierRegistry>, config: &Config) -> Self {
        Self {
            registry,
            adapter_timeout: config.adapter_timeout(),
            currency: config.currency.clone(),
            locker_search_radius_km: config.locker_search_radius_km,
        }
    }

    /// Fans out to every service the seller has enabled, bounds each call
    /// with the adapter timeout and merges the results. A provider failure
    /// becomes a `provider_errors` entry; the quote as a whole fails only
    /// when every attempted provider failed.
    pub async fn quote(&self, ctx: &QuoteContext) -> Result<RateQuote, AppError> {
        let mut provider_errors = Vec::new();
        let mut attempted = 0usize;
        let mut calls = Vec::new();

        for service in &ctx.seller.enabled_services {
            match self.resolve(ctx, *service) {
                Resolution::Skip => {}
                Resolution::Failed(error) => {
                    attempted += 1;
                    provider_errors.push(error);
                }
                Resolution::Call(request) => {
                    attempted += 1;
                    calls.push(self.call_adapter(*service, request));
                }
            }
        }

        let mut rates = Vec::new();
        for (service, outcome) in future::join_all(calls).await {
            match outcome {
                Ok(mut quoted) => rates.append(&mut quoted),
                Err(reason) => {
                    warn!(service = service.as_str(), reason = %reason, "rate provider failed");
                    provider_errors.push(ProviderError {
                        provider: service.as_str().to_string(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        if rates.is_empty() && attempted > 0 {
            return Err(AppError::NoRouteFound(provider_errors));
        }

        info!(
            seller_id = %ctx.seller.id,
            rates = rates.len(),
            provider_errors = provider_errors.len(),
            "rate quote assembled"
        );

        Ok(RateQuote {
            rates,
            provider_errors,
        })
    }

    async fn call_adapter(
        &self,
        service: DeliveryService,
        request: RateRequest,
    ) -> (DeliveryService, Result<Vec<ShippingRate>, CarrierError>) {
        let Some(adapter) = self.registry.rates(service) else {
            return (
                service,
                Err(CarrierError::Upstream(
                    "no rate adapter registered".to_string(),
                )),
            );
        };

        match timeout(self.adapter_timeout, adapter.quote(request)).await {
            Ok(result) => (service, result),
            Err(_) => (service, Err(CarrierError::Timeout)),
        }
    }

    fn resolve(&self, ctx: &QuoteContext, service: DeliveryService) -> Resolution {
        let origin_locker = if service.needs_origin_locker() {
            match ctx.seller.origin_locker_id {
                // A locker route without a configured origin locker is
                // simply not offered by this seller.
                None => return Resolution::Skip,
                Some(id) => match ctx.lockers.iter().find(|locker| locker.id == id) {
                    Some(locker) => Some(locker.clone()),
                    None => {
                        return Resolution::Failed(ProviderError {
                            provider: service.as_str().to_string(),
                            reason: "origin locker is unavailable".to_string(),
                        });
                    }
                },
            }
        } else {
            None
        };

        let destination_locker = if service.needs_destination_locker() {
            match self.pick_destination_locker(ctx) {
                Ok(locker) => Some(locker),
                Err(reason) => {
                    return Resolution::Failed(ProviderError {
                        provider: service.as_str().to_string(),
                        reason,
                    });
                }
            }
        } else {
            None
        };

        let parcels = match service.family() {
            ProviderFamily::Courier | ProviderFamily::Locker => {
                vec![Parcel::aggregate(&ctx.parcels)]
            }
            ProviderFamily::InHouse | ProviderFamily::Collection => ctx.parcels.clone(),
        };

        Resolution::Call(RateRequest {
            service,
            seller: ctx.seller.clone(),
            destination: ctx.destination.clone(),
            parcels,
            origin_locker,
            destination_locker,
            currency: self.currency.clone(),
        })
    }

    /// The buyer's explicit locker choice wins; otherwise the nearest
    /// operational locker within the search radius of their address.
    fn pick_destination_locker(&self, ctx: &QuoteContext) -> Result<Locker, String> {
        if let Some(id) = ctx.preferred_destination_locker_id {
            return ctx
                .lockers
                .iter()
                .find(|locker| locker.id == id)
                .cloned()
                .ok_or_else(|| "selected locker is unavailable".to_string());
        }

        let Some(buyer_location) = ctx.destination.location else {
            return Err("delivery address has no coordinates for locker search".to_string());
        };

        ctx.lockers
            .iter()
            .filter_map(|locker| {
                let location = locker.address.location?;
                let distance = haversine_km(&buyer_location, &location);
                (distance <= self.locker_search_radius_km).then_some((locker, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(locker, _)| locker.clone())
            .ok_or_else(|| "no lockers near the delivery address".to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::{QuoteContext, RateAggregator};
    use crate::carriers::collection::StoreCollection;
    use crate::carriers::{CarrierError, CarrierRegistry, MockRateAdapter, RateAdapter, RateRequest};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::address::{Address, GeoPoint};
    use crate::models::locker::{Locker, LockerStatus};
    use crate::models::order::Parcel;
    use crate::models::rate::{DeliveryService, ShippingRate};
    use crate::models::seller::{InHousePricing, SellerProfile};

    const BUYER: GeoPoint = GeoPoint {
        lat: -26.2041,
        lng: 28.0473,
    };

    fn address(location: Option<GeoPoint>) -> Address {
        Address {
            line1: "5 Bree St".to_string(),
            suburb: None,
            city: "Johannesburg".to_string(),
            postal_code: "2000".to_string(),
            country: "ZA".to_string(),
            location,
        }
    }

    fn seller(services: Vec<DeliveryService>, origin_locker_id: Option<Uuid>) -> SellerProfile {
        SellerProfile {
            id: Uuid::new_v4(),
            name: "Greenfields".to_string(),
            contact_name: None,
            phone: None,
            address: address(None),
            enabled_services: services,
            origin_locker_id,
            pricing: InHousePricing::default(),
            created_at: Utc::now(),
        }
    }

    fn locker(name: &str, location: Option<GeoPoint>) -> Locker {
        Locker {
            id: Uuid::new_v4(),
            code: name.to_uppercase(),
            name: name.to_string(),
            address: address(location),
            status: LockerStatus::Operational,
        }
    }

    fn rate(service: DeliveryService, price: i64, destination_locker_id: Option<Uuid>) -> ShippingRate {
        ShippingRate {
            id: Uuid::new_v4(),
            service,
            provider_family: service.family(),
            carrier_label: "test carrier".to_string(),
            service_level: "standard".to_string(),
            price_minor_units: price,
            currency: "ZAR".to_string(),
            estimated_transit: "2-4 business days".to_string(),
            origin_locker_id: None,
            destination_locker_id,
        }
    }

    fn context(seller: SellerProfile, lockers: Vec<Locker>) -> QuoteContext {
        QuoteContext {
            seller,
            destination: address(Some(BUYER)),
            parcels: vec![Parcel {
                weight_kg: 1.0,
                length_cm: 20.0,
                width_cm: 15.0,
                height_cm: 10.0,
                declared_value_minor_units: 5000,
            }],
            lockers,
            preferred_destination_locker_id: None,
        }
    }

    fn aggregator(registry: CarrierRegistry) -> RateAggregator {
        RateAggregator::new(Arc::new(registry), &Config::default())
    }

    struct SlowAdapter;

    #[async_trait]
    impl RateAdapter for SlowAdapter {
        async fn quote(&self, request: RateRequest) -> Result<Vec<ShippingRate>, CarrierError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(vec![rate(request.service, 1000, None)])
        }
    }

    #[tokio::test]
    async fn one_failing_provider_does_not_sink_the_quote() {
        let mut healthy = MockRateAdapter::new();
        healthy
            .expect_quote()
            .returning(|req| Ok(vec![rate(req.service, 6500, None)]));
        let mut broken = MockRateAdapter::new();
        broken
            .expect_quote()
            .returning(|_| Err(CarrierError::Upstream("carrier 500".to_string())));

        let mut registry = CarrierRegistry::new();
        registry.register_rates(DeliveryService::Courier, Arc::new(healthy));
        registry.register_rates(DeliveryService::InHouse, Arc::new(broken));

        let ctx = context(
            seller(
                vec![DeliveryService::Courier, DeliveryService::InHouse],
                None,
            ),
            vec![],
        );
        let quote = aggregator(registry).quote(&ctx).await.unwrap();

        assert_eq!(quote.rates.len(), 1);
        assert_eq!(quote.provider_errors.len(), 1);
        assert_eq!(quote.provider_errors[0].provider, "in_house");
    }

    #[tokio::test]
    async fn locker_routes_without_an_origin_locker_are_silently_skipped() {
        let ctx = context(
            seller(
                vec![
                    DeliveryService::LockerToDoor,
                    DeliveryService::LockerToLocker,
                ],
                None,
            ),
            vec![],
        );

        // Nothing is attempted, so an empty quote is a success.
        let quote = aggregator(CarrierRegistry::new()).quote(&ctx).await.unwrap();

        assert!(quote.rates.is_empty());
        assert!(quote.provider_errors.is_empty());
    }

    #[tokio::test]
    async fn every_attempted_provider_failing_means_no_route() {
        let mut broken = MockRateAdapter::new();
        broken
            .expect_quote()
            .returning(|_| Err(CarrierError::NoCoverage("outside network".to_string())));

        let mut registry = CarrierRegistry::new();
        registry.register_rates(DeliveryService::Courier, Arc::new(broken));

        let ctx = context(seller(vec![DeliveryService::Courier], None), vec![]);
        let result = aggregator(registry).quote(&ctx).await;

        match result {
            Err(AppError::NoRouteFound(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].provider, "courier");
            }
            other => panic!("expected NoRouteFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_adapters_are_cut_off_by_the_timeout() {
        let mut registry = CarrierRegistry::new();
        registry.register_rates(DeliveryService::Courier, Arc::new(SlowAdapter));

        let config = Config {
            adapter_timeout_ms: 10,
            ..Config::default()
        };
        let aggregator = RateAggregator::new(Arc::new(registry), &config);

        let ctx = context(seller(vec![DeliveryService::Courier], None), vec![]);
        let result = aggregator.quote(&ctx).await;

        match result {
            Err(AppError::NoRouteFound(errors)) => {
                assert!(errors[0].reason.contains("timed out"));
            }
            other => panic!("expected NoRouteFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nearest_operational_locker_is_chosen_for_locker_dropoff() {
        let near = locker(
            "near",
            Some(GeoPoint {
                lat: BUYER.lat + 0.05,
                lng: BUYER.lng,
            }),
        );
        let far = locker(
            "far",
            Some(GeoPoint {
                lat: BUYER.lat + 0.5,
                lng: BUYER.lng,
            }),
        );
        let unmapped = locker("unmapped", None);
        let near_id = near.id;

        let mut adapter = MockRateAdapter::new();
        adapter.expect_quote().returning(|req| {
            let locker_id = req.destination_locker.as_ref().map(|l| l.id);
            Ok(vec![rate(req.service, 5500, locker_id)])
        });

        let mut registry = CarrierRegistry::new();
        registry.register_rates(DeliveryService::DoorToLocker, Arc::new(adapter));

        let ctx = context(
            seller(vec![DeliveryService::DoorToLocker], None),
            vec![far, unmapped, near],
        );
        let quote = aggregator(registry).quote(&ctx).await.unwrap();

        assert_eq!(quote.rates[0].destination_locker_id, Some(near_id));
    }

    #[tokio::test]
    async fn a_preferred_locker_that_cannot_be_resolved_is_an_attempted_failure() {
        let mut registry = CarrierRegistry::new();
        registry.register_rates(DeliveryService::DoorToLocker, Arc::new(MockRateAdapter::new()));

        let mut ctx = context(seller(vec![DeliveryService::DoorToLocker], None), vec![]);
        ctx.preferred_destination_locker_id = Some(Uuid::new_v4());

        let result = aggregator(registry).quote(&ctx).await;

        match result {
            Err(AppError::NoRouteFound(errors)) => {
                assert!(errors[0].reason.contains("selected locker"));
            }
            other => panic!("expected NoRouteFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn collection_survives_every_other_provider_failing() {
        let mut broken = MockRateAdapter::new();
        broken
            .expect_quote()
            .returning(|_| Err(CarrierError::Upstream("carrier down".to_string())));

        let mut registry = CarrierRegistry::new();
        registry.register_rates(DeliveryService::Courier, Arc::new(broken));
        registry.register_rates(DeliveryService::Collection, Arc::new(StoreCollection));

        let ctx = context(
            seller(
                vec![DeliveryService::Courier, DeliveryService::Collection],
                None,
            ),
            vec![],
        );
        let quote = aggregator(registry).quote(&ctx).await.unwrap();

        assert_eq!(quote.rates.len(), 1);
        assert_eq!(quote.rates[0].price_minor_units, 0);
        assert_eq!(quote.rates[0].service, DeliveryService::Collection);
        assert_eq!(quote.provider_errors.len(), 1);
    }
}
