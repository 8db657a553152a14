use crate::geo::{haversine_km, travel_minutes};
use crate::models::address::GeoPoint;
use crate::models::seller::InHousePricing;

/// Result of pricing one in-house delivery. Distance and duration are only
/// present when both endpoints carry coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedDelivery {
    pub price_minor_units: i64,
    pub distance_km: Option<f64>,
    pub estimated_minutes: Option<u32>,
}

/// Computes the in-house delivery price without any network call.
///
/// Precedence: the flat fee applies when a radius is configured and the
/// buyer is inside it; outside the radius (or with no radius configured)
/// the per-km rate applies; the legacy flat fee is the final fallback.
/// Missing coordinates on either side skip distance pricing entirely.
pub fn price_delivery(
    pricing: &InHousePricing,
    origin: Option<GeoPoint>,
    destination: Option<GeoPoint>,
) -> PricedDelivery {
    let (Some(origin), Some(destination)) = (origin, destination) else {
        return PricedDelivery {
            price_minor_units: pricing
                .flat_fee_minor_units
                .unwrap_or(pricing.legacy_fee_minor_units),
            distance_km: None,
            estimated_minutes: None,
        };
    };

    let distance_km = haversine_km(&origin, &destination);

    let price_minor_units = match (pricing.flat_fee_minor_units, pricing.flat_fee_radius_km) {
        (Some(flat), Some(radius)) if distance_km <= radius => flat,
        _ => match pricing.per_km_minor_units {
            Some(per_km) => distance_km.ceil() as i64 * per_km,
            None => pricing.legacy_fee_minor_units,
        },
    };

    PricedDelivery {
        price_minor_units,
        distance_km: Some(distance_km),
        estimated_minutes: Some(travel_minutes(distance_km)),
    }
}

/// Driver payout for one delivery, frozen at claim time. A share of the
/// frozen rate price, never below the configured floor.
pub fn driver_payout(price_minor_units: i64, share_percent: i64, floor_minor_units: i64) -> i64 {
    (price_minor_units * share_percent / 100).max(floor_minor_units)
}
