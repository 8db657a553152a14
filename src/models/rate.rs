use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    Courier,
    Locker,
    InHouse,
    Collection,
}

impl ProviderFamily {
    /// Only courier and locker shipments carry printable labels; in-house
    /// and collection shipments move through the driver/collection flow.
    pub fn supports_labels(self) -> bool {
        matches!(self, ProviderFamily::Courier | ProviderFamily::Locker)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderFamily::Courier => "courier",
            ProviderFamily::Locker => "locker",
            ProviderFamily::InHouse => "in_house",
            ProviderFamily::Collection => "collection",
        }
    }
}

/// Adapter selection key: provider family plus the locker-mode sub-variant.
/// A seller enables any subset of these per its shipping configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryService {
    Courier,
    DoorToLocker,
    LockerToDoor,
    LockerToLocker,
    InHouse,
    Collection,
}

impl DeliveryService {
    pub fn family(self) -> ProviderFamily {
        match self {
            DeliveryService::Courier => ProviderFamily::Courier,
            DeliveryService::DoorToLocker
            | DeliveryService::LockerToDoor
            | DeliveryService::LockerToLocker => ProviderFamily::Locker,
            DeliveryService::InHouse => ProviderFamily::InHouse,
            DeliveryService::Collection => ProviderFamily::Collection,
        }
    }

    /// Routes that pick up from the seller's designated origin locker.
    pub fn needs_origin_locker(self) -> bool {
        matches!(
            self,
            DeliveryService::LockerToDoor | DeliveryService::LockerToLocker
        )
    }

    /// Routes that drop off into a locker near the buyer.
    pub fn needs_destination_locker(self) -> bool {
        matches!(
            self,
            DeliveryService::DoorToLocker | DeliveryService::LockerToLocker
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryService::Courier => "courier",
            DeliveryService::DoorToLocker => "door_to_locker",
            DeliveryService::LockerToDoor => "locker_to_door",
            DeliveryService::LockerToLocker => "locker_to_locker",
            DeliveryService::InHouse => "in_house",
            DeliveryService::Collection => "collection",
        }
    }
}

/// A quoted shipping option. Immutable once quoted; it becomes binding only
/// when frozen onto a shipment at rate selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingRate {
    pub id: Uuid,
    pub service: DeliveryService,
    pub provider_family: ProviderFamily,
    pub carrier_label: String,
    pub service_level: String,
    pub price_minor_units: i64,
    pub currency: String,
    pub estimated_transit: String,
    pub origin_locker_id: Option<Uuid>,
    pub destination_locker_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    pub provider: String,
    pub reason: String,
}

/// Aggregator result: merged rates plus per-provider failures. Partial
/// provider failure never fails the quote as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    pub rates: Vec<ShippingRate>,
    pub provider_errors: Vec<ProviderError>,
}

/// How long a cached quote stays selectable before the client must quote
/// again. Carrier prices move; a quote from this morning is not an offer.
const QUOTE_TTL_MINUTES: i64 = 30;

/// Server-side copy of a rate quoted for one shipment, kept so rate
/// selection freezes the authoritative quote rather than trusting a client
/// echo.
#[derive(Debug, Clone)]
pub struct QuotedRate {
    pub shipment_id: Uuid,
    pub rate: ShippingRate,
    pub quoted_at: DateTime<Utc>,
}

impl QuotedRate {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.quoted_at > Duration::minutes(QUOTE_TTL_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{DeliveryService, ProviderFamily, QuotedRate, ShippingRate};

    #[test]
    fn quotes_age_out_after_the_ttl() {
        let mut quoted = QuotedRate {
            shipment_id: Uuid::new_v4(),
            rate: ShippingRate {
                id: Uuid::new_v4(),
                service: DeliveryService::Courier,
                provider_family: ProviderFamily::Courier,
                carrier_label: "Swiftline".to_string(),
                service_level: "economy".to_string(),
                price_minor_units: 6500,
                currency: "ZAR".to_string(),
                estimated_transit: "2-4 business days".to_string(),
                origin_locker_id: None,
                destination_locker_id: None,
            },
            quoted_at: Utc::now(),
        };

        assert!(!quoted.is_stale(Utc::now()));

        quoted.quoted_at = Utc::now() - Duration::minutes(31);
        assert!(quoted.is_stale(Utc::now()));
    }
}
