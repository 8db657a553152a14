use async_trait::async_trait;
use uuid::Uuid;

use super::{
    CarrierError, LabelAdapter, LabelReceipt, LabelRequest, RateAdapter, RateRequest,
    tracking_reference,
};
use crate::models::order::Parcel;
use crate::models::rate::{DeliveryService, ProviderFamily, ShippingRate};

const MAX_PARCEL_KG: f64 = 20.0;
const MAX_DIMENSION_CM: f64 = 60.0;
const LOCKER_TO_LOCKER_PRICE: i64 = 4500;
const DOOR_TO_LOCKER_PRICE: i64 = 5500;
const LOCKER_TO_DOOR_PRICE: i64 = 6000;

/// Built-in locker network ("LockerLink") behind all three routing variants.
/// Locker-to-locker is the cheapest because the network never dispatches a
/// door vehicle; door legs add cost on either end.
pub struct LockerNetwork;

impl LockerNetwork {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RateAdapter for LockerNetwork {
    async fn quote(&self, request: RateRequest) -> Result<Vec<ShippingRate>, CarrierError> {
        let consignment = Parcel::aggregate(&request.parcels);
        if !fits_locker(&consignment) {
            return Err(CarrierError::Rejected(format!(
                "consignment exceeds locker limits ({MAX_PARCEL_KG} kg / {MAX_DIMENSION_CM} cm)"
            )));
        }

        let price = match request.service {
            DeliveryService::DoorToLocker => DOOR_TO_LOCKER_PRICE,
            DeliveryService::LockerToDoor => LOCKER_TO_DOOR_PRICE,
            DeliveryService::LockerToLocker => LOCKER_TO_LOCKER_PRICE,
            other => {
                return Err(CarrierError::Rejected(format!(
                    "locker network cannot serve {}",
                    other.as_str()
                )));
            }
        };

        if request.service.needs_origin_locker() && request.origin_locker.is_none() {
            return Err(CarrierError::Rejected("origin locker required".to_string()));
        }

        let estimated_transit = match (
            request.service.needs_destination_locker(),
            &request.destination_locker,
        ) {
            (true, Some(locker)) => format!("2-4 business days, collect at {}", locker.name),
            (true, None) => {
                return Err(CarrierError::Rejected(
                    "destination locker required".to_string(),
                ));
            }
            (false, _) => "2-4 business days".to_string(),
        };

        Ok(vec![ShippingRate {
            id: Uuid::new_v4(),
            service: request.service,
            provider_family: ProviderFamily::Locker,
            carrier_label: "LockerLink".to_string(),
            service_level: "standard".to_string(),
            price_minor_units: price,
            currency: request.currency.clone(),
            estimated_transit,
            origin_locker_id: request.origin_locker.as_ref().map(|l| l.id),
            destination_locker_id: request.destination_locker.as_ref().map(|l| l.id),
        }])
    }
}

#[async_trait]
impl LabelAdapter for LockerNetwork {
    async fn create_label(&self, request: LabelRequest) -> Result<LabelReceipt, CarrierError> {
        let consignment = Parcel::aggregate(&request.parcels);
        if !fits_locker(&consignment) {
            return Err(CarrierError::Rejected(format!(
                "consignment exceeds locker limits ({MAX_PARCEL_KG} kg / {MAX_DIMENSION_CM} cm)"
            )));
        }

        let service = request.rate.service;
        if service.needs_origin_locker() && request.origin_locker.is_none() {
            return Err(CarrierError::Rejected("origin locker required".to_string()));
        }
        if service.needs_destination_locker() && request.destination_locker.is_none() {
            return Err(CarrierError::Rejected(
                "destination locker required".to_string(),
            ));
        }

        // The network texts the seller a deposit code for loading the
        // parcel into the origin locker.
        if service.needs_origin_locker() && request.seller.phone.is_none() {
            return Err(CarrierError::Rejected(
                "seller contact phone required for locker deposit".to_string(),
            ));
        }

        let tracking_number = format!("LLK-{}", tracking_reference());
        let tracking_url = format!("https://track.lockerlink.example/{tracking_number}");

        // Buyers need a PIN only when the parcel terminates in a locker.
        let access_code = service.needs_destination_locker().then(locker_pin);

        Ok(LabelReceipt {
            tracking_number,
            tracking_url,
            access_code,
        })
    }
}

fn fits_locker(consignment: &Parcel) -> bool {
    consignment.weight_kg <= MAX_PARCEL_KG
        && consignment.length_cm <= MAX_DIMENSION_CM
        && consignment.width_cm <= MAX_DIMENSION_CM
        && consignment.height_cm <= MAX_DIMENSION_CM
}

fn locker_pin() -> String {
    format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}
