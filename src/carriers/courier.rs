use async_trait::async_trait;
use uuid::Uuid;

use super::{
    CarrierError, LabelAdapter, LabelReceipt, LabelRequest, RateAdapter, RateRequest,
    tracking_reference,
};
use crate::models::order::Parcel;
use crate::models::rate::{DeliveryService, ProviderFamily, ShippingRate};

const VOLUMETRIC_DIVISOR: f64 = 5000.0;
const MAX_BILLABLE_KG: i64 = 30;
const ECONOMY_BASE: i64 = 6500;
const ECONOMY_PER_EXTRA_KG: i64 = 950;
const EXPRESS_BASE: i64 = 9900;
const EXPRESS_PER_EXTRA_KG: i64 = 1400;

/// Built-in door-to-door courier ("Swiftline"). Quotes economy and express
/// service levels off the consignment's billable weight. A live carrier API
/// slots in behind the same two traits.
pub struct DoorToDoorCourier;

impl DoorToDoorCourier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RateAdapter for DoorToDoorCourier {
    async fn quote(&self, request: RateRequest) -> Result<Vec<ShippingRate>, CarrierError> {
        if !covers(&request.destination.country) {
            return Err(CarrierError::NoCoverage(format!(
                "no courier coverage for {}",
                request.destination.country
            )));
        }

        let consignment = Parcel::aggregate(&request.parcels);
        let billable_kg = billable_kg(&consignment);
        if billable_kg > MAX_BILLABLE_KG {
            return Err(CarrierError::Rejected(format!(
                "consignment exceeds {MAX_BILLABLE_KG} kg billable weight"
            )));
        }

        let extra_kg = (billable_kg - 1).max(0);
        Ok(vec![
            rate(
                &request,
                "economy",
                ECONOMY_BASE + extra_kg * ECONOMY_PER_EXTRA_KG,
                "2-4 business days",
            ),
            rate(
                &request,
                "express",
                EXPRESS_BASE + extra_kg * EXPRESS_PER_EXTRA_KG,
                "next business day",
            ),
        ])
    }
}

#[async_trait]
impl LabelAdapter for DoorToDoorCourier {
    async fn create_label(&self, request: LabelRequest) -> Result<LabelReceipt, CarrierError> {
        // Manifests get the same checks as quotes; a rate frozen weeks ago
        // does not oblige the carrier to carry it.
        if !covers(&request.destination.country) {
            return Err(CarrierError::NoCoverage(format!(
                "no courier coverage for {}",
                request.destination.country
            )));
        }

        let consignment = Parcel::aggregate(&request.parcels);
        if billable_kg(&consignment) > MAX_BILLABLE_KG {
            return Err(CarrierError::Rejected(format!(
                "consignment exceeds {MAX_BILLABLE_KG} kg billable weight"
            )));
        }

        let tracking_number = format!("SWL-{}", tracking_reference());
        let tracking_url = format!(
            "https://track.swiftline.example/{tracking_number}?ref={}",
            request.shipment_id.simple()
        );

        Ok(LabelReceipt {
            tracking_number,
            tracking_url,
            access_code: None,
        })
    }
}

fn covers(country: &str) -> bool {
    country.eq_ignore_ascii_case("za") || country.eq_ignore_ascii_case("south africa")
}

/// Chargeable weight: the greater of actual and volumetric weight, rounded
/// up to the next whole kilogram (minimum one).
fn billable_kg(consignment: &Parcel) -> i64 {
    let volumetric_kg =
        consignment.length_cm * consignment.width_cm * consignment.height_cm / VOLUMETRIC_DIVISOR;
    (consignment.weight_kg.max(volumetric_kg).ceil() as i64).max(1)
}

fn rate(request: &RateRequest, service_level: &str, price: i64, transit: &str) -> ShippingRate {
    ShippingRate {
        id: Uuid::new_v4(),
        service: DeliveryService::Courier,
        provider_family: ProviderFamily::Courier,
        carrier_label: "Swiftline".to_string(),
        service_level: service_level.to_string(),
        price_minor_units: price,
        currency: request.currency.clone(),
        estimated_transit: transit.to_string(),
        origin_locker_id: None,
        destination_locker_id: None,
    }
}
