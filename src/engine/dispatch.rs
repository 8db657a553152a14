use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::{lifecycle, pricing};
use crate::error::AppError;
use crate::geo::{haversine_km, travel_minutes};
use crate::models::driver::{DeliveryOffer, DriverProfile, DriverStatus};
use crate::models::rate::ProviderFamily;
use crate::models::shipment::{Actor, DispatchClaim, Shipment, ShipmentStatus};
use crate::state::AppState;

/// Claimable work for one driver: in-house shipments in ready_for_shipping
/// with no claim owner, for sellers the driver is authorized to serve.
/// A polling read; claims are what remove entries from it.
pub fn list_available(state: &AppState, driver_id: Uuid) -> Result<Vec<DeliveryOffer>, AppError> {
    let driver = state
        .drivers
        .get(&driver_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    let claimable: Vec<Shipment> = state
        .shipments
        .iter()
        .filter_map(|entry| {
            let shipment = entry.value();
            let eligible = shipment.provider_family == Some(ProviderFamily::InHouse)
                && shipment.status == ShipmentStatus::ReadyForShipping
                && shipment.claim.is_none()
                && driver.serves(shipment.seller_id);
            eligible.then(|| shipment.clone())
        })
        .collect();

    let mut offers = Vec::with_capacity(claimable.len());
    for shipment in claimable {
        let seller = state.seller(shipment.seller_id).map_err(|_| {
            AppError::Internal(format!(
                "shipment {} references unknown seller {}",
                shipment.id, shipment.seller_id
            ))
        })?;

        let payout = shipment
            .selected_rate
            .as_ref()
            .map(|rate| {
                pricing::driver_payout(
                    rate.price_minor_units,
                    state.config.driver_payout_share_percent,
                    state.config.driver_payout_floor,
                )
            })
            .unwrap_or(state.config.driver_payout_floor);

        let (distance_km, estimated_minutes) =
            match (seller.address.location, shipment.destination.location) {
                (Some(from), Some(to)) => {
                    let km = haversine_km(&from, &to);
                    (Some(km), Some(travel_minutes(km)))
                }
                _ => (None, None),
            };

        let item_count = shipment.item_count();
        offers.push(DeliveryOffer {
            shipment_id: shipment.id,
            seller_name: seller.name,
            pickup: seller.address,
            dropoff: shipment.destination,
            item_count,
            payout_minor_units: payout,
            distance_km,
            estimated_minutes,
            delivery_note: shipment.delivery_note,
        });
    }

    Ok(offers)
}

/// Grants at most one driver the delivery. Two conditional steps that never
/// hold both entry locks at once: flip the driver to on_delivery, then
/// check-and-write the claim owner under the shipment's entry lock, rolling
/// the driver back if that fails. The entry lock makes the claim check and
/// write a single atomic action, so of N concurrent claims exactly one
/// wins and the rest observe `AlreadyClaimed`.
pub fn claim(state: &AppState, delivery_id: Uuid, driver_id: Uuid) -> Result<Shipment, AppError> {
    let result = try_claim(state, delivery_id, driver_id);

    let outcome = match &result {
        Ok(_) => "won",
        Err(AppError::AlreadyClaimed) => "lost",
        Err(_) => "rejected",
    };
    state
        .metrics
        .delivery_claims_total
        .with_label_values(&[outcome])
        .inc();

    if let Ok(shipment) = &result {
        state.metrics.active_deliveries.inc();
        info!(
            delivery_id = %delivery_id,
            driver_id = %driver_id,
            dropoff = %shipment.destination.summary(),
            "delivery claimed"
        );
    }

    result
}

fn try_claim(state: &AppState, delivery_id: Uuid, driver_id: Uuid) -> Result<Shipment, AppError> {
    // seller_id is immutable on a shipment, so reading it outside the
    // claim's critical section is safe.
    let seller_id = state
        .shipments
        .get(&delivery_id)
        .map(|entry| entry.seller_id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

    flip_driver_to_delivery(state, driver_id, seller_id)?;

    claim_under_lock(state, delivery_id, driver_id).map_err(|err| {
        release_driver(state, driver_id);
        err
    })
}

fn flip_driver_to_delivery(
    state: &AppState,
    driver_id: Uuid,
    seller_id: Uuid,
) -> Result<(), AppError> {
    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    if !driver.serves(seller_id) {
        return Err(AppError::Conflict(
            "driver is not authorized for this seller".to_string(),
        ));
    }

    if driver.status != DriverStatus::Available {
        return Err(AppError::Conflict(
            "driver must be available to claim a delivery".to_string(),
        ));
    }

    driver.status = DriverStatus::OnDelivery;
    driver.updated_at = Utc::now();
    Ok(())
}

fn claim_under_lock(
    state: &AppState,
    delivery_id: Uuid,
    driver_id: Uuid,
) -> Result<Shipment, AppError> {
    let mut entry = state
        .shipments
        .get_mut(&delivery_id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

    // Checked before anything else so a racing driver always hears
    // "already claimed" rather than a misleading readiness error.
    if entry.claim.is_some() {
        return Err(AppError::AlreadyClaimed);
    }

    if entry.provider_family != Some(ProviderFamily::InHouse) {
        return Err(AppError::Conflict(
            "only in-house deliveries can be claimed".to_string(),
        ));
    }

    if entry.status != ShipmentStatus::ReadyForShipping {
        return Err(AppError::Conflict(
            "delivery is not ready for dispatch".to_string(),
        ));
    }

    let price = entry
        .selected_rate
        .as_ref()
        .map(|rate| rate.price_minor_units)
        .unwrap_or(0);
    let payout = pricing::driver_payout(
        price,
        state.config.driver_payout_share_percent,
        state.config.driver_payout_floor,
    );

    lifecycle::transition(
        &mut entry,
        ShipmentStatus::InTransit,
        Some("claimed by driver".to_string()),
        None,
        Actor::Driver,
    )?;

    entry.claim = Some(DispatchClaim {
        driver_id,
        payout_minor_units: payout,
        claimed_at: Utc::now(),
    });

    Ok(entry.clone())
}

fn release_driver(state: &AppState, driver_id: Uuid) {
    if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
        if driver.status == DriverStatus::OnDelivery {
            driver.status = DriverStatus::Available;
            driver.updated_at = Utc::now();
        }
    }
}

/// Marks the delivery done. Only the claiming driver may complete it; the
/// payout credited is the one frozen at claim time.
pub fn complete(state: &AppState, delivery_id: Uuid, driver_id: Uuid) -> Result<Shipment, AppError> {
    let (shipment, payout) = {
        let mut entry = state
            .shipments
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

        let payout = match &entry.claim {
            Some(claim) if claim.driver_id == driver_id => claim.payout_minor_units,
            Some(_) => {
                return Err(AppError::Conflict(
                    "delivery is claimed by another driver".to_string(),
                ));
            }
            None => {
                return Err(AppError::Conflict(
                    "delivery has not been claimed".to_string(),
                ));
            }
        };

        lifecycle::transition(
            &mut entry,
            ShipmentStatus::Delivered,
            Some("delivered by driver".to_string()),
            None,
            Actor::Driver,
        )?;

        (entry.clone(), payout)
    };

    {
        let mut driver = state
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::Internal(format!("driver {driver_id} record missing")))?;
        driver.status = DriverStatus::Available;
        driver.total_deliveries += 1;
        driver.available_earnings_minor_units += payout;
        driver.updated_at = Utc::now();
    }

    state.metrics.active_deliveries.dec();
    info!(
        delivery_id = %delivery_id,
        driver_id = %driver_id,
        payout = payout,
        "delivery completed"
    );

    Ok(shipment)
}

/// Applies a staff or carrier status update to a shipment. A transition
/// into a branch state voids any active claim and returns the driver to
/// `available`; without that, a cancel mid-delivery would leave the driver
/// stuck in `on_delivery` with no way out. Walking a claimed delivery to
/// `delivered` is refused here: that is the claiming driver's `complete`
/// call, which also credits the payout.
pub fn apply_transition(
    state: &AppState,
    shipment_id: Uuid,
    target: ShipmentStatus,
    message: Option<String>,
    location: Option<String>,
    actor: Actor,
) -> Result<Shipment, AppError> {
    let (shipment, released) = {
        let mut entry = state
            .shipments
            .get_mut(&shipment_id)
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))?;

        if entry.claim.is_some() && target == ShipmentStatus::Delivered {
            return Err(AppError::Conflict(
                "claimed deliveries are completed by their driver".to_string(),
            ));
        }

        lifecycle::transition(&mut entry, target, message, location, actor)?;

        let released = if entry.status.is_branch() {
            entry.claim.take()
        } else {
            None
        };
        (entry.clone(), released)
    };

    if let Some(claim) = released {
        release_driver(state, claim.driver_id);
        state.metrics.active_deliveries.dec();
        info!(
            shipment_id = %shipment_id,
            driver_id = %claim.driver_id,
            "delivery closed before completion; driver released"
        );
    }

    if shipment.status.is_terminal() {
        state
            .quoted_rates
            .retain(|_, quoted| quoted.shipment_id != shipment_id);
    }

    Ok(shipment)
}

/// The offline/online toggle. `on_delivery` is only entered through
/// `claim`, and a driver with an active delivery cannot leave it here.
pub fn set_driver_status(
    state: &AppState,
    driver_id: Uuid,
    target: DriverStatus,
) -> Result<DriverProfile, AppError> {
    if target == DriverStatus::OnDelivery {
        return Err(AppError::BadRequest(
            "drivers go on delivery by claiming, not by status update".to_string(),
        ));
    }

    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    if driver.status == DriverStatus::OnDelivery {
        return Err(AppError::Conflict(
            "driver cannot change status while on a delivery".to_string(),
        ));
    }

    driver.status = target;
    driver.updated_at = Utc::now();
    Ok(driver.clone())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{apply_transition, claim, complete, list_available, set_driver_status};
    use crate::carriers::CarrierRegistry;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::address::{Address, GeoPoint};
    use crate::models::driver::{DriverProfile, DriverStatus};
    use crate::models::order::OrderItem;
    use crate::models::rate::{DeliveryService, ShippingRate};
    use crate::models::seller::{InHousePricing, SellerProfile};
    use crate::models::shipment::{Actor, Shipment, ShipmentStatus};
    use crate::state::AppState;

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

    fn state() -> AppState {
        AppState::with_carriers(Config::default(), CarrierRegistry::new())
    }

    fn insert_seller(state: &AppState) -> Uuid {
        let seller = SellerProfile {
            id: Uuid::new_v4(),
            name: "Greenfields".to_string(),
            contact_name: None,
            phone: None,
            address: address(Some(GeoPoint {
                lat: -26.2041,
                lng: 28.0473,
            })),
            enabled_services: vec![DeliveryService::InHouse],
            origin_locker_id: None,
            pricing: InHousePricing::default(),
            created_at: Utc::now(),
        };
        let id = seller.id;
        state.sellers.insert(id, seller);
        id
    }

    fn insert_driver(state: &AppState, status: DriverStatus, seller_ids: Vec<Uuid>) -> Uuid {
        let driver = DriverProfile {
            id: Uuid::new_v4(),
            name: "Sipho".to_string(),
            phone: None,
            status,
            seller_ids,
            total_deliveries: 0,
            available_earnings_minor_units: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let id = driver.id;
        state.drivers.insert(id, driver);
        id
    }

    fn insert_delivery(
        state: &AppState,
        seller_id: Uuid,
        service: DeliveryService,
        status: ShipmentStatus,
    ) -> Uuid {
        let mut shipment = Shipment::new(
            Uuid::new_v4(),
            seller_id,
            vec![OrderItem {
                id: Uuid::new_v4(),
                seller_id,
                name: "rooibos".to_string(),
                quantity: 2,
                unit_price_minor_units: 2500,
                unit_weight_kg: 0.3,
                length_cm: 20.0,
                width_cm: 12.0,
                height_cm: 8.0,
            }],
            address(Some(GeoPoint {
                lat: -26.1341,
                lng: 28.0473,
            })),
            Some("leave at reception".to_string()),
        );
        shipment.selected_rate = Some(ShippingRate {
            id: Uuid::new_v4(),
            service,
            provider_family: service.family(),
            carrier_label: "Greenfields".to_string(),
            service_level: "same-day".to_string(),
            price_minor_units: 5000,
            currency: "ZAR".to_string(),
            estimated_transit: "about 25 min".to_string(),
            origin_locker_id: None,
            destination_locker_id: None,
        });
        shipment.provider_family = Some(service.family());
        shipment.status = status;
        let id = shipment.id;
        state.shipments.insert(id, shipment);
        id
    }

    #[test]
    fn offers_only_include_ready_unclaimed_in_house_work() {
        let state = state();
        let seller_id = insert_seller(&state);
        let driver_id = insert_driver(&state, DriverStatus::Available, vec![]);

        let ready = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );
        insert_delivery(
            &state,
            seller_id,
            DeliveryService::Courier,
            ShipmentStatus::ReadyForShipping,
        );
        insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::Pending,
        );
        let claimed = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );
        let other_driver = insert_driver(&state, DriverStatus::Available, vec![]);
        claim(&state, claimed, other_driver).unwrap();

        let offers = list_available(&state, driver_id).unwrap();

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].shipment_id, ready);
        // 80% of the R50 rate, above the R20 floor.
        assert_eq!(offers[0].payout_minor_units, 4000);
        assert_eq!(offers[0].item_count, 2);
        assert_eq!(offers[0].dropoff.city, "Johannesburg");
        assert!(offers[0].distance_km.is_some());
        assert_eq!(offers[0].delivery_note.as_deref(), Some("leave at reception"));
    }

    #[test]
    fn offers_respect_seller_authorization() {
        let state = state();
        let seller_a = insert_seller(&state);
        let seller_b = insert_seller(&state);
        let a_delivery = insert_delivery(
            &state,
            seller_a,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );
        insert_delivery(
            &state,
            seller_b,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );

        let restricted = insert_driver(&state, DriverStatus::Available, vec![seller_a]);
        let unrestricted = insert_driver(&state, DriverStatus::Available, vec![]);

        let restricted_offers = list_available(&state, restricted).unwrap();
        assert_eq!(restricted_offers.len(), 1);
        assert_eq!(restricted_offers[0].shipment_id, a_delivery);

        assert_eq!(list_available(&state, unrestricted).unwrap().len(), 2);
    }

    #[test]
    fn claim_freezes_the_payout_and_flips_the_driver() {
        let state = state();
        let seller_id = insert_seller(&state);
        let driver_id = insert_driver(&state, DriverStatus::Available, vec![]);
        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );

        let shipment = claim(&state, delivery, driver_id).unwrap();

        assert_eq!(shipment.status, ShipmentStatus::InTransit);
        let frozen = shipment.claim.unwrap();
        assert_eq!(frozen.driver_id, driver_id);
        assert_eq!(frozen.payout_minor_units, 4000);
        assert_eq!(
            state.drivers.get(&driver_id).unwrap().status,
            DriverStatus::OnDelivery
        );
        assert_eq!(state.metrics.active_deliveries.get(), 1);
    }

    #[test]
    fn losing_claimant_hears_already_claimed_and_stays_available() {
        let state = state();
        let seller_id = insert_seller(&state);
        let winner = insert_driver(&state, DriverStatus::Available, vec![]);
        let loser = insert_driver(&state, DriverStatus::Available, vec![]);
        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );

        claim(&state, delivery, winner).unwrap();
        let result = claim(&state, delivery, loser);

        assert!(matches!(result, Err(AppError::AlreadyClaimed)));
        assert_eq!(
            state.drivers.get(&loser).unwrap().status,
            DriverStatus::Available
        );
    }

    #[test]
    fn only_available_drivers_can_claim() {
        let state = state();
        let seller_id = insert_seller(&state);
        let offline = insert_driver(&state, DriverStatus::Offline, vec![]);
        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );

        let result = claim(&state, delivery, offline);

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(state.shipments.get(&delivery).unwrap().claim.is_none());
    }

    #[test]
    fn pending_deliveries_cannot_be_claimed() {
        let state = state();
        let seller_id = insert_seller(&state);
        let driver_id = insert_driver(&state, DriverStatus::Available, vec![]);
        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::Pending,
        );

        let result = claim(&state, delivery, driver_id);

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(
            state.drivers.get(&driver_id).unwrap().status,
            DriverStatus::Available
        );
    }

    #[test]
    fn complete_credits_exactly_the_frozen_payout() {
        let state = state();
        let seller_id = insert_seller(&state);
        let driver_id = insert_driver(&state, DriverStatus::Available, vec![]);
        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );
        claim(&state, delivery, driver_id).unwrap();

        // Seller pricing changes after the claim must not move the payout.
        state
            .shipments
            .get_mut(&delivery)
            .unwrap()
            .selected_rate
            .as_mut()
            .unwrap()
            .price_minor_units = 99_000;

        let shipment = complete(&state, delivery, driver_id).unwrap();

        assert_eq!(shipment.status, ShipmentStatus::Delivered);
        let driver = state.drivers.get(&driver_id).unwrap();
        assert_eq!(driver.status, DriverStatus::Available);
        assert_eq!(driver.total_deliveries, 1);
        assert_eq!(driver.available_earnings_minor_units, 4000);
        assert_eq!(state.metrics.active_deliveries.get(), 0);
    }

    #[test]
    fn only_the_claimant_may_complete() {
        let state = state();
        let seller_id = insert_seller(&state);
        let claimant = insert_driver(&state, DriverStatus::Available, vec![]);
        let impostor = insert_driver(&state, DriverStatus::Available, vec![]);
        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );
        claim(&state, delivery, claimant).unwrap();

        let result = complete(&state, delivery, impostor);

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(
            state.shipments.get(&delivery).unwrap().status,
            ShipmentStatus::InTransit
        );
    }

    #[test]
    fn status_toggle_guards_the_on_delivery_state() {
        let state = state();
        let seller_id = insert_seller(&state);
        let driver_id = insert_driver(&state, DriverStatus::Offline, vec![]);

        set_driver_status(&state, driver_id, DriverStatus::Available).unwrap();
        let direct = set_driver_status(&state, driver_id, DriverStatus::OnDelivery);
        assert!(matches!(direct, Err(AppError::BadRequest(_))));

        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );
        claim(&state, delivery, driver_id).unwrap();

        let offline_mid_delivery = set_driver_status(&state, driver_id, DriverStatus::Offline);
        assert!(matches!(offline_mid_delivery, Err(AppError::Conflict(_))));

        complete(&state, delivery, driver_id).unwrap();
        set_driver_status(&state, driver_id, DriverStatus::Offline).unwrap();
        assert_eq!(
            state.drivers.get(&driver_id).unwrap().status,
            DriverStatus::Offline
        );
    }

    #[test]
    fn returned_delivery_gives_the_driver_back() {
        let state = state();
        let seller_id = insert_seller(&state);
        let driver_id = insert_driver(&state, DriverStatus::Available, vec![]);
        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );
        claim(&state, delivery, driver_id).unwrap();

        let shipment = apply_transition(
            &state,
            delivery,
            ShipmentStatus::Returned,
            Some("buyer refused the parcel".to_string()),
            None,
            Actor::Staff,
        )
        .unwrap();

        assert_eq!(shipment.status, ShipmentStatus::Returned);
        assert!(shipment.claim.is_none());
        assert_eq!(state.metrics.active_deliveries.get(), 0);

        let driver = state.drivers.get(&driver_id).unwrap();
        assert_eq!(driver.status, DriverStatus::Available);
        assert_eq!(driver.total_deliveries, 0);
        assert_eq!(driver.available_earnings_minor_units, 0);
    }

    #[test]
    fn staff_cannot_mark_a_claimed_delivery_delivered() {
        let state = state();
        let seller_id = insert_seller(&state);
        let driver_id = insert_driver(&state, DriverStatus::Available, vec![]);
        let delivery = insert_delivery(
            &state,
            seller_id,
            DeliveryService::InHouse,
            ShipmentStatus::ReadyForShipping,
        );
        claim(&state, delivery, driver_id).unwrap();

        let result = apply_transition(
            &state,
            delivery,
            ShipmentStatus::Delivered,
            None,
            None,
            Actor::Staff,
        );

        assert!(matches!(result, Err(AppError::Conflict(_))));
        let shipment = state.shipments.get(&delivery).unwrap();
        assert_eq!(shipment.status, ShipmentStatus::InTransit);
        assert!(shipment.claim.is_some());
        assert_eq!(
            state.drivers.get(&driver_id).unwrap().status,
            DriverStatus::OnDelivery
        );
    }
}
