use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::carriers::CarrierRegistry;
use crate::config::Config;
use crate::engine::quotes::RateAggregator;
use crate::error::AppError;
use crate::models::driver::DriverProfile;
use crate::models::locker::Locker;
use crate::models::order::Order;
use crate::models::rate::QuotedRate;
use crate::models::seller::SellerProfile;
use crate::models::shipment::Shipment;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub config: Config,
    pub sellers: DashMap<Uuid, SellerProfile>,
    pub lockers: DashMap<Uuid, Locker>,
    pub orders: DashMap<Uuid, Order>,
    pub shipments: DashMap<Uuid, Shipment>,
    pub drivers: DashMap<Uuid, DriverProfile>,
    /// Quotes issued to clients, keyed by rate id. Rate selection copies the
    /// authoritative entry from here rather than trusting a client echo.
    pub quoted_rates: DashMap<Uuid, QuotedRate>,
    pub carriers: Arc<CarrierRegistry>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_carriers(config, CarrierRegistry::standard())
    }

    /// Tests swap in mock carrier registries through this constructor.
    pub fn with_carriers(config: Config, carriers: CarrierRegistry) -> Self {
        Self {
            config,
            sellers: DashMap::new(),
            lockers: DashMap::new(),
            orders: DashMap::new(),
            shipments: DashMap::new(),
            drivers: DashMap::new(),
            quoted_rates: DashMap::new(),
            carriers: Arc::new(carriers),
            metrics: Metrics::new(),
        }
    }

    pub fn aggregator(&self) -> RateAggregator {
        RateAggregator::new(Arc::clone(&self.carriers), &self.config)
    }

    pub fn seller(&self, id: Uuid) -> Result<SellerProfile, AppError> {
        self.sellers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("seller {id} not found")))
    }

    pub fn locker(&self, id: Uuid) -> Option<Locker> {
        self.lockers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn operational_lockers(&self) -> Vec<Locker> {
        self.lockers
            .iter()
            .filter(|entry| entry.value().is_operational())
            .map(|entry| entry.value().clone())
            .collect()
    }
}
