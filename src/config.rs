use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub adapter_timeout_ms: u64,
    pub label_batch_size: usize,
    pub locker_search_radius_km: f64,
    pub driver_payout_share_percent: i64,
    pub driver_payout_floor: i64,
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            adapter_timeout_ms: parse_or_default("ADAPTER_TIMEOUT_MS", 8000)?,
            label_batch_size: parse_or_default("LABEL_BATCH_SIZE", 5)?,
            locker_search_radius_km: parse_or_default("LOCKER_SEARCH_RADIUS_KM", 25.0)?,
            driver_payout_share_percent: parse_or_default("DRIVER_PAYOUT_SHARE_PERCENT", 80)?,
            driver_payout_floor: parse_or_default("DRIVER_PAYOUT_FLOOR", 2000)?,
            currency: env::var("CURRENCY").unwrap_or_else(|_| "ZAR".to_string()),
        })
    }

    /// Upper bound on every rate and label adapter call.
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            adapter_timeout_ms: 8000,
            label_batch_size: 5,
            locker_search_radius_km: 25.0,
            driver_payout_share_percent: 80,
            driver_payout_floor: 2000,
            currency: "ZAR".to_string(),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
