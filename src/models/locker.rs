use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::address::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockerStatus {
    Operational,
    OutOfService,
}

/// A pickup-point cabinet in the locker network. Shipments reference
/// lockers by id; they never own them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locker {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub address: Address,
    pub status: LockerStatus,
}

impl Locker {
    pub fn is_operational(&self) -> bool {
        self.status == LockerStatus::Operational
    }
}
