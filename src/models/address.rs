use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub suburb: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub location: Option<GeoPoint>,
}

impl Address {
    pub fn summary(&self) -> String {
        format!("{}, {}, {}", self.line1, self.city, self.postal_code)
    }
}
