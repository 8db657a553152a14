pub mod address;
pub mod driver;
pub mod locker;
pub mod order;
pub mod rate;
pub mod seller;
pub mod shipment;
