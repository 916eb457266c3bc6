pub mod customers;
pub mod license;
pub mod movements;
pub mod products;
pub mod reports;
