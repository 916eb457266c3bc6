pub mod catalog_service;
pub mod license_service;
pub mod report_service;
pub mod stock_ledger;
