pub mod crm;
pub mod inventory;
pub mod movement;
pub mod report;
pub mod tenancy;
