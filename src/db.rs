pub mod store;
pub mod memory_store;
pub mod pg_store;
