//! Storage module for database and configuration.

pub mod config;
pub mod database;
pub mod load_store;
pub mod schema;
pub mod snapshot_store;

pub use config::{AcwrSettings, AppConfig, BatchSettings, ConfigError, StorageSettings};
pub use database::{Database, DatabaseError};
pub use load_store::LoadStore;
pub use snapshot_store::SnapshotStore;
