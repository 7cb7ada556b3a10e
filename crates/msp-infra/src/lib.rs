//! I/O plumbing shared across the appliance and control plane: config
//! loading, tracing setup, SQLite connection helpers, the Ed25519
//! signing-key lifecycle, and the per-appliance CA.

pub mod ca;
pub mod config;
pub mod keys;
pub mod logging;
pub mod sqlite;

pub use config::{ApplianceConfig, ConfigError, ControlPlaneConfig, MaintenanceWindowConfig};
pub use logging::LoggingConfig;
