//! Boot-time configuration. Loaded once into an immutable struct (spec §9:
//! "Config loaded once at boot into an immutable struct"); runtime-tunable
//! values (L1 rules, credentials, targets) are explicitly out of this
//! struct and live in their owning components with `reload()` methods.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LoggingConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: config::ConfigError,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindowConfig {
    /// `HH:MM` UTC, may wrap past midnight.
    pub start: String,
    pub end: String,
}

impl Default for MaintenanceWindowConfig {
    fn default() -> Self {
        Self {
            start: "22:00".into(),
            end: "02:00".into(),
        }
    }
}

/// Boot-time configuration for the appliance daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplianceConfig {
    pub site_id: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
    pub bearer_token: Option<String>,
    #[serde(default = "default_checkin_interval_s")]
    pub checkin_interval_s: u64,
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
    #[serde(default = "default_scan_cycle_budget_s")]
    pub scan_cycle_budget_s: u64,
    #[serde(default)]
    pub maintenance_window: MaintenanceWindowConfig,
    #[serde(default = "default_l2_socket_path")]
    pub l2_socket_path: PathBuf,
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/msp")
}

fn default_control_plane_url() -> String {
    "https://control-plane.internal".to_string()
}

fn default_checkin_interval_s() -> u64 {
    60
}

fn default_scan_concurrency() -> usize {
    10
}

fn default_scan_cycle_budget_s() -> u64 {
    600
}

fn default_l2_socket_path() -> PathBuf {
    PathBuf::from("/var/lib/msp/l2.sock")
}

fn default_grpc_port() -> u16 {
    50051
}

impl ApplianceConfig {
    /// Loads `config.yaml` from `path`, layering environment overrides
    /// prefixed `MSP_` (e.g. `MSP_SITE_ID`), the way the teacher's
    /// `config` crate usage layers file + env.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("MSP").separator("__"))
            .build()
            .map_err(|source| ConfigError::Load {
                path: path.display().to_string(),
                source,
            })?;

        settings
            .try_deserialize()
            .map_err(|source| ConfigError::Load {
                path: path.display().to_string(),
                source,
            })
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    pub fn ca_dir(&self) -> PathBuf {
        self.data_dir.join("ca")
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.data_dir.join("evidence")
    }

    pub fn rules_path(&self) -> PathBuf {
        self.data_dir.join("rules").join("l1_rules.json")
    }

    pub fn queue_db_path(&self) -> PathBuf {
        self.data_dir.join("queue.db")
    }

    pub fn flap_db_path(&self) -> PathBuf {
        self.data_dir.join("flap_suppressions.db")
    }
}

/// Boot-time configuration for the control plane binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_bundle_store_dir")]
    pub bundle_store_dir: PathBuf,
    pub require_bearer_auth: bool,
    #[serde(default = "default_order_ttl_s")]
    pub order_ttl_s: i64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8443".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("/var/lib/msp-control/controlplane.db")
}

fn default_bundle_store_dir() -> PathBuf {
    PathBuf::from("/var/lib/msp-control/bundles")
}

fn default_order_ttl_s() -> i64 {
    15 * 60
}

impl ControlPlaneConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("MSP").separator("__"))
            .build()
            .map_err(|source| ConfigError::Load {
                path: path.display().to_string(),
                source,
            })?;

        settings
            .try_deserialize()
            .map_err(|source| ConfigError::Load {
                path: path.display().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_appliance_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "site_id: site-1").unwrap();
        let cfg = ApplianceConfig::load(file.path()).unwrap();
        assert_eq!(cfg.site_id, "site-1");
        assert_eq!(cfg.scan_concurrency, 10);
        assert_eq!(cfg.scan_cycle_budget_s, 600);
        assert_eq!(cfg.maintenance_window.start, "22:00");
    }
}
