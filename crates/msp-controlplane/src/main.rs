//! Control-plane binary: loads config, opens the database, and serves
//! the HTTP API (spec §2 "Checkin Fan-In" / "Evidence Chain").

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use msp_controlplane::bundle_store::FsBundleStore;
use msp_controlplane::db;
use msp_controlplane::state::AppState;
use msp_infra::ControlPlaneConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("MSP_CONFIG").unwrap_or_else(|_| "/var/lib/msp-control/config.yaml".to_string());
    let config = ControlPlaneConfig::load(&PathBuf::from(config_path))?;
    msp_infra::logging::init(&config.logging);

    info!(listen_addr = %config.listen_addr, require_bearer_auth = config.require_bearer_auth, "control plane starting");

    let conn = msp_infra::sqlite::open_wal(&config.database_path)?;
    db::init(&conn)?;

    let keys_dir = config.database_path.parent().unwrap_or_else(|| std::path::Path::new(".")).join("keys");
    let order_signing_key = msp_infra::keys::load_or_create_signing_key(&keys_dir.join("order_signing.key"))?;
    info!(public_key = %hex::encode(order_signing_key.verifying_key().to_bytes()), "order signing key ready");

    std::fs::create_dir_all(&config.bundle_store_dir)?;
    let bundle_store = Arc::new(FsBundleStore::new(config.bundle_store_dir.clone()));

    let state = Arc::new(AppState::new(conn, bundle_store, order_signing_key, config.require_bearer_auth, config.order_ttl_s));
    let router = msp_controlplane::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "serving control-plane API");
    axum::serve(listener, router).await?;

    Ok(())
}
