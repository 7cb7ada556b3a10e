//! Shared application state (spec §5 "Shared-resource policy": the
//! control-plane DB is a single source of truth with per-site write
//! serialization).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ed25519_dalek::SigningKey;
use rusqlite::Connection;
use tokio::sync::Mutex as AsyncMutex;

use crate::bundle_store::BundleStore;

pub struct AppState {
    /// Single writer, multiple logical readers (spec §5); handlers lock
    /// only for the duration of a transaction, never across an `.await`.
    pub db: Mutex<Connection>,
    pub bundle_store: Arc<dyn BundleStore>,
    /// Signs `McpOrder`s and is published at `GET /api/evidence/public-key`
    /// for operator-portal display and appliance-side verification.
    pub order_signing_key: SigningKey,
    pub require_bearer_auth: bool,
    pub order_ttl_s: i64,
    /// Per-site advisory lock serializing evidence submits for the same
    /// site (spec §5: "Submits for the same site are serialized via a
    /// per-site advisory lock"). Lazily created; never removed, which is
    /// fine — the number of sites is small and bounded by the fleet size.
    site_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AppState {
    pub fn new(db: Connection, bundle_store: Arc<dyn BundleStore>, order_signing_key: SigningKey, require_bearer_auth: bool, order_ttl_s: i64) -> Self {
        Self {
            db: Mutex::new(db),
            bundle_store,
            order_signing_key,
            require_bearer_auth,
            order_ttl_s,
            site_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn site_lock(&self, site_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.site_locks.lock().unwrap();
        locks.entry(site_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }
}
