//! Control plane: Checkin Fan-In (C6) and the Evidence Chain (C7), spec
//! §2. The ten HTTP endpoints in §6.1 are the entire external contract —
//! the operator dashboard that creates provisioning codes and orders is
//! explicitly out of scope, so this crate exposes the store-side
//! primitives (`db::Db::insert_order`, `db::Db::seed_provision_code`)
//! those out-of-scope callers would drive.

pub mod auth;
pub mod bundle_store;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orders;
pub mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Builds the axum `Router` wiring every endpoint in spec §6.1.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/appliances/checkin", post(handlers::checkin::checkin))
        .route("/api/provision/claim", post(handlers::provision::claim))
        .route("/api/appliances/domain-discovered", post(handlers::domain::domain_discovered))
        .route("/api/appliances/enumeration-results", post(handlers::domain::enumeration_results))
        .route(
            "/api/sites/:site_id/domain-credentials",
            post(handlers::domain::add_credential).get(handlers::domain::list_credentials),
        )
        .route("/api/evidence/sites/:site_id/submit", post(handlers::evidence::submit))
        .route("/api/evidence/sites/:site_id/verify", get(handlers::evidence::verify))
        .route("/api/evidence/sites/:site_id/bundles", get(handlers::evidence::list_bundles))
        .route("/api/evidence/public-key", get(handlers::evidence::public_key))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
