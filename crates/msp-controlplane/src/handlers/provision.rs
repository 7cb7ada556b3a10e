//! `POST /api/provision/claim` (spec §4.4, §6.1): exchanges a one-time
//! provisioning code minted by the operator dashboard (out of scope) for
//! a site id, appliance id, and bearer token.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use rand::RngCore;

use crate::db::Db;
use crate::error::ControlPlaneError;
use crate::models::{ProvisionClaimRequest, ProvisionClaimResponse};
use crate::state::AppState;

fn generate_bearer_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub async fn claim(State(state): State<Arc<AppState>>, Json(req): Json<ProvisionClaimRequest>) -> Result<Json<ProvisionClaimResponse>, ControlPlaneError> {
    let now = Utc::now();
    let bearer_token = generate_bearer_token();

    let mut conn = state.db.lock().unwrap();
    let (site_id, appliance_id) = Db::claim_provision_code(&mut conn, &req.code, &req.mac_address, &req.hostname, now, &bearer_token)?;

    Ok(Json(ProvisionClaimResponse { site_id, appliance_id, bearer_token }))
}
