//! `POST /api/appliances/checkin` (spec §4.6): the single synchronous
//! server-side surface most appliances ever use. Latency target p95 <
//! 150ms — every piece of this handler is a local SQLite transaction,
//! never an outbound call.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use msp_types::appliance_id;

use crate::auth::check_bearer;
use crate::db::Db;
use crate::error::ControlPlaneError;
use crate::models::{CheckinRequest, CheckinResponse};
use crate::state::AppState;

pub async fn checkin(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<CheckinRequest>) -> Result<Json<CheckinResponse>, ControlPlaneError> {
    let now = Utc::now();
    let appliance_id = appliance_id(&req.site_id, &req.mac_address)?;
    let mac = msp_types::normalize_mac(&req.mac_address)?;

    let mut conn = state.db.lock().unwrap();

    let expected_token = Db::lookup_bearer_token(&conn, &req.site_id)?;
    check_bearer(state.require_bearer_auth, &headers, expected_token.as_deref())?;

    let tx = conn.transaction()?;

    let merged_duplicates = Db::upsert_appliance_and_merge(
        &tx,
        &appliance_id,
        &req.site_id,
        &mac,
        &req.hostname,
        &req.ip_addresses,
        req.agent_version.as_deref(),
        req.agent_public_key.as_deref(),
        now,
    )?;

    if let Some(public_key) = &req.agent_public_key {
        Db::register_signing_key_if_absent(&tx, &req.site_id, public_key, now)?;
    }

    let pending_orders = Db::drain_pending_orders(&tx, &appliance_id, now)?;
    let (trigger_enumeration, trigger_immediate_scan) = Db::take_triggers(&tx, &req.site_id)?;

    tx.commit()?;

    let enabled_runbooks = Db::enabled_runbooks(&conn, &req.site_id)?;
    let (windows_targets, linux_targets) = Db::derive_targets(&conn, &req.site_id, now)?;

    Ok(Json(CheckinResponse {
        status: "ok".to_string(),
        appliance_id,
        server_time: now,
        merged_duplicates,
        pending_orders,
        windows_targets,
        linux_targets,
        enabled_runbooks,
        trigger_enumeration,
        trigger_immediate_scan,
    }))
}
