//! Domain discovery, host enumeration, and the domain-credential vault
//! (spec §4.6, §6.1). These three endpoints feed `derive_targets`, the
//! function that turns stored credentials into the `windows_targets`/
//! `linux_targets` a checkin response carries.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;

use crate::db::Db;
use crate::error::ControlPlaneError;
use crate::models::{
    DomainCredentialRequest, DomainCredentialsResponse, DomainDiscoveredRequest, DomainDiscoveredResponse, EnumerationResultsRequest, EnumerationResultsResponse,
};
use crate::state::AppState;

/// `POST /api/appliances/domain-discovered` (spec §6.1): `site_id`
/// travels in the body, not the path — this is the one fan-in-style
/// endpoint in the trio that isn't addressed by site.
pub async fn domain_discovered(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DomainDiscoveredRequest>,
) -> Result<Json<DomainDiscoveredResponse>, ControlPlaneError> {
    let conn = state.db.lock().unwrap();
    Db::record_domain(&conn, &req.site_id, &req.domain_name, Utc::now())?;
    Ok(Json(DomainDiscoveredResponse { acknowledged: true }))
}

/// `POST /api/appliances/enumeration-results` (spec §6.1): same
/// body-carried `site_id` convention as `domain_discovered`.
pub async fn enumeration_results(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnumerationResultsRequest>,
) -> Result<Json<EnumerationResultsResponse>, ControlPlaneError> {
    let hosts: Vec<(String, String)> = req.hosts.into_iter().map(|h| (h.hostname, h.platform)).collect();
    let conn = state.db.lock().unwrap();
    let recorded = Db::record_enumerated_hosts(&conn, &req.site_id, &hosts, Utc::now())?;
    Ok(Json(EnumerationResultsResponse { recorded }))
}

/// `POST /api/sites/{id}/domain-credentials`: stores a credential and
/// sets the site's enumeration trigger, so the very next checkin asks
/// the appliance to re-enumerate with the new credential in hand (spec
/// §4.6: "triggered by the server when a domain-credential row was just
/// added").
pub async fn add_credential(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<String>,
    Json(req): Json<DomainCredentialRequest>,
) -> Result<Json<DomainCredentialsResponse>, ControlPlaneError> {
    let now = Utc::now();
    let conn = state.db.lock().unwrap();
    Db::insert_credential(
        &conn,
        &site_id,
        req.hostname.as_deref(),
        &req.credential_type,
        req.port,
        req.username.as_deref(),
        &req.secret,
        req.distro.as_deref(),
        req.expires_at,
        now,
    )?;
    Db::set_triggers(&conn, &site_id, true, false)?;
    let credentials = Db::list_credentials(&conn, &site_id)?;
    Ok(Json(DomainCredentialsResponse { credentials }))
}

pub async fn list_credentials(State(state): State<Arc<AppState>>, Path(site_id): Path<String>) -> Result<Json<DomainCredentialsResponse>, ControlPlaneError> {
    let conn = state.db.lock().unwrap();
    let credentials = Db::list_credentials(&conn, &site_id)?;
    Ok(Json(DomainCredentialsResponse { credentials }))
}
