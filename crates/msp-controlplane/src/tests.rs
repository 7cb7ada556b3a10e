//! End-to-end coverage of the HTTP surface, exercising the seed scenarios
//! this workspace's control plane must satisfy: checkin dedup, order
//! delivery, drift-to-evidence chaining, and chain-tamper detection.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use tower::ServiceExt;

use msp_types::{CanonicalPayload, CheckEntry, SignedBundle, Summary};

use crate::bundle_store::FsBundleStore;
use crate::db::{self, Db};
use crate::state::AppState;

fn test_state() -> Arc<AppState> {
    let conn = msp_infra::sqlite::open_memory().unwrap();
    db::init(&conn).unwrap();
    let bundle_store = Arc::new(FsBundleStore::new(tempfile::tempdir().unwrap().into_path()));
    let order_signing_key = SigningKey::generate(&mut OsRng);
    Arc::new(AppState::new(conn, bundle_store, order_signing_key, false, 900))
}

fn sign_bundle(site_id: &str, checked_at: chrono::DateTime<Utc>, key: &SigningKey) -> SignedBundle {
    let payload = CanonicalPayload {
        site_id: site_id.to_string(),
        checked_at,
        checks: vec![CheckEntry {
            check: "firewall_status".into(),
            hostname: "ws01".into(),
            status: "pass".into(),
            expected: None,
            actual: None,
            hipaa_control: Some("164.312(c)(1)".into()),
        }],
        summary: Summary {
            total_checks: 1,
            compliant: 1,
            non_compliant: 0,
            scanned_hosts: 1,
        },
    };
    let signed_data = msp_core::canonicalize(&payload).unwrap();
    let signature = key.sign(signed_data.as_bytes());
    SignedBundle {
        payload,
        agent_signature: hex::encode(signature.to_bytes()),
        agent_public_key: hex::encode(key.verifying_key().to_bytes()),
        signed_data,
    }
}

async fn post_json(router: &axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

async fn get_json(router: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn checkin_merges_same_hostname_different_mac() {
    let state = test_state();
    {
        let conn = state.db.lock().unwrap();
        Db::seed_provision_code(&conn, "CODE-1", "acme-hq").unwrap();
    }
    let router = crate::router(state.clone());

    let (status, body) = post_json(
        &router,
        "/api/provision/claim",
        serde_json::json!({"code": "CODE-1", "mac_address": "00:11:22:33:44:55", "hostname": "ws01"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let site_id = body["site_id"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &router,
        "/api/appliances/checkin",
        serde_json::json!({
            "site_id": site_id,
            "hostname": "ws01",
            "mac_address": "00:11:22:33:44:55",
            "ip_addresses": [],
            "has_local_credentials": false,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["merged_duplicates"], 0);

    // A rebuilt appliance reports the same hostname under a new MAC: the
    // original row is expected to be archived, not duplicated.
    let (status, body) = post_json(
        &router,
        "/api/appliances/checkin",
        serde_json::json!({
            "site_id": site_id,
            "hostname": "ws01",
            "mac_address": "aa:bb:cc:dd:ee:ff",
            "ip_addresses": [],
            "has_local_credentials": false,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["merged_duplicates"], 1);
}

#[tokio::test]
async fn pending_order_is_delivered_exactly_once() {
    let state = test_state();
    let site_id = "site-1".to_string();
    let appliance_id = msp_types::appliance_id(&site_id, "00:11:22:33:44:55").unwrap();

    {
        let conn = state.db.lock().unwrap();
        conn.execute("INSERT INTO sites (site_id, slug, archived) VALUES (?1, 'acme', 0)", rusqlite::params![site_id]).unwrap();
    }

    let order = crate::orders::create_order(&state.order_signing_key, msp_types::OrderType::ForceCheckin, serde_json::json!({}), 5, Utc::now(), chrono::Duration::minutes(15));
    {
        let conn = state.db.lock().unwrap();
        Db::insert_order(&conn, &order, &appliance_id).unwrap();
    }

    let router = crate::router(state.clone());
    let (status, body) = post_json(
        &router,
        "/api/appliances/checkin",
        serde_json::json!({
            "site_id": site_id,
            "hostname": "ws01",
            "mac_address": "00:11:22:33:44:55",
            "ip_addresses": [],
            "has_local_credentials": false,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["pending_orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_id"], order.order_id);

    // The same appliance checking in again must not see the order twice
    // (invariant I8, the order nonce ledger).
    let (status, body) = post_json(
        &router,
        "/api/appliances/checkin",
        serde_json::json!({
            "site_id": site_id,
            "hostname": "ws01",
            "mac_address": "00:11:22:33:44:55",
            "ip_addresses": [],
            "has_local_credentials": false,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["pending_orders"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn submitted_bundle_extends_chain_and_verifies() {
    let state = test_state();
    let key = SigningKey::generate(&mut OsRng);
    let site_id = "site-1";
    let router = crate::router(state.clone());

    let bundle_a = sign_bundle(site_id, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(), &key);
    let (status, _) = post_json(&router, &format!("/api/evidence/sites/{site_id}/submit"), serde_json::to_value(&bundle_a).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let bundle_b = sign_bundle(site_id, Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(), &key);
    let (status, body) = post_json(&router, &format!("/api/evidence/sites/{site_id}/submit"), serde_json::to_value(&bundle_b).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chain_position"], 1);

    let (status, body) = get_json(&router, &format!("/api/evidence/sites/{site_id}/verify")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["checked"], 2);
}

#[tokio::test]
async fn tampering_with_a_stored_bundle_breaks_verification() {
    let state = test_state();
    let key = SigningKey::generate(&mut OsRng);
    let site_id = "site-1";
    let router = crate::router(state.clone());

    let bundle_a = sign_bundle(site_id, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(), &key);
    post_json(&router, &format!("/api/evidence/sites/{site_id}/submit"), serde_json::to_value(&bundle_a).unwrap()).await;
    let bundle_b = sign_bundle(site_id, Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(), &key);
    post_json(&router, &format!("/api/evidence/sites/{site_id}/submit"), serde_json::to_value(&bundle_b).unwrap()).await;

    {
        let conn = state.db.lock().unwrap();
        conn.execute(
            "UPDATE evidence_bundles SET payload = 'tampered' WHERE site_id = ?1 AND chain_position = 0",
            rusqlite::params![site_id],
        )
        .unwrap();
    }

    let (status, body) = get_json(&router, &format!("/api/evidence/sites/{site_id}/verify")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["failed_at_position"], 0);
}

#[tokio::test]
async fn evidence_submit_rejects_bad_signature() {
    let state = test_state();
    let key = SigningKey::generate(&mut OsRng);
    let site_id = "site-1";
    let router = crate::router(state.clone());

    let mut bundle = sign_bundle(site_id, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(), &key);
    bundle.signed_data.push('x');

    let (status, _) = post_json(&router, &format!("/api/evidence/sites/{site_id}/submit"), serde_json::to_value(&bundle).unwrap()).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn domain_credential_sets_enumeration_trigger_for_next_checkin() {
    let state = test_state();
    {
        let conn = state.db.lock().unwrap();
        conn.execute("INSERT INTO sites (site_id, slug, archived) VALUES ('site-1', 'acme', 0)", []).unwrap();
        Db::record_enumerated_hosts(&conn, "site-1", &[("dc01".to_string(), "windows".to_string())], Utc::now()).unwrap();
    }
    let router = crate::router(state.clone());

    let (status, _) = post_json(
        &router,
        "/api/sites/site-1/domain-credentials",
        serde_json::json!({"hostname": null, "credential_type": "domain_admin", "port": null, "username": "svc-msp", "secret": "hunter2", "distro": null, "expires_at": null}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &router,
        "/api/appliances/checkin",
        serde_json::json!({
            "site_id": "site-1",
            "hostname": "dc01",
            "mac_address": "00:11:22:33:44:55",
            "ip_addresses": [],
            "has_local_credentials": true,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trigger_enumeration"], true);
    assert_eq!(body["windows_targets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn domain_discovered_and_enumeration_results_carry_site_id_in_body() {
    let state = test_state();
    {
        let conn = state.db.lock().unwrap();
        conn.execute("INSERT INTO sites (site_id, slug, archived) VALUES ('site-1', 'acme', 0)", []).unwrap();
    }
    let router = crate::router(state.clone());

    let (status, body) = post_json(
        &router,
        "/api/appliances/domain-discovered",
        serde_json::json!({"site_id": "site-1", "domain_name": "acme.local"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], true);

    let (status, body) = post_json(
        &router,
        "/api/appliances/enumeration-results",
        serde_json::json!({"site_id": "site-1", "hosts": [{"hostname": "dc01", "platform": "windows"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recorded"], 1);
}
