//! Order signing and creation (spec §3 "MCP Order", §8 scenario 2).
//! Order *issuance* is driven by the operator dashboard in production
//! (out of scope per spec §1); what's in scope is the signing contract an
//! order must satisfy before the checkin fan-in will ever hand it to an
//! appliance, so this module is exercised directly by integration tests
//! standing in for that dashboard.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::Value;
use uuid::Uuid;

use msp_types::{McpOrder, OrderType};

/// The exact bytes signed for an order: every field except `signature`
/// itself, pipe-joined in a fixed order. Not the evidence-bundle
/// canonical JSON (spec §6.5 governs that payload specifically) — orders
/// have their own minimal signed form since they carry no nested arrays.
fn signing_input(
    order_id: &str,
    order_type: OrderType,
    parameters: &Value,
    priority: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    nonce: &str,
) -> String {
    format!(
        "{order_id}|{order_type:?}|{parameters}|{priority}|{}|{}|{nonce}",
        created_at.to_rfc3339(),
        expires_at.to_rfc3339(),
    )
}

/// Builds and signs a new order for `appliance_id`, ready to hand to
/// `Db::insert_order`.
pub fn create_order(
    signing_key: &SigningKey,
    order_type: OrderType,
    parameters: Value,
    priority: i32,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> McpOrder {
    let order_id = Uuid::new_v4().to_string();
    let nonce = Uuid::new_v4().to_string();
    let expires_at = now + ttl;

    let input = signing_input(&order_id, order_type, &parameters, priority, now, expires_at, &nonce);
    let signature = hex::encode(signing_key.sign(input.as_bytes()).to_bytes());

    McpOrder {
        order_id,
        order_type,
        parameters,
        priority,
        created_at: now,
        expires_at,
        nonce,
        signature,
    }
}

/// Verifies an order's signature against `public_key_hex` (the control
/// plane's published order-signing key, spec §6.1
/// `GET /api/evidence/public-key`). The appliance does not currently call
/// this (see `msp-appliance/src/orders.rs`'s doc comment — the control
/// plane is trusted to have already screened what it hands out) but the
/// function is exercised directly to keep the signing scheme honest.
pub fn verify_order(public_key_hex: &str, order: &McpOrder) -> bool {
    let Ok(key_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(key_arr): Result<[u8; 32], _> = key_bytes.try_into() else {
        return false;
    };
    let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(&key_arr) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(&order.signature) else {
        return false;
    };
    let Ok(sig_arr): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&sig_arr);

    let input = signing_input(
        &order.order_id,
        order.order_type,
        &order.parameters,
        order.priority,
        order.created_at,
        order.expires_at,
        &order.nonce,
    );
    use ed25519_dalek::Verifier;
    verifying_key.verify(input.as_bytes(), &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use serde_json::json;

    #[test]
    fn signed_order_verifies_against_published_key() {
        let key = SigningKey::generate(&mut OsRng);
        let order = create_order(&key, OrderType::ForceCheckin, json!({}), 5, Utc::now(), chrono::Duration::minutes(15));

        let public_key_hex = hex::encode(key.verifying_key().to_bytes());
        assert!(verify_order(&public_key_hex, &order));
    }

    #[test]
    fn tampered_priority_fails_verification() {
        let key = SigningKey::generate(&mut OsRng);
        let mut order = create_order(&key, OrderType::ForceCheckin, json!({}), 5, Utc::now(), chrono::Duration::minutes(15));
        order.priority = 9;

        let public_key_hex = hex::encode(key.verifying_key().to_bytes());
        assert!(!verify_order(&public_key_hex, &order));
    }
}
