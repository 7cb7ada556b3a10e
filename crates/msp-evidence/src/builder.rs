//! Bundle assembly and signing (spec §4.4, §6.5, invariants I4/R1).

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};

use msp_core::canonicalize;
use msp_types::{CanonicalPayload, CheckEntry, SignedBundle, Summary};

use crate::error::EvidenceError;

/// Builds the `CanonicalPayload` for one scan cycle. `checks`/`summary`
/// must already be the full Cartesian-product coverage grid from
/// `msp_scanner::full_coverage` (invariant I2) — this function does not
/// re-derive coverage, only assembles and timestamps the payload.
pub fn build_bundle(site_id: &str, checked_at: DateTime<Utc>, checks: Vec<CheckEntry>, summary: Summary) -> CanonicalPayload {
    CanonicalPayload {
        site_id: site_id.to_string(),
        checked_at,
        checks,
        summary,
    }
}

/// Canonicalizes `payload`, signs the exact canonical bytes with
/// `signing_key`, and returns the wire-ready `SignedBundle` carrying
/// `signed_data` verbatim (spec §4.4: "the bundle sent to the server
/// adds agent_signature, agent_public_key, and signed_data").
pub fn sign_payload(payload: CanonicalPayload, signing_key: &SigningKey) -> Result<SignedBundle, EvidenceError> {
    let signed_data = canonicalize(&payload)?;
    let signature = signing_key.sign(signed_data.as_bytes());
    Ok(SignedBundle {
        payload,
        agent_signature: hex::encode(signature.to_bytes()),
        agent_public_key: hex::encode(signing_key.verifying_key().to_bytes()),
        signed_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ed25519_dalek::{Verifier, VerifyingKey};
    use rand::rngs::OsRng;

    fn sample_payload() -> CanonicalPayload {
        build_bundle(
            "site-1",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![CheckEntry {
                check: "firewall_status".into(),
                hostname: "ws01".into(),
                status: "pass".into(),
                expected: None,
                actual: None,
                hipaa_control: Some("164.312(c)(1)".into()),
            }],
            Summary {
                total_checks: 1,
                compliant: 1,
                non_compliant: 0,
                scanned_hosts: 1,
            },
        )
    }

    #[test]
    fn signature_verifies_over_signed_data() {
        let key = SigningKey::generate(&mut OsRng);
        let bundle = sign_payload(sample_payload(), &key).unwrap();

        let verifying_key: VerifyingKey = key.verifying_key();
        let sig_bytes: [u8; 64] = hex::decode(&bundle.agent_signature).unwrap().try_into().unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        assert!(verifying_key.verify(bundle.signed_data.as_bytes(), &signature).is_ok());
    }

    #[test]
    fn tampering_with_signed_data_invalidates() {
        let key = SigningKey::generate(&mut OsRng);
        let mut bundle = sign_payload(sample_payload(), &key).unwrap();
        bundle.signed_data.push('x');

        let verifying_key: VerifyingKey = key.verifying_key();
        let sig_bytes: [u8; 64] = hex::decode(&bundle.agent_signature).unwrap().try_into().unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        assert!(verifying_key.verify(bundle.signed_data.as_bytes(), &signature).is_err());
    }

    #[test]
    fn re_sign_is_bit_exact() {
        let key = SigningKey::generate(&mut OsRng);
        let a = sign_payload(sample_payload(), &key).unwrap();
        let b = sign_payload(sample_payload(), &key).unwrap();
        assert_eq!(a.agent_signature, b.agent_signature);
        assert_eq!(a.signed_data, b.signed_data);
    }
}
