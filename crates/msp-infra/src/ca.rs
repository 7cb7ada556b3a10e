//! Per-appliance CA and certificate issuance (spec §4.5). The CA is
//! exclusively owned by the appliance that created it; the control plane
//! never sees its private key.

use std::fs;
use std::io;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::RngCore;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SanType,
};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};

#[derive(Debug, Error)]
pub enum CaError {
    #[error("io error at {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("certificate generation failed: {0}")]
    Rcgen(#[from] rcgen::RcgenError),
    #[error("certificate parse failed: {0}")]
    Parse(String),
}

/// A generated certificate/key pair in PEM form, ready to hand to a
/// client over the bootstrap RPC channel (spec §4.5 register flow).
pub struct IssuedCert {
    pub cert_pem: String,
    pub key_pem: String,
}

fn random_serial() -> Vec<u8> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.to_vec()
}

fn write_private(path: &Path, contents: &str) -> Result<(), CaError> {
    fs::write(path, contents).map_err(|source| CaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| CaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Loads the CA from `dir/{ca.crt,ca.key}` if present, otherwise generates
/// a 10-year self-signed P-256 root and persists it. Returns the PEM pair
/// plus a `Certificate` usable as a signer for future issuance.
pub fn load_or_create_ca(dir: &Path) -> Result<(IssuedCert, Certificate), CaError> {
    fs::create_dir_all(dir).map_err(|source| CaError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    #[cfg(unix)]
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|source| CaError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let cert_path = dir.join("ca.crt");
    let key_path = dir.join("ca.key");

    if cert_path.exists() && key_path.exists() {
        let cert_pem = fs::read_to_string(&cert_path).map_err(|source| CaError::Io {
            path: cert_path.display().to_string(),
            source,
        })?;
        let key_pem = fs::read_to_string(&key_path).map_err(|source| CaError::Io {
            path: key_path.display().to_string(),
            source,
        })?;
        let key_pair = KeyPair::from_pem(&key_pem).map_err(|e| CaError::Parse(e.to_string()))?;
        let params = CertificateParams::from_ca_cert_pem(&cert_pem, key_pair)
            .map_err(|e| CaError::Parse(e.to_string()))?;
        let ca_cert = Certificate::from_params(params)?;
        return Ok((IssuedCert { cert_pem, key_pem }, ca_cert));
    }

    let mut params = CertificateParams::new(vec![]);
    params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = OffsetDateTime::now_utc() + TimeDuration::days(365 * 10);
    params.serial_number = Some(random_serial().into());
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "MSP Appliance Root CA");
    params.distinguished_name = dn;

    let ca_cert = Certificate::from_params(params)?;
    let cert_pem = ca_cert.serialize_pem()?;
    let key_pem = ca_cert.serialize_private_key_pem();

    fs::write(&cert_path, &cert_pem).map_err(|source| CaError::Io {
        path: cert_path.display().to_string(),
        source,
    })?;
    write_private(&key_path, &key_pem)?;

    Ok((IssuedCert { cert_pem, key_pem }, ca_cert))
}

/// Issues a 1-year client-auth cert for a Go agent: `CN=agent-{hostname}`,
/// `SAN=DNSName(hostname)`, `EKU=clientAuth` (spec §4.5).
pub fn issue_agent_cert(ca: &Certificate, hostname: &str) -> Result<IssuedCert, CaError> {
    let mut params = CertificateParams::new(vec![hostname.to_string()]);
    params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = OffsetDateTime::now_utc() + TimeDuration::days(365);
    params.serial_number = Some(random_serial().into());
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    params.subject_alt_names = vec![SanType::DnsName(hostname.to_string())];
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, format!("agent-{hostname}"));
    params.distinguished_name = dn;

    let cert = Certificate::from_params(params)?;
    let cert_pem = cert.serialize_pem_with_signer(ca)?;
    let key_pem = cert.serialize_private_key_pem();
    Ok(IssuedCert { cert_pem, key_pem })
}

/// Issues or reuses the appliance's own server cert (`EKU=serverAuth`,
/// `SAN=IPAddress`). Reused if more than 30 days of validity remain. A
/// small sidecar `server.crt.meta` records `not_after` so reuse doesn't
/// require parsing the certificate back out of PEM/DER.
pub fn load_or_create_server_cert(
    ca: &Certificate,
    dir: &Path,
    appliance_ip: std::net::IpAddr,
    now: DateTime<Utc>,
) -> Result<IssuedCert, CaError> {
    let cert_path = dir.join("server.crt");
    let key_path = dir.join("server.key");
    let meta_path = dir.join("server.crt.meta");

    if let Some(not_after) = read_not_after(&meta_path) {
        if cert_path.exists() && key_path.exists() && now + chrono::Duration::days(30) < not_after {
            let cert_pem = fs::read_to_string(&cert_path).map_err(|source| CaError::Io {
                path: cert_path.display().to_string(),
                source,
            })?;
            let key_pem = fs::read_to_string(&key_path).map_err(|source| CaError::Io {
                path: key_path.display().to_string(),
                source,
            })?;
            return Ok(IssuedCert { cert_pem, key_pem });
        }
    }

    let not_after = now + chrono::Duration::days(365);
    let mut params = CertificateParams::new(vec![]);
    params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = OffsetDateTime::now_utc() + TimeDuration::days(365);
    params.serial_number = Some(random_serial().into());
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.subject_alt_names = vec![SanType::IpAddress(appliance_ip)];
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, appliance_ip.to_string());
    params.distinguished_name = dn;

    let cert = Certificate::from_params(params)?;
    let cert_pem = cert.serialize_pem_with_signer(ca)?;
    let key_pem = cert.serialize_private_key_pem();

    fs::write(&cert_path, &cert_pem).map_err(|source| CaError::Io {
        path: cert_path.display().to_string(),
        source,
    })?;
    write_private(&key_path, &key_pem)?;
    fs::write(&meta_path, not_after.to_rfc3339()).map_err(|source| CaError::Io {
        path: meta_path.display().to_string(),
        source,
    })?;

    Ok(IssuedCert { cert_pem, key_pem })
}

fn read_not_after(meta_path: &Path) -> Option<DateTime<Utc>> {
    let contents = fs::read_to_string(meta_path).ok()?;
    DateTime::parse_from_rfc3339(contents.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ca_is_idempotent_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = load_or_create_ca(dir.path()).unwrap();
        let (second, _) = load_or_create_ca(dir.path()).unwrap();
        assert_eq!(first.cert_pem, second.cert_pem);
        assert_eq!(first.key_pem, second.key_pem);
    }

    #[test]
    fn issues_agent_cert_signed_by_ca() {
        let dir = tempfile::tempdir().unwrap();
        let (_, ca_cert) = load_or_create_ca(dir.path()).unwrap();
        let issued = issue_agent_cert(&ca_cert, "WS01").unwrap();
        assert!(issued.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(issued.key_pem.contains("BEGIN"));
    }
}
