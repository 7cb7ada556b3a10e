//! Ed25519 evidence-signing key lifecycle (spec §4.4). Generated on first
//! boot, persisted as the raw 32-byte seed, never rotated silently.

use std::fs;
use std::io;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("io error at {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("signing key file {path} has {len} bytes, expected 32")]
    BadLength { path: String, len: usize },
}

/// Loads the signing key from `path` if present, otherwise generates a
/// fresh one and persists it (dir mode 0700, key file mode 0600 on unix).
pub fn load_or_create_signing_key(path: &Path) -> Result<SigningKey, KeyError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| KeyError::Io {
            path: parent.display().to_string(),
            source,
        })?;
        #[cfg(unix)]
        fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|source| KeyError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }

    if path.exists() {
        let bytes = fs::read(path).map_err(|source| KeyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| KeyError::BadLength {
            path: path.display().to_string(),
            len: bytes.len(),
        })?;
        return Ok(SigningKey::from_bytes(&seed));
    }

    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let key = SigningKey::from_bytes(&seed);

    fs::write(path, seed).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_persists_then_reloads_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/signing.key");

        let first = load_or_create_signing_key(&path).unwrap();
        let second = load_or_create_signing_key(&path).unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }
}
