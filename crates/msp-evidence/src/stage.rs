//! Staging signed bundles to disk (spec §6.4:
//! `evidence/YYYY/MM/DD/<uuid>/{bundle.json,bundle.sig}`).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use msp_types::SignedBundle;
use uuid::Uuid;

use crate::error::EvidenceError;

#[derive(Debug, Clone)]
pub struct StagedBundle {
    pub bundle_id: String,
    pub bundle_path: PathBuf,
    pub signature_path: PathBuf,
}

fn io_err(path: &Path, source: std::io::Error) -> EvidenceError {
    EvidenceError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Writes `bundle.json` (the full `SignedBundle`, not just `signed_data`)
/// and a detached `bundle.sig` containing the hex signature, under a
/// fresh `YYYY/MM/DD/<uuid>/` directory beneath `evidence_dir`.
pub fn stage_bundle(evidence_dir: &Path, bundle: &SignedBundle, now: DateTime<Utc>) -> Result<StagedBundle, EvidenceError> {
    let bundle_id = Uuid::new_v4().to_string();
    let dir = evidence_dir
        .join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
        .join(now.format("%d").to_string())
        .join(&bundle_id);

    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let bundle_path = dir.join("bundle.json");
    let signature_path = dir.join("bundle.sig");

    let json = serde_json::to_string_pretty(bundle)?;
    std::fs::write(&bundle_path, json).map_err(|e| io_err(&bundle_path, e))?;
    std::fs::write(&signature_path, &bundle.agent_signature).map_err(|e| io_err(&signature_path, e))?;

    Ok(StagedBundle {
        bundle_id,
        bundle_path,
        signature_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use msp_types::{CanonicalPayload, Summary};

    fn sample_bundle() -> SignedBundle {
        SignedBundle {
            payload: CanonicalPayload {
                site_id: "site-1".into(),
                checked_at: Utc::now(),
                checks: vec![],
                summary: Summary {
                    total_checks: 0,
                    compliant: 0,
                    non_compliant: 0,
                    scanned_hosts: 0,
                },
            },
            agent_signature: "deadbeef".into(),
            agent_public_key: "cafebabe".into(),
            signed_data: "{}".into(),
        }
    }

    #[test]
    fn stages_under_date_partitioned_directory() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap();
        let staged = stage_bundle(dir.path(), &sample_bundle(), now).unwrap();

        assert!(staged.bundle_path.starts_with(dir.path().join("2026").join("03").join("05")));
        assert!(staged.bundle_path.exists());
        assert!(staged.signature_path.exists());
    }
}
