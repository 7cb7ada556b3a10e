//! WORM-bucket stand-in (spec §4.7 "Storage": "Bundles in durable object
//! storage (WORM bucket); metadata + hashes in the SQL database. The
//! database is not the source of truth for bundle bytes."). A real
//! deployment points `BundleStore` at an S3-compatible client; that
//! client is out of scope to implement (spec §1's "Out of scope" list is
//! silent on object storage specifically, but SPEC_FULL.md §2 C7 calls
//! this out as a trait boundary, not a shipped client). The trait is the
//! contract; `FsBundleStore` is the one implementation this workspace
//! ships, mirroring `msp_evidence::stage_bundle`'s on-disk layout.

use std::path::PathBuf;

pub trait BundleStore: Send + Sync {
    fn store(&self, site_id: &str, bundle_id: &str, payload: &str, signature: &str) -> std::io::Result<()>;
}

pub struct FsBundleStore {
    root: PathBuf,
}

impl FsBundleStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn dir(&self, site_id: &str, bundle_id: &str) -> PathBuf {
        self.root.join(site_id).join(bundle_id)
    }
}

impl BundleStore for FsBundleStore {
    fn store(&self, site_id: &str, bundle_id: &str, payload: &str, signature: &str) -> std::io::Result<()> {
        let dir = self.dir(site_id, bundle_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("bundle.json"), payload)?;
        std::fs::write(dir.join("bundle.sig"), signature)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_payload_and_signature_under_site_bundle_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBundleStore::new(dir.path().to_path_buf());
        store.store("site-1", "bundle-1", "{}", "deadbeef").unwrap();

        let bundle_dir = dir.path().join("site-1").join("bundle-1");
        assert_eq!(std::fs::read_to_string(bundle_dir.join("bundle.json")).unwrap(), "{}");
        assert_eq!(std::fs::read_to_string(bundle_dir.join("bundle.sig")).unwrap(), "deadbeef");
    }
}
