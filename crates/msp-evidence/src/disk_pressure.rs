//! Disk-pressure detection (spec §5: "when disk pressure is reported, the
//! builder switches to summary-only mode"). Uses `sysinfo`, the same
//! crate the teacher pulls in for resource monitoring, rather than
//! hand-rolling a `statvfs` binding.

use std::path::Path;

use sysinfo::Disks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskPressure {
    Normal,
    /// Free space below the configured ratio: subsequent cycles should
    /// stage a summary-only bundle (coverage counts, no per-check detail)
    /// until the queue drains enough to free space.
    SummaryOnly,
}

/// Ratio of free to total bytes on whichever mounted disk best matches
/// `path` (longest mount-point prefix). Returns `1.0` (no pressure) if no
/// disk entry covers the path, which only happens in sandboxed test
/// environments where `sysinfo` can't enumerate real mounts.
pub fn free_space_ratio(path: &Path) -> f64 {
    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(&std::path::Path, f64)> = None;

    for disk in disks.list() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let total = disk.total_space() as f64;
            let ratio = if total == 0.0 {
                1.0
            } else {
                disk.available_space() as f64 / total
            };
            match best {
                Some((current, _)) if current.as_os_str().len() >= mount.as_os_str().len() => {}
                _ => best = Some((mount, ratio)),
            }
        }
    }

    best.map(|(_, ratio)| ratio).unwrap_or(1.0)
}

/// Below 10% free, the builder drops to summary-only mode.
pub fn classify(ratio: f64) -> DiskPressure {
    if ratio < 0.10 {
        DiskPressure::SummaryOnly
    } else {
        DiskPressure::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_threshold() {
        assert_eq!(classify(0.5), DiskPressure::Normal);
        assert_eq!(classify(0.09), DiskPressure::SummaryOnly);
        assert_eq!(classify(0.10), DiskPressure::Normal);
    }
}
