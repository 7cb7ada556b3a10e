//! C2 Drift Scanner: closed check catalog, concurrent scheduling bounded
//! by a semaphore and a per-cycle budget, and evidence coverage (spec
//! §4.2).

mod catalog;
mod coverage;
mod probe;
mod scheduler;

pub use catalog::{all_checks, find, CheckDef, Platform, LINUX_CHECKS, NETWORK_CHECKS, WINDOWS_CHECKS};
pub use coverage::full_coverage;
pub use probe::{ProbeFn, ProbeTable};
pub use scheduler::{Scanner, ScannerConfig};
