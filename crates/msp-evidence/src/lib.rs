//! C4 Evidence Builder: turns a scan cycle into a signed, transport-ready
//! bundle, stages it on disk, and ships it to the control plane with an
//! exponential-backoff offline queue when the network isn't available
//! (spec §4.4).

mod builder;
mod disk_pressure;
mod error;
mod queue;
mod stage;
mod submit;

pub use builder::{build_bundle, sign_payload};
pub use disk_pressure::{classify, free_space_ratio, DiskPressure};
pub use error::EvidenceError;
pub use queue::EvidenceQueue;
pub use stage::{stage_bundle, StagedBundle};
pub use submit::{submit_bundle, SubmitOutcome};
