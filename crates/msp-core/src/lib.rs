//! Pure logic shared by the appliance and control plane: canonical JSON
//! encoding, pattern signatures, L1 rule matching, and the circuit-breaker
//! / flap-suppression / maintenance-window state machines. Nothing in
//! this crate performs I/O; callers in msp-healing and msp-evidence own
//! persistence and wire up these state machines around SQLite tables.

mod canonical;
mod circuit;
mod error;
mod flap;
mod maintenance;
mod pattern;
mod rules;

pub use canonical::canonicalize;
pub use circuit::CircuitBreaker;
pub use error::{CoreError, ErrorKind};
pub use flap::{FlapOutcome, FlapState};
pub use maintenance::MaintenanceWindow;
pub use pattern::pattern_signature;
pub use rules::{find_match, rule_matches};
