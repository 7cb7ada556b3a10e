//! C5: Agent CA + gRPC server (spec §4.5, §6.2) — registration and
//! certificate issuance for Go-based compliance agents, the bidirectional
//! drift stream, heartbeat/command-queue draining, and RMM-status intake.

pub mod bootstrap;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod service;

pub use bootstrap::{bootstrap, serve, Bootstrapped};
pub use error::AgentSvcError;
pub use mapping::{immediate_heal_command, to_internal_check_type};
pub use registry::{AgentRegistry, AgentState, DetectedRmm, QueuedCommand};
pub use service::{AgentService, CaMaterial};
