//! C3 Healing Engine: converts drift findings into bounded remediation
//! actions through a three-tier classifier (deterministic rules, LLM
//! planner, human escalation), with circuit breaking, flap suppression,
//! maintenance-window gating, and the L2-to-L1 learning loop (spec §4.3).

mod circuit_registry;
mod engine;
mod error;
mod flap_store;
mod l2_client;
mod l3;
mod learning;
mod rules_store;
mod runbooks;

pub use circuit_registry::CircuitRegistry;
pub use engine::{HealingEngine, HealingOutcome};
pub use error::HealingError;
pub use flap_store::FlapStore;
pub use l2_client::{L2Client, L2Decision};
pub use l3::{Escalation, EscalationChannel, EscalationSink};
pub use learning::{spawn_pipeline, LearningLoop, LoggingSyncNotifier, PatternStats, PatternTelemetry, PromotionCandidate, SyncNotifier};
pub use rules_store::RuleStore;
pub use runbooks::{builtin_runbooks, RunbookCatalog};
