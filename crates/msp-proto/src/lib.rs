//! Generated `ComplianceAgent` gRPC types (spec §6.2), built from
//! `proto/compliance_agent.proto` via `tonic-build`. Kept as its own crate
//! so both the appliance's server (msp-agentsvc) and any test client can
//! depend on the wire types without pulling in the server implementation.

pub mod agent {
    tonic::include_proto!("msp.agent.v1");
}

pub use agent::compliance_agent_client::ComplianceAgentClient;
pub use agent::compliance_agent_server::{ComplianceAgent, ComplianceAgentServer};
pub use agent::{
    CapabilityTier, DriftAck, DriftEvent, HealCommand, HealingAck, HealingResult,
    HeartbeatRequest, HeartbeatResponse, RmmAck, RmmAgent, RmmStatusReport, RegisterRequest,
    RegisterResponse,
};
