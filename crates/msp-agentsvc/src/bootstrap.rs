//! Server bootstrap (spec §4.5, §6.2): load-or-create the CA, then
//! load-or-reissue the server cert — both idempotent, safe to call every
//! boot. The full `ComplianceAgent` service listens on two ports: an
//! mTLS-enforced port for enrolled agents, and a plaintext bootstrap port
//! that only matters for the very first `Register` call before an agent
//! has a pinned certificate (spec §6.2: "first Register is accepted over
//! insecure transport only when needs_certificates=true and no cert is
//! pinned"). Running two listeners keeps that distinction at the
//! transport layer instead of threading an exception into the mTLS
//! handshake itself.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::info;

use msp_proto::agent::compliance_agent_server::ComplianceAgentServer;

use crate::error::AgentSvcError;
use crate::service::{AgentService, CaMaterial};

pub struct Bootstrapped {
    pub ca: Arc<CaMaterial>,
    pub tls_config: ServerTlsConfig,
}

/// Loads or creates the CA and the appliance's own server certificate
/// under `ca_dir`, producing everything `serve` needs for the mTLS
/// listener.
pub fn bootstrap(ca_dir: &Path, appliance_ip: IpAddr) -> Result<Bootstrapped, AgentSvcError> {
    let (ca_issued, ca_cert) = msp_infra::ca::load_or_create_ca(ca_dir)?;
    let server_issued = msp_infra::ca::load_or_create_server_cert(&ca_cert, ca_dir, appliance_ip, Utc::now())?;

    let identity = Identity::from_pem(&server_issued.cert_pem, &server_issued.key_pem);
    let client_ca = Certificate::from_pem(&ca_issued.cert_pem);
    let tls_config = ServerTlsConfig::new()
        .identity(identity)
        .client_ca_root(client_ca)
        .client_auth_optional(false);

    Ok(Bootstrapped {
        ca: Arc::new(CaMaterial {
            ca_cert_pem: ca_issued.cert_pem,
            ca_cert,
        }),
        tls_config,
    })
}

/// Runs the mTLS listener (enrolled agents) and the plaintext bootstrap
/// listener (first-ever `Register` for a brand-new agent) concurrently.
/// Both bind the same `AgentService`, so registry state and the drift
/// route are shared regardless of which port an RPC arrived on.
pub async fn serve(
    mtls_addr: SocketAddr,
    bootstrap_addr: SocketAddr,
    service: AgentService,
    tls_config: ServerTlsConfig,
) -> Result<(), AgentSvcError> {
    let mtls_service = service.clone();
    let mtls_server = Server::builder()
        .tls_config(tls_config)?
        .add_service(ComplianceAgentServer::new(mtls_service))
        .serve(mtls_addr);

    let bootstrap_server = Server::builder()
        .add_service(ComplianceAgentServer::new(service))
        .serve(bootstrap_addr);

    info!(%mtls_addr, %bootstrap_addr, "agent gRPC server listening");
    tokio::try_join!(
        async { mtls_server.await.map_err(AgentSvcError::from) },
        async { bootstrap_server.await.map_err(AgentSvcError::from) },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_idempotent_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let first = bootstrap(dir.path(), ip).unwrap();
        let second = bootstrap(dir.path(), ip).unwrap();
        assert_eq!(first.ca.ca_cert_pem, second.ca.ca_cert_pem);
    }
}
