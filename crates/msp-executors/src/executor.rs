use std::time::Duration;

use async_trait::async_trait;
use msp_types::Target;

use crate::result::ExecutionResult;
use crate::ssh::SshExecutor;
use crate::winrm::WinrmExecutor;

/// Everything `execute()` needs, per the public contract of spec §4.1:
/// `execute(target, script, runbook_id, phase, timeout, retries,
/// retry_delay, use_sudo?, hipaa_controls[]) → ExecutionResult`.
pub struct ExecuteRequest {
    pub target: Target,
    pub script: String,
    pub runbook_id: String,
    pub phase: String,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub use_sudo: bool,
    pub hipaa_controls: Vec<String>,
}

/// Narrow capability-set trait (spec §9) implemented once per transport
/// and selected by `Target` variant, rather than a class hierarchy.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, req: ExecuteRequest) -> ExecutionResult;
}

/// Bundles both transports so callers (the scanner, the healing engine)
/// hold one long-lived object across a scan cycle instead of recreating
/// session caches per check.
pub struct Executors {
    winrm: WinrmExecutor,
    ssh: SshExecutor,
}

impl Executors {
    pub fn new() -> Self {
        Self {
            winrm: WinrmExecutor::new(),
            ssh: SshExecutor::new(),
        }
    }

    pub async fn execute(&self, req: ExecuteRequest) -> ExecutionResult {
        match &req.target {
            Target::Windows(_) => self.winrm.execute(req).await,
            Target::Linux(_) => self.ssh.execute(req).await,
        }
    }
}

impl Default for Executors {
    fn default() -> Self {
        Self::new()
    }
}
