use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
    pub parsed: Option<serde_json::Value>,
}

/// What `RemoteExecutor::execute` returns: never an `Err` for a remote
/// failure (spec §7: "they are never thrown out of the scan") — failures
/// surface inside `success`/`error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub runbook_id: String,
    pub target: String,
    pub phase: String,
    pub output: RemoteOutput,
    pub duration_s: f64,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub output_hash: String,
    pub retry_count: u32,
    pub hipaa_controls: Vec<String>,
    pub distro: Option<String>,
    pub exit_code: i32,
}

/// First 16 hex characters of SHA-256 over stdout+stderr, used to dedupe
/// identical remote outputs without keeping the full bytes around.
pub fn output_hash(stdout: &str, stderr: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stdout.as_bytes());
    hasher.update(stderr.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}
