//! L2 planner client (spec §4.3, §6.3): line-delimited JSON-RPC 2.0 over a
//! persistent Unix-domain socket connection. Requests/responses are
//! matched by a per-connection monotonically increasing `id`; any I/O
//! failure reconnects once, and a second failure bubbles up as an L3
//! escalation per spec §7 ("transport errors bubble up as L3").

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use msp_types::Incident;

use crate::error::HealingError;

/// Mirrors spec §4.3's `LLMDecision` shape exactly.
#[derive(Debug, Clone, Deserialize)]
pub struct L2Decision {
    pub incident_id: uuid::Uuid,
    pub recommended_action: String,
    pub action_params: Value,
    pub confidence: f64,
    pub reasoning: String,
    pub runbook_id: Option<String>,
    pub requires_approval: bool,
    pub escalate_to_l3: bool,
    pub context_used: Option<Value>,
}

impl L2Decision {
    /// `!escalate_to_l3 && !requires_approval && confidence >= 0.6` (spec
    /// §4.3's auto-executable predicate).
    pub fn is_auto_executable(&self) -> bool {
        !self.escalate_to_l3 && !self.requires_approval && self.confidence >= 0.6
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    id: u64,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

struct Conn {
    writer: tokio::net::unix::OwnedWriteHalf,
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
}

pub struct L2Client {
    socket_path: PathBuf,
    next_id: AtomicU64,
    deadline: Duration,
    conn: Mutex<Option<Conn>>,
}

impl L2Client {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            next_id: AtomicU64::new(1),
            deadline: Duration::from_secs(30),
            conn: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<Conn, HealingError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| HealingError::L2Unreachable(e.to_string()))?;
        let (read_half, write_half) = stream.into_split();
        Ok(Conn {
            writer: write_half,
            reader: BufReader::new(read_half),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, HealingError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');

        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }

        let attempt = self.send_and_recv(guard.as_mut().unwrap(), &line, id).await;
        let response = match attempt {
            Ok(v) => v,
            Err(_) => {
                // One reconnect attempt per spec §7 ("2 reconnect attempts
                // per incident before L3" — the caller, not this client,
                // counts the second attempt across two `call` invocations).
                *guard = Some(self.connect().await?);
                self.send_and_recv(guard.as_mut().unwrap(), &line, id).await?
            }
        };

        Ok(response)
    }

    async fn send_and_recv(&self, conn: &mut Conn, line: &[u8], id: u64) -> Result<Value, HealingError> {
        let fut = async {
            conn.writer
                .write_all(line)
                .await
                .map_err(|e| HealingError::L2Unreachable(e.to_string()))?;
            conn.writer
                .flush()
                .await
                .map_err(|e| HealingError::L2Unreachable(e.to_string()))?;

            let mut buf = String::new();
            conn.reader
                .read_line(&mut buf)
                .await
                .map_err(|e| HealingError::L2Unreachable(e.to_string()))?;
            if buf.is_empty() {
                return Err(HealingError::L2Unreachable("connection closed".into()));
            }

            let response: JsonRpcResponse = serde_json::from_str(&buf)?;
            if response.id != id {
                return Err(HealingError::L2Malformed(format!(
                    "response id {} does not match request id {id}",
                    response.id
                )));
            }
            if let Some(err) = response.error {
                return Err(HealingError::L2Malformed(format!("{} ({})", err.message, err.code)));
            }
            response
                .result
                .ok_or_else(|| HealingError::L2Malformed("missing result".into()))
        };

        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| HealingError::L2Unreachable("deadline exceeded".into()))?
    }

    /// `plan(incident) -> LLMDecision` (spec §4.3). A deadline or transport
    /// failure surfaces as `HealingError`; callers treat any error here as
    /// an immediate L3 escalation rather than retrying further.
    pub async fn plan(&self, incident: &Incident) -> Result<L2Decision, HealingError> {
        let params = serde_json::to_value(incident)?;
        let result = self.call("plan", params).await?;
        let decision: L2Decision = serde_json::from_value(result)?;
        Ok(decision)
    }

    /// `health()` liveness probe (spec §6.3).
    pub async fn health(&self) -> Result<bool, HealingError> {
        let result = self.call("health", Value::Null).await?;
        Ok(result.get("ok").and_then(Value::as_bool).unwrap_or(false))
    }
}
