//! WinRM transport for Windows targets (spec §4.1). WinRM is SOAP over
//! HTTP(S); command execution is a three-step `create shell` /
//! `command` / `receive` exchange against the `wsman` endpoint.
//!
//! NTLM/Kerberos negotiation (the auth scheme real WinRM deployments use)
//! is out of scope for this rebuild — the transport here targets a
//! Basic-auth-over-HTTPS WinRM listener, which is the commonly deployed
//! fallback for this kind of appliance-to-host automation. A production
//! build would swap the auth step behind `WinrmSession::connect` for an
//! NTLM-capable client without touching the rest of the executor.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use msp_types::{Target, WindowsTarget};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::ExecutorError;
use crate::executor::{ExecuteRequest, RemoteExecutor};
use crate::result::{output_hash, ExecutionResult, RemoteOutput};
use crate::script::{self, ScriptDelivery};
use crate::session::SessionCache;

#[derive(Clone)]
pub struct WinrmSession {
    client: reqwest::Client,
    endpoint: String,
    user: String,
    password: String,
    shell_id: String,
}

impl WinrmSession {
    async fn connect(target: &WindowsTarget) -> Result<Self, ExecutorError> {
        let scheme = if target.use_ssl { "https" } else { "http" };
        let endpoint = format!("{scheme}://{}:{}/wsman", target.hostname, target.port);
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(target.use_ssl)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;

        let shell_id = Uuid::new_v4().to_string();
        let envelope = create_shell_envelope(&shell_id);
        let response = client
            .post(&endpoint)
            .basic_auth(&target.user, Some(&target.password))
            .header("Content-Type", "application/soap+xml;charset=UTF-8")
            .body(envelope)
            .send()
            .await
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ExecutorError::Auth);
        }
        if !response.status().is_success() {
            return Err(ExecutorError::Connection(format!("create shell: HTTP {}", response.status())));
        }

        Ok(Self {
            client,
            endpoint,
            user: target.user.clone(),
            password: target.password.clone(),
            shell_id,
        })
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<(String, String, i32), ExecutorError> {
        let command_id = Uuid::new_v4().to_string();
        let envelope = command_envelope(&self.shell_id, &command_id, command);

        let send = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "application/soap+xml;charset=UTF-8")
            .body(envelope);

        let response = tokio::time::timeout(timeout, send.send())
            .await
            .map_err(|_| ExecutorError::Timeout(timeout.as_secs()))?
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ExecutorError::Auth);
        }
        let body = response
            .text()
            .await
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;

        parse_receive_response(&body)
    }
}

fn create_shell_envelope(shell_id: &str) -> String {
    format!(
        "<s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\" xmlns:rsp=\"http://schemas.microsoft.com/wbem/wsman/1/windows/shell\">\
         <s:Header/><s:Body><rsp:Shell ShellId=\"{shell_id}\"><rsp:InputStreams>stdin</rsp:InputStreams>\
         <rsp:OutputStreams>stdout stderr</rsp:OutputStreams></rsp:Shell></s:Body></s:Envelope>"
    )
}

fn command_envelope(shell_id: &str, command_id: &str, command: &str) -> String {
    format!(
        "<s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\" xmlns:rsp=\"http://schemas.microsoft.com/wbem/wsman/1/windows/shell\" xmlns:wsman=\"http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd\">\
         <s:Header><wsman:SelectorSet><wsman:Selector Name=\"ShellId\">{shell_id}</wsman:Selector></wsman:SelectorSet></s:Header>\
         <s:Body><rsp:CommandLine CommandId=\"{command_id}\"><rsp:Command>{}</rsp:Command></rsp:CommandLine>\
         </s:Body></s:Envelope>",
        quick_xml_escape(command),
    )
}

fn quick_xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Extracts stdout/stderr/exit code out of a `Receive` response envelope.
/// Real WinRM streams base64-encoded chunks inside `rsp:Stream` elements
/// and a terminal `rsp:ExitCode`; this walks the element tree rather than
/// regexing the envelope.
fn parse_receive_response(body: &str) -> Result<(String, String, i32), ExecutorError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = 0i32;
    let mut current_stream: Option<String> = None;
    let mut reading_exit_code = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("Stream") {
                    current_stream = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"Name")
                        .map(|a| String::from_utf8_lossy(&a.value).to_string());
                } else if name.ends_with("ExitCode") {
                    reading_exit_code = true;
                    current_stream = None;
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().unwrap_or_default().to_string();
                if reading_exit_code {
                    if let Ok(code) = text.trim().parse::<i32>() {
                        exit_code = code;
                    }
                } else {
                    match current_stream.as_deref() {
                        Some("stdout") => stdout.extend_from_slice(text.as_bytes()),
                        Some("stderr") => stderr.extend_from_slice(text.as_bytes()),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("ExitCode") {
                    reading_exit_code = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExecutorError::Parse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    use base64::{engine::general_purpose::STANDARD, Engine};
    let stdout_decoded = STANDARD
        .decode(&stdout)
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_else(|_| String::from_utf8_lossy(&stdout).to_string());
    let stderr_decoded = STANDARD
        .decode(&stderr)
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_else(|_| String::from_utf8_lossy(&stderr).to_string());

    Ok((stdout_decoded, stderr_decoded, exit_code))
}

pub struct WinrmExecutor {
    sessions: SessionCache<WinrmSession>,
}

impl WinrmExecutor {
    pub fn new() -> Self {
        Self {
            sessions: SessionCache::new(),
        }
    }

    async fn get_or_connect(&self, target: &WindowsTarget) -> Result<WinrmSession, ExecutorError> {
        if let Some(session) = self.sessions.get(&target.hostname) {
            return Ok(session);
        }
        let session = WinrmSession::connect(target).await?;
        self.sessions.insert(&target.hostname, session.clone());
        Ok(session)
    }
}

impl Default for WinrmExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for WinrmExecutor {
    #[instrument(skip(self, req), fields(host = %req.target.hostname()))]
    async fn execute(&self, req: ExecuteRequest) -> ExecutionResult {
        let target = match &req.target {
            Target::Windows(t) => t.clone(),
            Target::Linux(_) => {
                return ExecutionResult {
                    success: false,
                    runbook_id: req.runbook_id,
                    target: req.target.hostname().to_string(),
                    phase: req.phase,
                    output: RemoteOutput::default(),
                    duration_s: 0.0,
                    error: Some("winrm executor received a linux target".to_string()),
                    timestamp: chrono::Utc::now(),
                    output_hash: output_hash("", ""),
                    retry_count: 0,
                    hipaa_controls: req.hipaa_controls,
                    distro: None,
                    exit_code: -1,
                };
            }
        };

        let command = match script::prepare_windows(&req.script) {
            ScriptDelivery::Inline(cmd) => cmd,
            ScriptDelivery::Staged { remote_path, contents_b64 } => format!(
                "powershell -NoProfile -Command \"[IO.File]::WriteAllBytes('{remote_path}', [Convert]::FromBase64String('{contents_b64}')); & '{remote_path}'\""
            ),
        };

        let start = Instant::now();
        let mut retry_count = 0u32;
        let mut last_error: Option<ExecutorError> = None;

        loop {
            let session = match self.get_or_connect(&target).await {
                Ok(s) => s,
                Err(e) => {
                    self.sessions.invalidate(&target.hostname);
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if retryable && retry_count < req.retries {
                        retry_count += 1;
                        tokio::time::sleep(req.retry_delay * retry_count).await;
                        continue;
                    }
                    break;
                }
            };

            match session.run(&command, req.timeout).await {
                Ok((stdout, stderr, exit_code)) => {
                    let success = exit_code == 0;
                    return ExecutionResult {
                        success,
                        runbook_id: req.runbook_id,
                        target: target.hostname.clone(),
                        phase: req.phase,
                        output: RemoteOutput {
                            stdout: stdout.clone(),
                            stderr: stderr.clone(),
                            exit_code,
                            success,
                            parsed: None,
                        },
                        duration_s: start.elapsed().as_secs_f64(),
                        error: if success { None } else { Some(format!("remote exit {exit_code}")) },
                        timestamp: chrono::Utc::now(),
                        output_hash: output_hash(&stdout, &stderr),
                        retry_count,
                        hipaa_controls: req.hipaa_controls,
                        distro: None,
                        exit_code,
                    };
                }
                Err(e) => {
                    if matches!(e, ExecutorError::Connection(_) | ExecutorError::Timeout(_)) {
                        self.sessions.invalidate(&target.hostname);
                    }
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if retryable && retry_count < req.retries {
                        retry_count += 1;
                        tokio::time::sleep(req.retry_delay * retry_count).await;
                        continue;
                    }
                    break;
                }
            }
        }

        let error = last_error.unwrap_or(ExecutorError::Connection("unknown failure".to_string()));
        warn!(error = %error, host = %target.hostname, "winrm execution failed");
        ExecutionResult {
            success: false,
            runbook_id: req.runbook_id,
            target: target.hostname,
            phase: req.phase,
            output: RemoteOutput::default(),
            duration_s: start.elapsed().as_secs_f64(),
            error: Some(error.to_string()),
            timestamp: chrono::Utc::now(),
            output_hash: output_hash("", ""),
            retry_count,
            hipaa_controls: req.hipaa_controls,
            distro: None,
            exit_code: -1,
        }
    }
}
