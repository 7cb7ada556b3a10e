//! SSH transport for Linux targets (spec §4.1). Connection/auth runs on
//! libssh2 via the `ssh2` crate, which is blocking, so every call happens
//! inside `tokio::task::spawn_blocking`.

use std::io::Read;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use msp_types::{LinuxCredential, LinuxTarget, Target};
use tracing::{instrument, warn};

use crate::distro::{CommandRunner, DistroCache};
use crate::error::ExecutorError;
use crate::executor::{ExecuteRequest, RemoteExecutor};
use crate::result::{output_hash, ExecutionResult, RemoteOutput};
use crate::script::{self, ScriptDelivery};
use crate::session::SessionCache;

pub struct SshSession {
    session: ssh2::Session,
}

impl SshSession {
    fn connect(target: &LinuxTarget) -> Result<Self, ExecutorError> {
        let tcp = TcpStream::connect((target.hostname.as_str(), target.port))
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        let mut session = ssh2::Session::new().map_err(|e| ExecutorError::Connection(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| ExecutorError::Connection(e.to_string()))?;

        match &target.credential {
            LinuxCredential::Password { password } => session
                .userauth_password(&target.user, password)
                .map_err(|_| ExecutorError::Auth)?,
            LinuxCredential::PrivateKey { private_key } => {
                // The key material is handed in PEM form; ssh2 wants a
                // path, so it's staged to a throwaway file for the
                // duration of the handshake and removed immediately after.
                let tmp = std::env::temp_dir().join(format!("msp-key-{}", uuid_like()));
                std::fs::write(&tmp, private_key).map_err(|e| ExecutorError::Connection(e.to_string()))?;
                let result = session.userauth_pubkey_file(&target.user, None, &tmp, None);
                let _ = std::fs::remove_file(&tmp);
                result.map_err(|_| ExecutorError::Auth)?;
            }
        }

        if !session.authenticated() {
            return Err(ExecutorError::Auth);
        }

        Ok(Self { session })
    }

    fn run(&self, command: &str, timeout: Duration) -> Result<(String, String, i32), ExecutorError> {
        self.session.set_timeout(timeout.as_millis() as u32);
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        channel
            .exec(command)
            .map_err(|_| ExecutorError::Timeout(timeout.as_secs()))?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        channel.wait_close().map_err(|e| ExecutorError::Connection(e.to_string()))?;
        let exit_code = channel.exit_status().unwrap_or(-1);

        Ok((stdout, stderr, exit_code))
    }
}

fn uuid_like() -> String {
    format!("{:x}", std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos())
}

impl CommandRunner for SshSession {
    fn run_probe(&self, command: &str) -> Result<String, ExecutorError> {
        let (stdout, _, _) = self.run(command, Duration::from_secs(10))?;
        Ok(stdout)
    }
}

pub struct SshExecutor {
    sessions: SessionCache<Arc<Mutex<SshSession>>>,
    distros: DistroCache,
}

impl SshExecutor {
    pub fn new() -> Self {
        Self {
            sessions: SessionCache::new(),
            distros: DistroCache::new(),
        }
    }

    fn get_or_connect(&self, target: &LinuxTarget) -> Result<Arc<Mutex<SshSession>>, ExecutorError> {
        if let Some(session) = self.sessions.get(&target.hostname) {
            return Ok(session);
        }
        let session = Arc::new(Mutex::new(SshSession::connect(target)?));
        self.sessions.insert(&target.hostname, session.clone());
        Ok(session)
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self, req), fields(host = %req.target.hostname()))]
    async fn execute(&self, req: ExecuteRequest) -> ExecutionResult {
        let target = match &req.target {
            Target::Linux(t) => t.clone(),
            Target::Windows(_) => {
                return ExecutionResult {
                    success: false,
                    runbook_id: req.runbook_id,
                    target: req.target.hostname().to_string(),
                    phase: req.phase,
                    output: RemoteOutput::default(),
                    duration_s: 0.0,
                    error: Some("ssh executor received a windows target".to_string()),
                    timestamp: chrono::Utc::now(),
                    output_hash: output_hash("", ""),
                    retry_count: 0,
                    hipaa_controls: req.hipaa_controls,
                    distro: None,
                    exit_code: -1,
                };
            }
        };

        let delivery = script::prepare_linux(&req.script);
        let command = match &delivery {
            ScriptDelivery::Inline(cmd) => cmd.clone(),
            ScriptDelivery::Staged { remote_path, contents_b64 } => format!(
                "echo {contents_b64} | base64 -d > {remote_path} && chmod +x {remote_path} && {sudo}{remote_path}",
                sudo = if req.use_sudo { "sudo " } else { "" }
            ),
        };
        let command = if req.use_sudo && matches!(delivery, ScriptDelivery::Inline(_)) {
            format!("sudo {command}")
        } else {
            command
        };

        let start = Instant::now();
        let mut retry_count = 0u32;
        let mut last_error: Option<ExecutorError> = None;

        loop {
            let session = match self.get_or_connect(&target) {
                Ok(s) => s,
                Err(e) => {
                    self.sessions.invalidate(&target.hostname);
                    last_error = Some(e);
                    if last_error.as_ref().unwrap().is_retryable() && retry_count < req.retries {
                        retry_count += 1;
                        tokio::time::sleep(req.retry_delay * retry_count).await;
                        continue;
                    }
                    break;
                }
            };

            let cmd = command.clone();
            let timeout = req.timeout;
            let session_for_blocking = session.clone();
            let run_result = tokio::task::spawn_blocking(move || {
                let guard = session_for_blocking.lock().expect("ssh session poisoned");
                guard.run(&cmd, timeout)
            })
            .await
            .unwrap_or_else(|e| Err(ExecutorError::Connection(e.to_string())));

            match run_result {
                Ok((stdout, stderr, exit_code)) => {
                    let distro = self.distros.detect(&target.hostname, &*session.lock().expect("ssh session poisoned"));
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
                        distro: Some(distro),
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
        warn!(error = %error, host = %target.hostname, "ssh execution failed");
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
