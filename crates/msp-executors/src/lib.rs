//! C1 Remote Executors: run short scripts on remote hosts via WinRM
//! (Windows) or SSH (Linux) and return structured results. Failures never
//! propagate as `Err` out of `execute` — they surface inside
//! `ExecutionResult` per spec §7.

mod distro;
mod error;
mod executor;
mod result;
mod script;
mod session;
mod ssh;
mod winrm;

pub use error::ExecutorError;
pub use executor::{ExecuteRequest, Executors, RemoteExecutor};
pub use result::{output_hash, ExecutionResult, RemoteOutput};
pub use ssh::SshExecutor;
pub use winrm::WinrmExecutor;
