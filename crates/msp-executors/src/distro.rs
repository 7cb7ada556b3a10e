//! Linux distro detection (spec §4.1): probe `/etc/os-release`, then
//! `/etc/redhat-release`, then `/etc/debian_version`, else `"unknown"`.
//! Cached per host since the result never changes within a cycle.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ExecutorError;

/// Anything that can run a one-shot command on a host and return its
/// stdout; satisfied by both the SSH and (for symmetry in tests) a stub
/// transport.
pub trait CommandRunner {
    fn run_probe(&self, command: &str) -> Result<String, ExecutorError>;
}

#[derive(Default)]
pub struct DistroCache {
    cached: Mutex<HashMap<String, String>>,
}

impl DistroCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detect<R: CommandRunner>(&self, host: &str, runner: &R) -> String {
        if let Some(cached) = self.cached.lock().expect("distro cache poisoned").get(host) {
            return cached.clone();
        }

        let distro = Self::probe(runner);
        self.cached
            .lock()
            .expect("distro cache poisoned")
            .insert(host.to_string(), distro.clone());
        distro
    }

    fn probe<R: CommandRunner>(runner: &R) -> String {
        if let Ok(out) = runner.run_probe("cat /etc/os-release 2>/dev/null") {
            if !out.trim().is_empty() {
                return parse_os_release(&out).unwrap_or_else(|| "unknown".to_string());
            }
        }
        if runner.run_probe("cat /etc/redhat-release 2>/dev/null").map(|s| !s.trim().is_empty()).unwrap_or(false) {
            return "rhel".to_string();
        }
        if runner.run_probe("cat /etc/debian_version 2>/dev/null").map(|s| !s.trim().is_empty()).unwrap_or(false) {
            return "debian".to_string();
        }
        "unknown".to_string()
    }
}

fn parse_os_release(contents: &str) -> Option<String> {
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("ID=") {
            return Some(value.trim_matches('"').to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(&'static str);
    impl CommandRunner for Stub {
        fn run_probe(&self, _command: &str) -> Result<String, ExecutorError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn parses_id_from_os_release() {
        let cache = DistroCache::new();
        let runner = Stub("NAME=\"Ubuntu\"\nID=ubuntu\nVERSION_ID=\"22.04\"\n");
        assert_eq!(cache.detect("h1", &runner), "ubuntu");
    }

    #[test]
    fn caches_after_first_probe() {
        let cache = DistroCache::new();
        let runner = Stub("ID=debian\n");
        assert_eq!(cache.detect("h1", &runner), "debian");
        assert_eq!(cache.detect("h1", &runner), "debian");
    }
}
