//! Script encoding for remote execution (spec §4.1): base64-wrapped in a
//! single shell invocation to dodge shell quoting and the Windows 8191-char
//! cmd line limit; anything above 2 KB is staged as a temp file first.

use base64::{engine::general_purpose::STANDARD, Engine};

const STAGING_THRESHOLD_BYTES: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptDelivery {
    /// Small enough to inline as a single base64-wrapped command.
    Inline(String),
    /// Too large to inline: write to `remote_path` first, then execute it.
    Staged { remote_path: String, contents_b64: String },
}

pub fn prepare_linux(script: &str) -> ScriptDelivery {
    let b64 = STANDARD.encode(script.as_bytes());
    if script.len() <= STAGING_THRESHOLD_BYTES {
        ScriptDelivery::Inline(format!("echo {b64} | base64 -d | /bin/sh"))
    } else {
        ScriptDelivery::Staged {
            remote_path: "/tmp/.msp-probe.sh".to_string(),
            contents_b64: b64,
        }
    }
}

pub fn prepare_windows(script: &str) -> ScriptDelivery {
    // UTF-16LE is what `powershell -EncodedCommand` expects.
    let utf16: Vec<u8> = script.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    let b64 = STANDARD.encode(&utf16);
    if script.len() <= STAGING_THRESHOLD_BYTES {
        ScriptDelivery::Inline(format!("powershell -NoProfile -EncodedCommand {b64}"))
    } else {
        ScriptDelivery::Staged {
            remote_path: "C:\\Windows\\Temp\\.msp-probe.ps1".to_string(),
            contents_b64: b64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_script_inlines() {
        match prepare_linux("echo hi") {
            ScriptDelivery::Inline(cmd) => assert!(cmd.contains("base64 -d")),
            _ => panic!("expected inline delivery"),
        }
    }

    #[test]
    fn large_script_stages() {
        let big = "a".repeat(STAGING_THRESHOLD_BYTES + 1);
        match prepare_linux(&big) {
            ScriptDelivery::Staged { remote_path, .. } => assert_eq!(remote_path, "/tmp/.msp-probe.sh"),
            _ => panic!("expected staged delivery"),
        }
    }
}
