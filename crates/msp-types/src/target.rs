use serde::{Deserialize, Serialize};

/// A host the appliance probes. Targets are re-derived each checkin from
/// server-side credential rows plus AD-enumeration results and are never
/// persisted on the appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum Target {
    Windows(WindowsTarget),
    Linux(LinuxTarget),
}

impl Target {
    pub fn hostname(&self) -> &str {
        match self {
            Target::Windows(t) => &t.hostname,
            Target::Linux(t) => &t.hostname,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowsTarget {
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub use_ssl: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinuxTarget {
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub credential: LinuxCredential,
    pub distro: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinuxCredential {
    Password { password: String },
    PrivateKey { private_key: String },
}
