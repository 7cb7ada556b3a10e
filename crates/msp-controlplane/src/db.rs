//! SQLite-backed store for every table the control plane owns (spec §3
//! "Ownership & lifetimes": "Central control plane owns the authoritative
//! Site/Appliance registry, credential vault, runbook catalog, and
//! evidence chain"). One `rusqlite::Connection`, one writer at a time
//! (spec §5: "Control-plane DB: single source of truth ... per-site
//! writes of evidence are serialized"); callers hold `AppState::db`
//! locked only for the duration of a transaction, never across an
//! `.await`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use msp_types::{LinuxCredential, LinuxTarget, McpOrder, OrderType, WindowsTarget};

use crate::error::ControlPlaneError;

/// The all-zero hash that seeds every site's evidence chain (spec §3,
/// invariant I3: `prev_hash[0] = 0x00*32`), the same length as a SHA-256
/// hex digest.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";


/// Runbook ids a freshly claimed site is enabled for by default, mirroring
/// `msp_healing::runbooks::builtin_runbooks` ids (the control plane does
/// not depend on msp-healing; it only ever hands appliances a runbook id
/// list, never the runbook bodies).
const DEFAULT_ENABLED_RUNBOOKS: &[&str] = &[
    "RB-WIN-FIREWALL-001",
    "RB-WIN-DEFENDER-001",
    "RB-WIN-BITLOCKER-001",
    "RB-WIN-SCREENLOCK-001",
    "RB-WIN-SMB1-001",
    "RB-WIN-GUEST-001",
    "RB-LINUX-FIREWALL-001",
    "RB-LINUX-SSHCFG-001",
    "RB-LINUX-UNATTENDED-001",
];

pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS provision_codes (
            code TEXT PRIMARY KEY,
            site_slug TEXT NOT NULL,
            claimed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS sites (
            site_id TEXT PRIMARY KEY,
            slug TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            bearer_token TEXT,
            trigger_enumeration INTEGER NOT NULL DEFAULT 0,
            trigger_immediate_scan INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS appliances (
            id TEXT PRIMARY KEY,
            site_id TEXT NOT NULL,
            mac TEXT NOT NULL,
            hostname TEXT,
            ip_addresses TEXT NOT NULL DEFAULT '[]',
            agent_version TEXT,
            agent_public_key TEXT,
            last_checkin TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS site_signing_keys (
            site_id TEXT PRIMARY KEY,
            public_key TEXT NOT NULL,
            registered_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS key_rotation_windows (
            site_id TEXT PRIMARY KEY,
            new_public_key TEXT NOT NULL,
            remaining_bundles INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS site_runbooks (
            site_id TEXT NOT NULL,
            runbook_id TEXT NOT NULL,
            PRIMARY KEY (site_id, runbook_id)
        );

        CREATE TABLE IF NOT EXISTS orders (
            order_id TEXT PRIMARY KEY,
            appliance_id TEXT NOT NULL,
            order_type TEXT NOT NULL,
            parameters TEXT NOT NULL,
            priority INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            nonce TEXT NOT NULL,
            signature TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            delivered_at TEXT
        );

        CREATE TABLE IF NOT EXISTS order_nonces (
            appliance_id TEXT NOT NULL,
            nonce TEXT NOT NULL,
            PRIMARY KEY (appliance_id, nonce)
        );

        CREATE TABLE IF NOT EXISTS site_credentials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id TEXT NOT NULL,
            hostname TEXT NOT NULL,
            credential_type TEXT NOT NULL,
            port INTEGER,
            username TEXT,
            secret TEXT NOT NULL,
            distro TEXT,
            created_at TEXT NOT NULL,
            expires_at TEXT
        );

        CREATE TABLE IF NOT EXISTS enumerated_hosts (
            site_id TEXT NOT NULL,
            hostname TEXT NOT NULL,
            platform TEXT NOT NULL,
            discovered_at TEXT NOT NULL,
            PRIMARY KEY (site_id, hostname)
        );

        CREATE TABLE IF NOT EXISTS domains (
            site_id TEXT NOT NULL,
            domain_name TEXT NOT NULL,
            discovered_at TEXT NOT NULL,
            PRIMARY KEY (site_id, domain_name)
        );

        CREATE TABLE IF NOT EXISTS evidence_bundles (
            bundle_id TEXT PRIMARY KEY,
            site_id TEXT NOT NULL,
            checked_at TEXT NOT NULL,
            payload TEXT NOT NULL,
            signature TEXT NOT NULL,
            public_key TEXT NOT NULL,
            chain_position INTEGER NOT NULL,
            prev_hash TEXT NOT NULL,
            current_hash TEXT NOT NULL,
            received_at TEXT NOT NULL,
            UNIQUE (site_id, chain_position)
        );
        ",
    )
}

fn windows_credential(credential_type: &str) -> bool {
    matches!(credential_type, "winrm" | "domain_admin" | "service_account" | "local_admin")
}

fn linux_credential(credential_type: &str) -> bool {
    matches!(credential_type, "ssh_key" | "linux_password")
}

/// One row returned by the "latest unexpired credential per hostname"
/// query, already platform-tagged.
struct CredentialRow {
    hostname: String,
    credential_type: String,
    port: Option<u16>,
    username: Option<String>,
    secret: String,
    distro: Option<String>,
}

pub struct Db;

impl Db {
    /// Seeds a one-time provisioning code. Code *generation* is an
    /// operator-dashboard concern (out of scope, spec §1); this is the
    /// store-side half of the contract the claim endpoint consumes, and
    /// the hook integration tests use to set up a claimable code.
    pub fn seed_provision_code(conn: &Connection, code: &str, site_slug: &str) -> Result<(), ControlPlaneError> {
        conn.execute(
            "INSERT INTO provision_codes (code, site_slug, claimed_at) VALUES (?1, ?2, NULL)",
            params![code, site_slug],
        )?;
        Ok(())
    }

    /// Claims `code`: creates the site (if the code is fresh), the initial
    /// appliance row, and a freshly generated bearer token stored on the
    /// site (spec §3: "A Site owns exactly one logical appliance ...
    /// identity persists" — the bearer token is therefore site-scoped, not
    /// appliance-scoped, so it survives hardware replacement).
    pub fn claim_provision_code(
        conn: &mut Connection,
        code: &str,
        mac_address: &str,
        hostname: &str,
        now: DateTime<Utc>,
        bearer_token: &str,
    ) -> Result<(String, String), ControlPlaneError> {
        let tx = conn.transaction()?;

        let site_slug: Option<String> = tx
            .query_row(
                "SELECT site_slug FROM provision_codes WHERE code = ?1 AND claimed_at IS NULL",
                params![code],
                |r| r.get(0),
            )
            .optional()?;
        let site_slug = site_slug.ok_or_else(|| ControlPlaneError::NotFound(format!("provision code {code}")))?;

        let site_id = uuid::Uuid::new_v4().to_string();
        let mac = msp_types::normalize_mac(mac_address)?;
        let appliance_id = msp_types::appliance_id(&site_id, mac_address)?;

        tx.execute(
            "UPDATE provision_codes SET claimed_at = ?1 WHERE code = ?2",
            params![now.to_rfc3339(), code],
        )?;
        tx.execute(
            "INSERT INTO sites (site_id, slug, archived, bearer_token) VALUES (?1, ?2, 0, ?3)",
            params![site_id, site_slug, bearer_token],
        )?;
        tx.execute(
            "INSERT INTO appliances (id, site_id, mac, hostname, last_checkin) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![appliance_id, site_id, mac, hostname, now.to_rfc3339()],
        )?;
        for runbook_id in DEFAULT_ENABLED_RUNBOOKS {
            tx.execute(
                "INSERT OR IGNORE INTO site_runbooks (site_id, runbook_id) VALUES (?1, ?2)",
                params![site_id, runbook_id],
            )?;
        }

        tx.commit()?;
        Ok((site_id, appliance_id))
    }

    pub fn lookup_bearer_token(conn: &Connection, site_id: &str) -> Result<Option<String>, ControlPlaneError> {
        Ok(conn
            .query_row("SELECT bearer_token FROM sites WHERE site_id = ?1", params![site_id], |r| r.get(0))
            .optional()?)
    }

    /// Upserts the appliance row for `appliance_id`, merges any other
    /// non-archived appliance row in the same site sharing `hostname`
    /// into this one (spec §4.6 "Dedup/merge"; see DESIGN.md for why
    /// hostname, not MAC, is the merge key — appliance id already derives
    /// deterministically from MAC, so two rows can only be "duplicates of
    /// each other" if they describe the same physical box reporting under
    /// a different MAC, which is exactly what a changed/rebuilt appliance
    /// looks like, and hostname is the only other stable signal available)
    /// and returns the number of rows merged.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_appliance_and_merge(
        tx: &rusqlite::Transaction,
        appliance_id: &str,
        site_id: &str,
        mac: &str,
        hostname: &str,
        ip_addresses: &[String],
        agent_version: Option<&str>,
        agent_public_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<u32, ControlPlaneError> {
        let ip_json = serde_json::to_string(ip_addresses)?;

        tx.execute(
            "INSERT INTO appliances (id, site_id, mac, hostname, ip_addresses, agent_version, agent_public_key, last_checkin, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
             ON CONFLICT(id) DO UPDATE SET
                hostname = excluded.hostname,
                ip_addresses = excluded.ip_addresses,
                agent_version = COALESCE(excluded.agent_version, appliances.agent_version),
                agent_public_key = COALESCE(excluded.agent_public_key, appliances.agent_public_key),
                last_checkin = excluded.last_checkin,
                archived = 0",
            params![appliance_id, site_id, mac, hostname, ip_json, agent_version, agent_public_key, now.to_rfc3339()],
        )?;

        let merged = tx.execute(
            "UPDATE appliances SET archived = 1
             WHERE site_id = ?1 AND hostname = ?2 AND id != ?3 AND archived = 0",
            params![site_id, hostname, appliance_id],
        )?;
        Ok(merged as u32)
    }

    /// Registers `public_key` as the site's evidence-signing key if none
    /// is registered yet (spec §4.4: "registered at first checkin").
    /// Already-registered sites are left untouched — rotation goes
    /// through `begin_key_rotation`, never a silent overwrite here.
    pub fn register_signing_key_if_absent(tx: &rusqlite::Transaction, site_id: &str, public_key: &str, now: DateTime<Utc>) -> Result<(), ControlPlaneError> {
        tx.execute(
            "INSERT OR IGNORE INTO site_signing_keys (site_id, public_key, registered_at) VALUES (?1, ?2, ?3)",
            params![site_id, public_key, now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn registered_signing_key(conn: &Connection, site_id: &str) -> Result<Option<String>, ControlPlaneError> {
        Ok(conn
            .query_row("SELECT public_key FROM site_signing_keys WHERE site_id = ?1", params![site_id], |r| r.get(0))
            .optional()?)
    }

    /// Opens a two-bundle overlap window during which both the old and
    /// `new_public_key` are accepted for `site_id` (spec §4.4: "a rotation
    /// requires a signed order and a two-bundle overlap window"). Order
    /// issuance/verification of the rotation request itself is out of
    /// this store's scope; this is the bookkeeping half.
    pub fn begin_key_rotation(conn: &Connection, site_id: &str, new_public_key: &str) -> Result<(), ControlPlaneError> {
        conn.execute(
            "INSERT INTO key_rotation_windows (site_id, new_public_key, remaining_bundles) VALUES (?1, ?2, 2)
             ON CONFLICT(site_id) DO UPDATE SET new_public_key = excluded.new_public_key, remaining_bundles = 2",
            params![site_id, new_public_key],
        )?;
        Ok(())
    }

    /// Consumes one unit of an open rotation window for `public_key` if
    /// one exists, promoting `public_key` to the registered key once the
    /// window is exhausted. Returns `true` if `public_key` was accepted
    /// via the rotation window (the caller still must have already
    /// confirmed the registered key didn't match).
    pub fn consume_rotation_window(tx: &rusqlite::Transaction, site_id: &str, public_key: &str, now: DateTime<Utc>) -> Result<bool, ControlPlaneError> {
        let row: Option<(String, i64)> = tx
            .query_row(
                "SELECT new_public_key, remaining_bundles FROM key_rotation_windows WHERE site_id = ?1",
                params![site_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let Some((window_key, remaining)) = row else {
            return Ok(false);
        };
        if window_key != public_key {
            return Ok(false);
        }

        if remaining <= 1 {
            tx.execute("DELETE FROM key_rotation_windows WHERE site_id = ?1", params![site_id])?;
            tx.execute(
                "INSERT INTO site_signing_keys (site_id, public_key, registered_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(site_id) DO UPDATE SET public_key = excluded.public_key, registered_at = excluded.registered_at",
                params![site_id, public_key, now.to_rfc3339()],
            )?;
        } else {
            tx.execute(
                "UPDATE key_rotation_windows SET remaining_bundles = remaining_bundles - 1 WHERE site_id = ?1",
                params![site_id],
            )?;
        }
        Ok(true)
    }

    /// Marks expired pending orders `expired`, returns the still-pending,
    /// non-expired orders for `appliance_id` in priority-then-age order,
    /// and in the same transaction runs each through the nonce ledger
    /// (spec's supplemental "Order nonce ledger" + invariant I8): a nonce
    /// already seen for this appliance drops that order from the
    /// response without marking it delivered (a bug elsewhere produced a
    /// reused nonce; the safe response is to withhold, not to re-deliver).
    pub fn drain_pending_orders(tx: &rusqlite::Transaction, appliance_id: &str, now: DateTime<Utc>) -> Result<Vec<McpOrder>, ControlPlaneError> {
        tx.execute(
            "UPDATE orders SET status = 'expired' WHERE appliance_id = ?1 AND status = 'pending' AND expires_at <= ?2",
            params![appliance_id, now.to_rfc3339()],
        )?;

        let mut stmt = tx.prepare(
            "SELECT order_id, order_type, parameters, priority, created_at, expires_at, nonce, signature
             FROM orders WHERE appliance_id = ?1 AND status = 'pending'
             ORDER BY priority DESC, created_at ASC",
        )?;
        let candidates: Vec<McpOrder> = stmt
            .query_map(params![appliance_id], |row| {
                let order_type: String = row.get(1)?;
                let parameters: String = row.get(2)?;
                let created_at: String = row.get(4)?;
                let expires_at: String = row.get(5)?;
                Ok((
                    row.get::<_, String>(0)?,
                    order_type,
                    parameters,
                    row.get::<_, i32>(3)?,
                    created_at,
                    expires_at,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(order_id, order_type, parameters, priority, created_at, expires_at, nonce, signature)| {
                Some(McpOrder {
                    order_id,
                    order_type: parse_order_type(&order_type)?,
                    parameters: serde_json::from_str(&parameters).ok()?,
                    priority,
                    created_at: DateTime::parse_from_rfc3339(&created_at).ok()?.with_timezone(&Utc),
                    expires_at: DateTime::parse_from_rfc3339(&expires_at).ok()?.with_timezone(&Utc),
                    nonce,
                    signature,
                })
            })
            .collect();

        let mut delivered = Vec::with_capacity(candidates.len());
        for order in candidates {
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO order_nonces (appliance_id, nonce) VALUES (?1, ?2)",
                    params![appliance_id, order.nonce],
                )?;
            if inserted == 0 {
                tracing::warn!(order_id = %order.order_id, appliance_id = %appliance_id, "order nonce already seen, withholding from delivery");
                continue;
            }
            tx.execute(
                "UPDATE orders SET status = 'delivered', delivered_at = ?1 WHERE order_id = ?2",
                params![now.to_rfc3339(), order.order_id],
            )?;
            delivered.push(order);
        }
        Ok(delivered)
    }

    /// Inserts a new signed order for `appliance_id`. Order *creation* is
    /// driven by the operator dashboard in production (out of scope);
    /// this is the store-side primitive that a dashboard, or an
    /// integration test exercising §8 scenario 2, calls directly.
    pub fn insert_order(conn: &Connection, order: &McpOrder, appliance_id: &str) -> Result<(), ControlPlaneError> {
        conn.execute(
            "INSERT INTO orders (order_id, appliance_id, order_type, parameters, priority, created_at, expires_at, nonce, signature, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending')",
            params![
                order.order_id,
                appliance_id,
                order_type_str(order.order_type),
                serde_json::to_string(&order.parameters)?,
                order.priority,
                order.created_at.to_rfc3339(),
                order.expires_at.to_rfc3339(),
                order.nonce,
                order.signature,
            ],
        )?;
        Ok(())
    }

    pub fn enabled_runbooks(conn: &Connection, site_id: &str) -> Result<Vec<String>, ControlPlaneError> {
        let mut stmt = conn.prepare("SELECT runbook_id FROM site_runbooks WHERE site_id = ?1 ORDER BY runbook_id")?;
        let rows = stmt.query_map(params![site_id], |r| r.get(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Single-shot trigger flags (spec §4.6: "cleared as part of this same
    /// response delivery"): read-then-clear within the caller's
    /// transaction.
    pub fn take_triggers(tx: &rusqlite::Transaction, site_id: &str) -> Result<(bool, bool), ControlPlaneError> {
        let row: Option<(bool, bool)> = tx
            .query_row(
                "SELECT trigger_enumeration, trigger_immediate_scan FROM sites WHERE site_id = ?1",
                params![site_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let (enumeration, scan) = row.unwrap_or((false, false));
        if enumeration || scan {
            tx.execute(
                "UPDATE sites SET trigger_enumeration = 0, trigger_immediate_scan = 0 WHERE site_id = ?1",
                params![site_id],
            )?;
        }
        Ok((enumeration, scan))
    }

    pub fn set_triggers(conn: &Connection, site_id: &str, enumeration: bool, scan: bool) -> Result<(), ControlPlaneError> {
        conn.execute(
            "UPDATE sites SET trigger_enumeration = trigger_enumeration OR ?2, trigger_immediate_scan = trigger_immediate_scan OR ?3 WHERE site_id = ?1",
            params![site_id, enumeration, scan],
        )?;
        Ok(())
    }

    pub fn record_domain(conn: &Connection, site_id: &str, domain_name: &str, now: DateTime<Utc>) -> Result<(), ControlPlaneError> {
        conn.execute(
            "INSERT OR REPLACE INTO domains (site_id, domain_name, discovered_at) VALUES (?1, ?2, ?3)",
            params![site_id, domain_name, now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn record_enumerated_hosts(conn: &Connection, site_id: &str, hosts: &[(String, String)], now: DateTime<Utc>) -> Result<usize, ControlPlaneError> {
        let mut count = 0;
        for (hostname, platform) in hosts {
            conn.execute(
                "INSERT OR REPLACE INTO enumerated_hosts (site_id, hostname, platform, discovered_at) VALUES (?1, ?2, ?3, ?4)",
                params![site_id, hostname, platform, now.to_rfc3339()],
            )?;
            count += 1;
        }
        Ok(count)
    }

    /// Inserts a credential row. When `hostname` is `None`, fans out to
    /// every enumerated host of the matching platform (spec §4.6:
    /// "Windows targets derive from site_credentials rows ... Linux
    /// from ..."); whoever is calling determines `expires_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_credential(
        conn: &Connection,
        site_id: &str,
        hostname: Option<&str>,
        credential_type: &str,
        port: Option<u16>,
        username: Option<&str>,
        secret: &str,
        distro: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ControlPlaneError> {
        let platform = if windows_credential(credential_type) {
            "windows"
        } else if linux_credential(credential_type) {
            "linux"
        } else {
            return Err(ControlPlaneError::BadRequest(format!("unknown credential_type {credential_type}")));
        };

        let hostnames: Vec<String> = match hostname {
            Some(h) => vec![h.to_string()],
            None => {
                let mut stmt = conn.prepare("SELECT hostname FROM enumerated_hosts WHERE site_id = ?1 AND platform = ?2")?;
                stmt.query_map(params![site_id, platform], |r| r.get(0))?.collect::<Result<Vec<_>, _>>()?
            }
        };

        for host in &hostnames {
            conn.execute(
                "INSERT INTO site_credentials (site_id, hostname, credential_type, port, username, secret, distro, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    site_id,
                    host,
                    credential_type,
                    port,
                    username,
                    secret,
                    distro,
                    now.to_rfc3339(),
                    expires_at.map(|e| e.to_rfc3339())
                ],
            )?;
        }
        Ok(hostnames)
    }

    pub fn list_credentials(conn: &Connection, site_id: &str) -> Result<Vec<crate::models::DomainCredentialSummary>, ControlPlaneError> {
        let mut stmt = conn.prepare(
            "SELECT hostname, credential_type, port, username, distro, created_at, expires_at
             FROM site_credentials WHERE site_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![site_id], |r| {
                let created_at: String = r.get(5)?;
                let expires_at: Option<String> = r.get(6)?;
                Ok(crate::models::DomainCredentialSummary {
                    hostname: r.get(0)?,
                    credential_type: r.get(1)?,
                    port: r.get(2)?,
                    username: r.get(3)?,
                    distro: r.get(4)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at).unwrap().with_timezone(&Utc),
                    expires_at: expires_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The latest unexpired row per `(hostname, credential_type group)`,
    /// split into Windows and Linux targets (spec §4.6: "Only the latest
    /// unexpired row per host is returned").
    pub fn derive_targets(conn: &Connection, site_id: &str, now: DateTime<Utc>) -> Result<(Vec<WindowsTarget>, Vec<LinuxTarget>), ControlPlaneError> {
        let mut stmt = conn.prepare(
            "SELECT hostname, credential_type, port, username, secret, distro
             FROM site_credentials c
             WHERE site_id = ?1
               AND (expires_at IS NULL OR expires_at > ?2)
               AND created_at = (
                   SELECT MAX(created_at) FROM site_credentials c2
                   WHERE c2.site_id = c.site_id AND c2.hostname = c.hostname
                     AND (c2.expires_at IS NULL OR c2.expires_at > ?2)
               )",
        )?;
        let rows: Vec<CredentialRow> = stmt
            .query_map(params![site_id, now.to_rfc3339()], |r| {
                Ok(CredentialRow {
                    hostname: r.get(0)?,
                    credential_type: r.get(1)?,
                    port: r.get::<_, Option<i64>>(2)?.map(|p| p as u16),
                    username: r.get(3)?,
                    secret: r.get(4)?,
                    distro: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut windows = Vec::new();
        let mut linux = Vec::new();
        for row in rows {
            if windows_credential(&row.credential_type) {
                let port = row.port.unwrap_or(5986);
                windows.push(WindowsTarget {
                    hostname: row.hostname,
                    port,
                    user: row.username.unwrap_or_default(),
                    password: row.secret,
                    use_ssl: port == 5986,
                });
            } else if linux_credential(&row.credential_type) {
                let credential = if row.credential_type == "ssh_key" {
                    LinuxCredential::PrivateKey { private_key: row.secret }
                } else {
                    LinuxCredential::Password { password: row.secret }
                };
                linux.push(LinuxTarget {
                    hostname: row.hostname,
                    port: row.port.unwrap_or(22),
                    user: row.username.unwrap_or_default(),
                    credential,
                    distro: row.distro,
                });
            }
        }
        Ok((windows, linux))
    }

    /// Verifies and appends a bundle to `site_id`'s hash chain (spec
    /// §4.7 "Submit semantics" steps 3-5). Caller has already verified
    /// the Ed25519 signature and the public-key match (steps 1-2) —
    /// this only computes `current_hash`, looks up the chain tail, and
    /// inserts.
    pub fn append_bundle(
        tx: &rusqlite::Transaction,
        bundle_id: &str,
        site_id: &str,
        checked_at: DateTime<Utc>,
        payload: &str,
        signature: &str,
        public_key: &str,
        current_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, String), ControlPlaneError> {
        let tail: Option<(i64, String)> = tx
            .query_row(
                "SELECT chain_position, current_hash FROM evidence_bundles WHERE site_id = ?1 ORDER BY chain_position DESC LIMIT 1",
                params![site_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let (chain_position, prev_hash) = match tail {
            Some((pos, hash)) => (pos + 1, hash),
            None => (0, ZERO_HASH.to_string()),
        };

        tx.execute(
            "INSERT INTO evidence_bundles (bundle_id, site_id, checked_at, payload, signature, public_key, chain_position, prev_hash, current_hash, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                bundle_id,
                site_id,
                checked_at.to_rfc3339(),
                payload,
                signature,
                public_key,
                chain_position,
                prev_hash,
                current_hash,
                now.to_rfc3339()
            ],
        )?;
        Ok((chain_position, prev_hash))
    }

    pub fn chain_for_site(conn: &Connection, site_id: &str) -> Result<Vec<(i64, String, String, String)>, ControlPlaneError> {
        let mut stmt = conn.prepare(
            "SELECT chain_position, prev_hash, current_hash, payload FROM evidence_bundles WHERE site_id = ?1 ORDER BY chain_position ASC",
        )?;
        let rows = stmt
            .query_map(params![site_id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_bundles(conn: &Connection, site_id: &str) -> Result<Vec<crate::models::BundleSummary>, ControlPlaneError> {
        let mut stmt = conn.prepare(
            "SELECT bundle_id, checked_at, chain_position, received_at FROM evidence_bundles WHERE site_id = ?1 ORDER BY chain_position ASC",
        )?;
        let rows = stmt
            .query_map(params![site_id], |r| {
                let checked_at: String = r.get(1)?;
                let received_at: String = r.get(3)?;
                Ok(crate::models::BundleSummary {
                    bundle_id: r.get(0)?,
                    checked_at: DateTime::parse_from_rfc3339(&checked_at).unwrap().with_timezone(&Utc),
                    chain_position: r.get(2)?,
                    received_at: DateTime::parse_from_rfc3339(&received_at).unwrap().with_timezone(&Utc),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn order_type_str(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::ForceCheckin => "force_checkin",
        OrderType::RunDrift => "run_drift",
        OrderType::SyncRules => "sync_rules",
        OrderType::RestartAgent => "restart_agent",
        OrderType::NixosRebuild => "nixos_rebuild",
        OrderType::UpdateAgent => "update_agent",
        OrderType::UpdateIso => "update_iso",
        OrderType::ViewLogs => "view_logs",
        OrderType::Diagnostic => "diagnostic",
        OrderType::DeploySensor => "deploy_sensor",
        OrderType::RemoveSensor => "remove_sensor",
        OrderType::DeployLinuxSensor => "deploy_linux_sensor",
        OrderType::RemoveLinuxSensor => "remove_linux_sensor",
        OrderType::SensorStatus => "sensor_status",
        OrderType::UpdateCredentials => "update_credentials",
    }
}

fn parse_order_type(s: &str) -> Option<OrderType> {
    Some(match s {
        "force_checkin" => OrderType::ForceCheckin,
        "run_drift" => OrderType::RunDrift,
        "sync_rules" => OrderType::SyncRules,
        "restart_agent" => OrderType::RestartAgent,
        "nixos_rebuild" => OrderType::NixosRebuild,
        "update_agent" => OrderType::UpdateAgent,
        "update_iso" => OrderType::UpdateIso,
        "view_logs" => OrderType::ViewLogs,
        "diagnostic" => OrderType::Diagnostic,
        "deploy_sensor" => OrderType::DeploySensor,
        "remove_sensor" => OrderType::RemoveSensor,
        "deploy_linux_sensor" => OrderType::DeployLinuxSensor,
        "remove_linux_sensor" => OrderType::RemoveLinuxSensor,
        "sensor_status" => OrderType::SensorStatus,
        "update_credentials" => OrderType::UpdateCredentials,
        _ => return None,
    })
}
