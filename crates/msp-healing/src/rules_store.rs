//! L1 rule set assembly (spec §4.3, §4.6): builtin rules are compiled in,
//! `yaml` rules come from an operator-edited file, `synced` rules arrive
//! from the control plane via a `sync_rules` order and are written to
//! `rules/l1_rules.json`. `reload()` re-reads yaml/synced from disk so the
//! main loop can pick up a `sync_rules` order without restarting.

use std::path::PathBuf;

use msp_types::{L1Rule, RuleSource};

use crate::error::HealingError;
use crate::runbooks::builtin_rules;

/// Ordered rule set matching §8's "builtin wins, yaml second, synced last"
/// tie-break. `msp_core::find_match` relies on this ordering, not on
/// re-sorting by source itself.
pub struct RuleStore {
    yaml_path: PathBuf,
    synced_path: PathBuf,
    rules: Vec<L1Rule>,
}

impl RuleStore {
    pub fn new(yaml_path: PathBuf, synced_path: PathBuf) -> Result<Self, HealingError> {
        let mut store = Self {
            yaml_path,
            synced_path,
            rules: Vec::new(),
        };
        store.reload()?;
        Ok(store)
    }

    pub fn rules(&self) -> &[L1Rule] {
        &self.rules
    }

    /// Re-reads yaml and synced rule files from disk and rebuilds the
    /// ordered list. Builtin rules never change at runtime and are never
    /// persisted to either file (spec §4.3: "never synced... never
    /// overwritten").
    pub fn reload(&mut self) -> Result<(), HealingError> {
        let mut rules = builtin_rules();

        if self.yaml_path.exists() {
            let contents = std::fs::read_to_string(&self.yaml_path)
                .map_err(|e| HealingError::RuleStore(format!("reading {}: {e}", self.yaml_path.display())))?;
            let mut yaml_rules: Vec<L1Rule> = serde_yaml::from_str(&contents)
                .map_err(|e| HealingError::RuleStore(format!("parsing {}: {e}", self.yaml_path.display())))?;
            for r in &mut yaml_rules {
                r.source = RuleSource::Yaml;
            }
            rules.extend(yaml_rules);
        }

        if self.synced_path.exists() {
            let contents = std::fs::read_to_string(&self.synced_path)
                .map_err(|e| HealingError::RuleStore(format!("reading {}: {e}", self.synced_path.display())))?;
            let mut synced_rules: Vec<L1Rule> = serde_json::from_str(&contents)?;
            for r in &mut synced_rules {
                r.source = RuleSource::Synced;
            }
            rules.extend(synced_rules);
        }

        self.rules = rules;
        Ok(())
    }

    /// Persists a freshly-synced rule set to `rules/l1_rules.json` (the
    /// `sync_rules` order handler calls this, then `reload()`). Builtin
    /// rules are excluded by construction since they never flow through
    /// this path.
    pub fn write_synced(&self, rules: &[L1Rule]) -> Result<(), HealingError> {
        if let Some(parent) = self.synced_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HealingError::RuleStore(format!("creating {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(rules)?;
        std::fs::write(&self.synced_path, json)
            .map_err(|e| HealingError::RuleStore(format!("writing {}: {e}", self.synced_path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msp_types::{Condition, ConditionOp};
    use serde_json::json;

    fn synced_rule() -> L1Rule {
        L1Rule {
            rule_id: "synced-1".into(),
            conditions: vec![Condition {
                field: "check_type".into(),
                op: ConditionOp::Eq,
                value: json!("firewall_status"),
            }],
            runbook_id: "RB-WIN-FIREWALL-001".into(),
            source: RuleSource::Synced,
            min_confidence: None,
        }
    }

    #[test]
    fn builtin_always_precedes_synced() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_path = dir.path().join("rules.yaml");
        let synced_path = dir.path().join("synced.json");

        let mut store = RuleStore::new(yaml_path, synced_path).unwrap();
        store.write_synced(&[synced_rule()]).unwrap();
        store.reload().unwrap();

        let rules = store.rules();
        assert!(rules.iter().any(|r| r.source == RuleSource::Builtin));
        let builtin_idx = rules.iter().position(|r| r.source == RuleSource::Builtin).unwrap();
        let synced_idx = rules.iter().position(|r| r.source == RuleSource::Synced).unwrap();
        assert!(builtin_idx < synced_idx);
    }
}
