//! L1 deterministic rule matcher (spec §4.3).
//!
//! Rules fire only when every condition matches. Conflicting rules from
//! different sources are resolved by caller ordering: `find_match` does a
//! first-match linear scan, so the caller must hand it rules pre-sorted
//! builtin, then yaml, then synced (§8: "builtin wins, yaml second, synced
//! last").

use regex::Regex;
use serde_json::Value;

use msp_types::{Condition, ConditionOp, L1Rule};

use crate::error::CoreError;

fn field_value<'a>(context: &'a Value, field: &str) -> Option<&'a Value> {
    context.get(field)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    // Allow string/number cross-comparison since probe output and rule
    // literals both round-trip through JSON and may disagree on type.
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => x == y,
        _ => a.to_string() == b.to_string(),
    }
}

fn matches_condition(cond: &Condition, context: &Value) -> Result<bool, CoreError> {
    let actual = field_value(context, &cond.field);
    Ok(match cond.op {
        ConditionOp::Eq => actual.map(|a| values_equal(a, &cond.value)).unwrap_or(false),
        ConditionOp::Ne => actual.map(|a| !values_equal(a, &cond.value)).unwrap_or(true),
        ConditionOp::In => {
            let actual = match actual {
                Some(a) => a,
                None => return Ok(false),
            };
            match cond.value.as_array() {
                Some(list) => list.iter().any(|v| values_equal(v, actual)),
                None => false,
            }
        }
        ConditionOp::Matches => {
            let actual = match actual.and_then(|a| a.as_str()) {
                Some(s) => s,
                None => return Ok(false),
            };
            let pattern = cond
                .value
                .as_str()
                .ok_or_else(|| CoreError::RuleMatch("matches condition requires a string pattern".into()))?;
            let anchored = format!("^(?:{})$", pattern);
            let re = Regex::new(&anchored)?;
            re.is_match(actual)
        }
    })
}

/// True iff every condition of `rule` matches `context`.
pub fn rule_matches(rule: &L1Rule, context: &Value) -> Result<bool, CoreError> {
    for cond in &rule.conditions {
        if !matches_condition(cond, context)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// First-match scan over `rules`, in the order given by the caller.
pub fn find_match<'a>(rules: &'a [L1Rule], context: &Value) -> Result<Option<&'a L1Rule>, CoreError> {
    for rule in rules {
        if rule_matches(rule, context)? {
            return Ok(Some(rule));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msp_types::RuleSource;
    use serde_json::json;

    fn rule(id: &str, field: &str, op: ConditionOp, value: Value, source: RuleSource) -> L1Rule {
        L1Rule {
            rule_id: id.into(),
            conditions: vec![Condition {
                field: field.into(),
                op,
                value,
            }],
            runbook_id: format!("RB-{id}"),
            source,
            min_confidence: None,
        }
    }

    #[test]
    fn all_conditions_must_match() {
        let r = L1Rule {
            rule_id: "r1".into(),
            conditions: vec![
                Condition { field: "check_type".into(), op: ConditionOp::Eq, value: json!("firewall_status") },
                Condition { field: "severity".into(), op: ConditionOp::Eq, value: json!("high") },
            ],
            runbook_id: "RB-1".into(),
            source: RuleSource::Builtin,
            min_confidence: None,
        };
        let ctx = json!({"check_type": "firewall_status", "severity": "high"});
        assert!(rule_matches(&r, &ctx).unwrap());

        let ctx2 = json!({"check_type": "firewall_status", "severity": "low"});
        assert!(!rule_matches(&r, &ctx2).unwrap());
    }

    #[test]
    fn builtin_wins_over_yaml_and_synced() {
        let rules = vec![
            rule("builtin1", "check_type", ConditionOp::Eq, json!("x"), RuleSource::Builtin),
            rule("yaml1", "check_type", ConditionOp::Eq, json!("x"), RuleSource::Yaml),
            rule("synced1", "check_type", ConditionOp::Eq, json!("x"), RuleSource::Synced),
        ];
        let ctx = json!({"check_type": "x"});
        let found = find_match(&rules, &ctx).unwrap().unwrap();
        assert_eq!(found.rule_id, "builtin1");
    }

    #[test]
    fn matches_is_anchored() {
        let r = rule("re1", "actual", ConditionOp::Matches, json!("disabled.*"), RuleSource::Yaml);
        assert!(rule_matches(&r, &json!({"actual": "disabled on port 80"})).unwrap());
        assert!(!rule_matches(&r, &json!({"actual": "was disabled on port 80"})).unwrap());
    }

    #[test]
    fn in_operator() {
        let r = rule("in1", "severity", ConditionOp::In, json!(["high", "critical"]), RuleSource::Yaml);
        assert!(rule_matches(&r, &json!({"severity": "critical"})).unwrap());
        assert!(!rule_matches(&r, &json!({"severity": "low"})).unwrap());
    }
}
