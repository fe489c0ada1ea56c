//! Demo rule set, embedded as JSON keyed by scope.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use reflex_core::{Rule, RuleDef};

const DEMO_RULES: &str = r#"{
  "knight": [
    { "id": "mount_up", "action": "ride", "when": "start", "skill": "war_cry", "cd": 40 },
    { "id": "cleave", "action": "attack", "when": "instant", "skill": "cleave",
      "target": "@victim", "cd": 10 },
    { "id": "saddle_sore", "action": "ride", "when": "duration", "skill": "fatigue",
      "after": 60, "cd": 100 },
    { "id": "gallop", "action": "ride", "when": "tick", "skill": "dust_trail", "every": 20,
      "meta": { "mount": "horse" } }
  ],
  "harpy": [
    { "id": "takeoff", "action": "fly", "when": "start", "skill": "gust" },
    { "id": "wingbeat", "action": "fly", "when": "tick", "skill": "feather_fall", "every": 40 },
    { "id": "perch", "action": "hover", "when": "start", "skill": "screech",
      "meta": { "hover_min_ticks": 4 } },
    { "id": "descend", "action": "hover", "when": "end", "skill": "dive" },
    { "id": "no_swing", "action": "swing", "when": "instant", "skill": "talon",
      "require": "airborne", "meta": { "cancel_event": true } }
  ],
  "sailor": [
    { "id": "board", "action": "inboat", "when": "start", "skill": "sea_legs",
      "meta": { "boat": true } },
    { "id": "long_voyage", "action": "inboat", "when": "duration", "skill": "scurvy",
      "after": 80, "cd": 200 }
  ]
}"#;

/// Parses and validates the embedded demo rules.
pub fn demo_rules() -> Result<Vec<Rule>> {
    let by_scope: BTreeMap<String, Vec<RuleDef>> =
        serde_json::from_str(DEMO_RULES).context("demo rule JSON is malformed")?;

    let mut rules = Vec::new();
    for (scope, defs) in by_scope {
        for def in defs {
            let id = def.id.clone();
            let rule = def
                .into_rule(scope.as_str())
                .with_context(|| format!("invalid rule {scope}:{id}"))?;
            rules.push(rule);
        }
    }
    Ok(rules)
}
