// ─── Rule Engine ───
// Ordered allow/disallow rules gating libraries by OS (name + version pattern).

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use super::context::RuntimeContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
    /// Rule did not match; leaves the running decision unchanged.
    Defer,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Disallow => "disallow",
            RuleAction::Defer => "defer",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Rule {
    /// Applies unconditionally.
    Implicit { action: RuleAction },
    /// Applies when the OS (and optionally its version) matches.
    Os {
        action: RuleAction,
        system: String,
        version: Option<Regex>,
    },
}

impl Rule {
    pub fn implicit(action: RuleAction) -> Self {
        Rule::Implicit { action }
    }

    pub fn os(action: RuleAction, system: &str) -> Self {
        Rule::Os {
            action,
            system: system.to_string(),
            version: None,
        }
    }

    pub fn os_with_version(action: RuleAction, system: &str, version_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Rule::Os {
            action,
            system: system.to_string(),
            version: Some(Regex::new(version_pattern)?),
        })
    }

    pub fn action(&self) -> RuleAction {
        match self {
            Rule::Implicit { action } | Rule::Os { action, .. } => *action,
        }
    }

    /// The rule's action if it matches `ctx`, otherwise `Defer`.
    pub fn apply(&self, ctx: &RuntimeContext) -> RuleAction {
        match self {
            Rule::Implicit { action } => *action,
            Rule::Os {
                action,
                system,
                version,
            } => {
                if !ctx.classifier_matches(system) {
                    return RuleAction::Defer;
                }
                match version {
                    Some(re) if !re.is_match(&ctx.os_version) => RuleAction::Defer,
                    _ => *action,
                }
            }
        }
    }
}

/// Fold a rule list into a single decision.
///
/// Empty lists are always active. Otherwise the decision starts as `Disallow`
/// and every matching rule overwrites it, so later rules win.
pub fn evaluate(rules: &[Rule], ctx: &RuntimeContext) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut decision = RuleAction::Disallow;
    for rule in rules {
        let action = rule.apply(ctx);
        if action != RuleAction::Defer {
            decision = action;
        }
    }
    decision == RuleAction::Allow
}

// ── JSON ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawRule {
    action: Option<String>,
    #[serde(default)]
    os: Option<RawOsRule>,
}

#[derive(Debug, Deserialize)]
struct RawOsRule {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Read a Mojang `rules` array. Malformed entries are skipped with a warning.
pub fn rules_from_json(value: &serde_json::Value) -> Vec<Rule> {
    let Some(items) = value.as_array() else {
        warn!("Ignoring rules that are not an array: {}", value);
        return Vec::new();
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let raw: RawRule = match serde_json::from_value(item.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping malformed rule {}: {}", item, e);
                continue;
            }
        };
        let action = match raw.action.as_deref() {
            Some("allow") => RuleAction::Allow,
            Some("disallow") => RuleAction::Disallow,
            other => {
                warn!("Skipping rule with unknown action {:?}", other);
                continue;
            }
        };

        match raw.os {
            Some(RawOsRule {
                name: Some(name),
                version,
            }) => {
                let version = match version {
                    Some(pattern) => match Regex::new(&pattern) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            warn!("Skipping OS rule with bad version pattern {:?}: {}", pattern, e);
                            continue;
                        }
                    },
                    None => None,
                };
                out.push(Rule::Os {
                    action,
                    system: name,
                    version,
                });
            }
            Some(RawOsRule { name: None, .. }) => {
                warn!("Skipping OS rule without a name");
            }
            None => out.push(Rule::Implicit { action }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> RuntimeContext {
        RuntimeContext::new("linux", "64", "x86_64").with_os_version("6.8.0")
    }

    fn windows() -> RuntimeContext {
        RuntimeContext::new("windows", "64", "x86_64").with_os_version("10.0")
    }

    #[test]
    fn no_rules_means_active() {
        assert!(evaluate(&[], &linux()));
    }

    #[test]
    fn later_matching_rule_overrides_earlier() {
        let rules = vec![
            Rule::implicit(RuleAction::Disallow),
            Rule::os(RuleAction::Allow, "linux"),
        ];
        assert!(evaluate(&rules, &linux()));
        assert!(!evaluate(&rules, &windows()));
    }

    #[test]
    fn allow_then_disallow_current_os() {
        let rules = vec![
            Rule::implicit(RuleAction::Allow),
            Rule::os(RuleAction::Disallow, "osx"),
        ];
        assert!(evaluate(&rules, &linux()));
        let osx = RuntimeContext::new("osx", "64", "x86_64");
        assert!(!evaluate(&rules, &osx));
    }

    #[test]
    fn only_non_matching_rules_leave_disallow() {
        let rules = vec![Rule::os(RuleAction::Allow, "windows")];
        assert!(!evaluate(&rules, &linux()));
    }

    #[test]
    fn version_pattern_must_match() {
        let rule = Rule::os_with_version(RuleAction::Disallow, "windows", "^10\\.").unwrap();
        assert_eq!(rule.apply(&windows()), RuleAction::Disallow);
        let xp = RuntimeContext::new("windows", "32", "x86").with_os_version("5.1");
        assert_eq!(rule.apply(&xp), RuleAction::Defer);
    }

    #[test]
    fn parses_mojang_rules() {
        let json = serde_json::json!([
            {"action": "allow"},
            {"action": "disallow", "os": {"name": "osx", "version": "^10\\.5\\.\\d$"}},
            {"action": "explode"},
            {"action": "allow", "os": {}}
        ]);
        let rules = rules_from_json(&json);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action(), RuleAction::Allow);
        assert!(matches!(&rules[1], Rule::Os { system, version: Some(_), .. } if system == "osx"));
    }
}
