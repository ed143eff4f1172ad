mod context;
mod rule;

pub use context::{current_system, RuntimeContext};
pub use rule::{evaluate, rules_from_json, Rule, RuleAction};
