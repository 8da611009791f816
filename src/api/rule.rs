use crate::{authority, circuitbreaker, flow, system};
use std::sync::Arc;

/// The rule classes, each one is checked by its own slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RuleClass {
    Flow,
    CircuitBreaker,
    System,
    Authority,
}

/// A complete rule set of one rule class.
#[derive(Debug, Clone)]
pub enum RuleSet {
    Flow(Vec<Arc<flow::Rule>>),
    CircuitBreaker(Vec<Arc<circuitbreaker::Rule>>),
    System(Vec<Arc<system::Rule>>),
    Authority(Vec<Arc<authority::Rule>>),
}

impl RuleSet {
    pub fn class(&self) -> RuleClass {
        match self {
            RuleSet::Flow(_) => RuleClass::Flow,
            RuleSet::CircuitBreaker(_) => RuleClass::CircuitBreaker,
            RuleSet::System(_) => RuleClass::System,
            RuleSet::Authority(_) => RuleClass::Authority,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RuleSet::Flow(rules) => rules.len(),
            RuleSet::CircuitBreaker(rules) => rules.len(),
            RuleSet::System(rules) => rules.len(),
            RuleSet::Authority(rules) => rules.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replaces all the rules of the class of `rules`.
/// Readers see either the previous rule set or the new one, never a mix of both.
/// Returns false if the rules are the same with the current ones.
pub fn load_rules(rules: RuleSet) -> bool {
    match rules {
        RuleSet::Flow(rules) => flow::load_rules(rules),
        RuleSet::CircuitBreaker(rules) => circuitbreaker::load_rules(rules),
        RuleSet::System(rules) => system::load_rules(rules),
        RuleSet::Authority(rules) => authority::load_rules(rules),
    }
}

/// The effective rules of a class.
pub fn get_rules(class: RuleClass) -> RuleSet {
    match class {
        RuleClass::Flow => RuleSet::Flow(flow::get_rules()),
        RuleClass::CircuitBreaker => RuleSet::CircuitBreaker(circuitbreaker::get_rules()),
        RuleClass::System => RuleSet::System(system::get_rules()),
        RuleClass::Authority => RuleSet::Authority(authority::get_rules()),
    }
}

pub fn clear_rules(class: RuleClass) {
    match class {
        RuleClass::Flow => flow::clear_rules(),
        RuleClass::CircuitBreaker => circuitbreaker::clear_rules(),
        RuleClass::System => system::clear_rules(),
        RuleClass::Authority => authority::clear_rules(),
    }
}
