use super::*;
use crate::{
    base::{RuleStore, SentinelRule},
    logging, utils,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;

pub type RuleMap = HashMap<MetricType, Vec<Arc<Rule>>>;

#[derive(Debug, Default)]
pub struct SystemSnapshot {
    rules: Vec<Arc<Rule>>,
    rule_map: RuleMap,
}

lazy_static! {
    static ref SYSTEM_RULES: RuleStore<SystemSnapshot> = RuleStore::default();
}

/// `get_rules` returns all the effective system rules.
pub fn get_rules() -> Vec<Arc<Rule>> {
    SYSTEM_RULES
        .load()
        .rule_map
        .values()
        .flatten()
        .cloned()
        .collect()
}

/// The effective rules whose resource name, i.e. the metric type name, is `res`.
pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    get_rules()
        .into_iter()
        .filter(|rule| rule.resource_name() == res)
        .collect()
}

pub fn get_rules_of_type(metric_type: MetricType) -> Vec<Arc<Rule>> {
    SYSTEM_RULES
        .load()
        .rule_map
        .get(&metric_type)
        .cloned()
        .unwrap_or_default()
}

/// `load_rules` loads given system rules to the rule manager, while all previous rules will be replaced.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    SYSTEM_RULES.update(|current| {
        if current.rules == rules {
            logging::info!("[SystemRuleManager] The loaded system rules are unchanged, nothing to do");
            return None;
        }
        let start = utils::curr_time_nanos();
        let rule_map = build_rule_map(&rules);
        logging::debug!(
            "[SystemRuleManager load_rules] Time statistic(ns) for updating system rule, time cost {}",
            utils::curr_time_nanos() - start
        );
        logging::info!("[SystemRuleManager] System rules loaded, rules {:?}", rule_map);
        Some(SystemSnapshot { rules, rule_map })
    })
}

/// `clear_rules` clear all the previous rules
pub fn clear_rules() {
    SYSTEM_RULES.update(|current| {
        if current.rules.is_empty() {
            None
        } else {
            logging::info!("[SystemRuleManager] System rules were cleared");
            Some(SystemSnapshot::default())
        }
    });
}

fn build_rule_map(rules: &[Arc<Rule>]) -> RuleMap {
    let mut m = RuleMap::new();
    for rule in rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[SystemRuleManager build_rule_map] Ignoring invalid system rule, rule: {:?}, error: {:?}",
                rule,
                err
            );
            continue;
        }
        m.entry(rule.metric_type).or_default().push(rule.clone());
    }
    m
}
