use super::*;
use crate::{
    base::{RuleStore, SentinelRule},
    logging, Error, Result,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;

pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

/// The loaded authority rules and the valid ones the slot checks.
#[derive(Debug, Default)]
pub struct AuthoritySnapshot {
    rules: RuleMap,
    effective: RuleMap,
}

lazy_static! {
    static ref AUTHORITY_RULES: RuleStore<AuthoritySnapshot> = RuleStore::default();
}

fn valid_rules_of(rules: &[Arc<Rule>]) -> Vec<Arc<Rule>> {
    rules
        .iter()
        .filter(|rule| match rule.is_valid() {
            Ok(_) => true,
            Err(err) => {
                logging::warn!(
                    "[AuthorityRuleManager] Ignoring invalid authority rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                false
            }
        })
        .cloned()
        .collect()
}

fn build_effective(rules: &RuleMap) -> RuleMap {
    rules
        .iter()
        .filter_map(|(res, rules)| {
            let valid = valid_rules_of(rules);
            if valid.is_empty() {
                None
            } else {
                Some((res.clone(), valid))
            }
        })
        .collect()
}

/// `load_rules` replaces all the authority rules.
/// Returns false if the rules are the same with the current ones.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map = RuleMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().push(rule);
    }
    AUTHORITY_RULES.update(|current| {
        if current.rules == rule_map {
            logging::info!("[AuthorityRuleManager] The loaded authority rules are unchanged, nothing to do");
            return None;
        }
        let effective = build_effective(&rule_map);
        logging::info!(
            "[AuthorityRuleManager] Authority rules were loaded: {:?}",
            effective.values()
        );
        Some(AuthoritySnapshot {
            rules: rule_map,
            effective,
        })
    })
}

/// `load_rules_of_resource` replaces the authority rules of `res` only.
/// An empty `rules` clears the resource.
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    Ok(AUTHORITY_RULES.update(|current| {
        if current.rules.get(res).map(|r| r == &rules).unwrap_or(rules.is_empty()) {
            return None;
        }
        let mut next_rules = current.rules.clone();
        let mut next_effective = current.effective.clone();
        next_rules.remove(res);
        next_effective.remove(res);
        if !rules.is_empty() {
            let valid = valid_rules_of(&rules);
            if !valid.is_empty() {
                next_effective.insert(res.to_owned(), valid);
            }
            next_rules.insert(res.to_owned(), rules);
        }
        logging::info!(
            "[AuthorityRuleManager] load resource level rules, resource: {}, rules: {:?}",
            res,
            next_effective.get(res)
        );
        Some(AuthoritySnapshot {
            rules: next_rules,
            effective: next_effective,
        })
    }))
}

pub fn get_rules() -> Vec<Arc<Rule>> {
    AUTHORITY_RULES
        .load()
        .effective
        .values()
        .flatten()
        .cloned()
        .collect()
}

pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    AUTHORITY_RULES
        .load()
        .effective
        .get(res)
        .cloned()
        .unwrap_or_default()
}

pub fn clear_rules() {
    AUTHORITY_RULES.update(|current| {
        if current.rules.is_empty() {
            None
        } else {
            logging::info!("[AuthorityRuleManager] Authority rules were cleared");
            Some(AuthoritySnapshot::default())
        }
    });
}

pub fn clear_rules_of_resource(res: &str) {
    let _ = load_rules_of_resource(res, Vec::new());
}

#[cfg(test)]
mod test {
    use super::*;

    fn rule(res: &str, origins: &[&str]) -> Arc<Rule> {
        Arc::new(Rule {
            resource: res.into(),
            limit_origins: origins.iter().map(|o| o.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn resource_level_load() {
        let res = "authority_manager_resource_level";
        assert!(load_rules_of_resource(res, vec![rule(res, &["a"]), rule(res, &[])]).unwrap());
        // the invalid rule is kept as loaded but not checked
        assert_eq!(get_rules_of_resource(res).len(), 1);
        assert!(!load_rules_of_resource(res, vec![rule(res, &["a"]), rule(res, &[])]).unwrap());
        clear_rules_of_resource(res);
        assert!(get_rules_of_resource(res).is_empty());
        assert!(!load_rules_of_resource(res, vec![]).unwrap());
        assert!(load_rules_of_resource("", vec![]).is_err());
    }

    #[test]
    fn effective_map() {
        let mut rules = RuleMap::new();
        rules.insert("x".into(), vec![rule("x", &["a"])]);
        rules.insert("y".into(), vec![rule("y", &[])]);
        let effective = build_effective(&rules);
        assert_eq!(effective.len(), 1);
        assert!(effective.contains_key("x"));
    }
}
