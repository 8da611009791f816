use super::*;
use crate::{
    base::{RuleStore, SentinelRule},
    logging, utils, Error, Result,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type BreakerGenFn = dyn Send
    + Sync
    + Fn(Arc<Rule>, Option<Arc<CounterLeapArray>>) -> Result<Arc<dyn CircuitBreakerTrait>>;

/// The loaded rules per resource, in loading order.
pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;
pub type BreakerMap = HashMap<String, Vec<Arc<dyn CircuitBreakerTrait>>>;

/// The circuit breaking rules and the breakers built from the valid ones.
#[derive(Default)]
pub struct BreakerSnapshot {
    rules: RuleMap,
    breakers: BreakerMap,
}

macro_rules! insert_breaker_generator {
    ($map:expr, $strategy:expr, $breaker:ident) => {
        $map.insert(
            $strategy,
            Box::new(
                |rule: Arc<Rule>,
                 stat: Option<Arc<CounterLeapArray>>|
                 -> Result<Arc<dyn CircuitBreakerTrait>> {
                    match stat {
                        Some(stat) => Ok(Arc::new($breaker::new_with_stat(rule, stat))),
                        None => Ok(Arc::new($breaker::new(rule)?)),
                    }
                },
            ),
        );
    };
}

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<BreakerStrategy, Box<BreakerGenFn>>> = {
        let mut gen_fun_map: HashMap<BreakerStrategy, Box<BreakerGenFn>> = HashMap::new();
        insert_breaker_generator!(gen_fun_map, BreakerStrategy::SlowRequestRatio, SlowRtBreaker);
        insert_breaker_generator!(gen_fun_map, BreakerStrategy::ErrorRatio, ErrorRatioBreaker);
        insert_breaker_generator!(gen_fun_map, BreakerStrategy::ErrorCount, ErrorCountBreaker);
        RwLock::new(gen_fun_map)
    };
    static ref STATE_CHANGE_LISTENERS: RwLock<Vec<Arc<dyn StateChangeListener>>> =
        RwLock::new(Vec::new());
    static ref BREAKER_RULES: RuleStore<BreakerSnapshot> = RuleStore::default();
}

pub fn state_change_listeners() -> &'static RwLock<Vec<Arc<dyn StateChangeListener>>> {
    &STATE_CHANGE_LISTENERS
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[CircuitBreaker] Circuit breaking rules were cleared")
    } else {
        logging::info!(
            "[CircuitBreaker] Circuit breaking rules were loaded: {:?}",
            map.values()
        )
    }
}

fn valid_rules_of(rules: &[Arc<Rule>]) -> Vec<Arc<Rule>> {
    rules
        .iter()
        .filter(|rule| match rule.is_valid() {
            Ok(_) => true,
            Err(err) => {
                logging::warn!(
                    "[CircuitBreaker onRuleUpdate] Ignoring invalid circuit breaking rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                false
            }
        })
        .cloned()
        .collect()
}

/// `load_rules` replaces old rules with the given circuit breaking rules.
/// The returned `bool` indicates whether the internal map has been changed.
/// Breakers of unchanged rules are kept with their state and window.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().push(rule);
    }

    BREAKER_RULES.update(|current| {
        if current.rules == rule_map {
            logging::info!("[CircuitBreaker] The loaded breaker rules are unchanged, nothing to do");
            return None;
        }
        let start = utils::curr_time_nanos();
        let mut valid_rules_map = HashMap::with_capacity(rule_map.len());
        let mut breakers = HashMap::with_capacity(rule_map.len());
        for (res, rules) in &rule_map {
            let valid_rules = valid_rules_of(rules);
            if valid_rules.is_empty() {
                continue;
            }
            let mut old_res_cbs = current.breakers.get(res).cloned().unwrap_or_default();
            let new_cbs_of_res =
                build_resource_circuit_breaker(res, &valid_rules, &mut old_res_cbs);
            if !new_cbs_of_res.is_empty() {
                breakers.insert(res.clone(), new_cbs_of_res);
            }
            valid_rules_map.insert(res.clone(), valid_rules);
        }
        logging::debug!(
            "[CircuitBreaker load_rules] Time statistic(ns) for updating circuit breaker rule, time cost {}",
            utils::curr_time_nanos() - start
        );
        log_rule_update(&valid_rules_map);
        Some(BreakerSnapshot {
            rules: rule_map,
            breakers,
        })
    })
}

/// `load_rules_of_resource` loads the given resource's circuit breaking rules to the rule manager,
/// while all previous resource's rules will be replaced.
/// Returns whether a real load happened, `false` if the rules equal the current ones.
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let res = res.to_owned();
    Ok(BREAKER_RULES.update(|current| {
        let mut next_rules = current.rules.clone();
        let mut next_breakers = current.breakers.clone();
        if rules.is_empty() {
            if !next_rules.contains_key(&res) {
                return None;
            }
            next_rules.remove(&res);
            next_breakers.remove(&res);
            logging::info!("[CircuitBreaker] clear resource level rules, resource {}", res);
            return Some(BreakerSnapshot {
                rules: next_rules,
                breakers: next_breakers,
            });
        }
        if current.rules.get(&res) == Some(&rules) {
            logging::info!(
                "[CircuitBreaker] The breaker rules of resource {} are unchanged, nothing to do",
                res
            );
            return None;
        }
        let valid_res_rules = valid_rules_of(&rules);
        let mut old_res_cbs = next_breakers.remove(&res).unwrap_or_default();
        let new_res_cbs = build_resource_circuit_breaker(&res, &valid_res_rules, &mut old_res_cbs);
        if !new_res_cbs.is_empty() {
            next_breakers.insert(res.clone(), new_res_cbs);
        }
        logging::info!(
            "[CircuitBreaker] load resource level rules, resource: {}, valid_res_rules: {:?}",
            res,
            valid_res_rules
        );
        next_rules.insert(res.clone(), rules);
        Some(BreakerSnapshot {
            rules: next_rules,
            breakers: next_breakers,
        })
    }))
}

/// `get_rules` returns all the effective rules.
pub fn get_rules() -> Vec<Arc<Rule>> {
    BREAKER_RULES
        .load()
        .breakers
        .values()
        .flat_map(|cbs| cbs.iter().map(|cb| Arc::clone(cb.bound_rule())))
        .collect()
}

/// `get_rules_of_resource` returns specific resource's effective rules, in loading order.
pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    get_breakers_of_resource(res)
        .iter()
        .map(|cb| Arc::clone(cb.bound_rule()))
        .collect()
}

/// `clear_rules` clears all the previous rules.
pub fn clear_rules() {
    BREAKER_RULES.update(|current| {
        if current.rules.is_empty() && current.breakers.is_empty() {
            None
        } else {
            log_rule_update(&RuleMap::new());
            Some(BreakerSnapshot::default())
        }
    });
}

/// `clear_rules_of_resource` clears resource level rules in circuit breaker module.
pub fn clear_rules_of_resource(res: &str) {
    // an empty rule list of a non-empty resource never fails
    let _ = load_rules_of_resource(res, Vec::new());
}

/// The breakers of the resource, in loading order.
pub fn get_breakers_of_resource(res: &str) -> Vec<Arc<dyn CircuitBreakerTrait>> {
    BREAKER_RULES
        .load()
        .breakers
        .get(res)
        .cloned()
        .unwrap_or_default()
}

/// register_state_change_listeners registers the global state change listener for all circuit breakers
pub fn register_state_change_listeners(mut listeners: Vec<Arc<dyn StateChangeListener>>) {
    if listeners.is_empty() {
        return;
    }
    STATE_CHANGE_LISTENERS
        .write()
        .unwrap()
        .append(&mut listeners);
}

/// Unregisters one listener, compared by identity.
#[allow(clippy::vtable_address_comparisons)]
pub fn remove_state_change_listener(listener: &Arc<dyn StateChangeListener>) {
    STATE_CHANGE_LISTENERS
        .write()
        .unwrap()
        .retain(|l| !Arc::ptr_eq(l, listener));
}

/// clear_state_change_listeners clears the all StateChangeListener
pub fn clear_state_change_listeners() {
    STATE_CHANGE_LISTENERS.write().unwrap().clear();
}

/// set_circuit_breaker_generator sets the circuit breaker generator for the given strategy.
/// Note that modifying the generator of default strategies is not allowed.
pub fn set_circuit_breaker_generator(
    s: BreakerStrategy,
    generator: Box<BreakerGenFn>,
) -> Result<()> {
    match s {
        BreakerStrategy::Custom(_) => {
            GEN_FUN_MAP.write().unwrap().insert(s, generator);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default circuit breakers are not allowed to be modified.",
        )),
    }
}

pub fn remove_circuit_breaker_generator(s: &BreakerStrategy) -> Result<()> {
    match s {
        BreakerStrategy::Custom(_) => {
            GEN_FUN_MAP.write().unwrap().remove(s);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default circuit breakers are not allowed to be modified.",
        )),
    }
}

fn calculate_reuse_index_for(
    r: &Arc<Rule>,
    old_res_cbs: &[Arc<dyn CircuitBreakerTrait>],
) -> (Option<usize>, Option<usize>) {
    // the index of equivalent rule in old circuit breaker slice
    let mut eq_idx = None;
    // the index of statistic reusable rule in old circuit breaker slice
    let mut reuse_stat_idx = None;

    for (idx, old_cb) in old_res_cbs.iter().enumerate() {
        let old_rule = old_cb.bound_rule();
        if old_rule == r {
            eq_idx = Some(idx);
            break;
        }
        if reuse_stat_idx.is_none() && old_rule.is_stat_reusable(r) {
            reuse_stat_idx = Some(idx);
        }
    }
    (eq_idx, reuse_stat_idx)
}

/// build_resource_circuit_breaker builds the breakers of `res` from its rules, in rule order.
/// Breakers of equal rules in `old_res_cbs` are reused with their state,
/// the window of a stat reusable one is handed to the new breaker.
/// Reused breakers are removed from `old_res_cbs`.
pub fn build_resource_circuit_breaker(
    res: &str,
    rules_of_res: &[Arc<Rule>],
    old_res_cbs: &mut Vec<Arc<dyn CircuitBreakerTrait>>,
) -> Vec<Arc<dyn CircuitBreakerTrait>> {
    let mut new_res_cbs = Vec::with_capacity(rules_of_res.len());
    let gen_fun_map = GEN_FUN_MAP.read().unwrap();
    for rule in rules_of_res {
        if res != rule.resource {
            logging::error!("[CircuitBreaker build_resource_circuit_breaker] unmatched resource name expect: {}, actual: {}, rule: {:?}", res, rule.resource, rule);
            continue;
        }

        let (eq_idx, reuse_stat_idx) = calculate_reuse_index_for(rule, old_res_cbs);
        if let Some(eq_idx) = eq_idx {
            new_res_cbs.push(old_res_cbs.remove(eq_idx));
            continue;
        }

        let generator = match gen_fun_map.get(&rule.strategy) {
            Some(generator) => generator,
            None => {
                logging::error!("[CircuitBreaker build_resource_circuit_breaker] Ignoring the rule due to unsupported circuit breaking strategy, rule {:?}", rule);
                continue;
            }
        };
        let stat = reuse_stat_idx.map(|idx| Arc::clone(old_res_cbs[idx].stat()));
        match generator(Arc::clone(rule), stat) {
            Ok(cb) => {
                if let Some(idx) = reuse_stat_idx {
                    old_res_cbs.remove(idx);
                }
                new_res_cbs.push(cb);
            }
            Err(err) => logging::error!(
                "[CircuitBreaker build_resource_circuit_breaker] Ignoring the rule due to bad generated circuit breaker, rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }
    new_res_cbs
}
