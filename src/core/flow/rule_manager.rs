use super::*;
use crate::{
    base::{nop_stat, ResourceType, RuleStore, SentinelRule, StatNode, WindowSpec},
    config, logging,
    stat::{self, ResourceNode},
    utils, Error, Result,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// ControllerGenfn represents the Traffic Controller generator function of a specific control behavior.
pub type ControllerGenfn =
    dyn Send + Sync + Fn(Arc<Rule>, Option<Arc<StandaloneStat>>) -> Result<Arc<Controller>>;

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub struct ControllerGenKey {
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
}

impl ControllerGenKey {
    pub fn new(calculate_strategy: CalculateStrategy, control_strategy: ControlStrategy) -> Self {
        ControllerGenKey {
            calculate_strategy,
            control_strategy,
        }
    }
}

/// ControllerMap represents the map storage for Controller.
pub type ControllerMap = HashMap<String, Vec<Arc<Controller>>>;
/// The loaded rules per resource, in loading order.
pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

/// The flow rules and the controllers built from the valid ones.
#[derive(Debug, Default)]
pub struct FlowSnapshot {
    rules: RuleMap,
    controllers: ControllerMap,
}

macro_rules! insert_flow_generator {
    ($map:expr, $calculate_strategy:expr, $control_strategy:expr, $calculator:ident, $checker:ident) => {
        $map.insert(
            ControllerGenKey::new($calculate_strategy, $control_strategy),
            Box::new(
                |rule: Arc<Rule>, stat: Option<Arc<StandaloneStat>>| -> Result<Arc<Controller>> {
                    let stat = match stat {
                        None => generate_stat_for(&rule)?,
                        Some(stat) => stat,
                    };
                    Ok(Arc::new(Controller::new(
                        Arc::clone(&rule),
                        stat,
                        Box::new($calculator::new(Arc::clone(&rule))),
                        Box::new($checker::new(rule)),
                    )))
                },
            ),
        );
    };
}

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<ControllerGenKey, Box<ControllerGenfn>>> = {
        let mut gen_fun_map: HashMap<ControllerGenKey, Box<ControllerGenfn>> = HashMap::new();
        insert_flow_generator!(
            gen_fun_map,
            CalculateStrategy::Direct,
            ControlStrategy::Reject,
            DirectCalculator,
            RejectChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            CalculateStrategy::Direct,
            ControlStrategy::Throttling,
            DirectCalculator,
            ThrottlingChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            CalculateStrategy::WarmUp,
            ControlStrategy::Reject,
            WarmUpCalculator,
            RejectChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            CalculateStrategy::WarmUp,
            ControlStrategy::Throttling,
            WarmUpCalculator,
            ThrottlingChecker
        );
        RwLock::new(gen_fun_map)
    };
    static ref FLOW_RULES: RuleStore<FlowSnapshot> = RuleStore::default();
    static ref NOP_STAT: Arc<StandaloneStat> = Arc::new(StandaloneStat::new(
        false,
        nop_stat(),
        Some(nop_stat())
    ));
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[FlowRuleManager] Flow rules were cleared")
    } else {
        logging::info!(
            "[FlowRuleManager] Flow rules were loaded: {:?}",
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
                    "[FlowRuleManager] Ignoring invalid flow rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                false
            }
        })
        .cloned()
        .collect()
}

/// `load_rules` loads the given flow rules to the rule manager, while all previous rules will be replaced.
/// The returned `bool` indicates whether do real load operation, if the rules is the same with previous rules, return false
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().push(rule);
    }

    FLOW_RULES.update(|current| {
        if current.rules == rule_map {
            logging::info!("[FlowRuleManager] The loaded flow rules are unchanged, nothing to do");
            return None;
        }
        let start = utils::curr_time_nanos();
        let mut valid_rules_map = HashMap::with_capacity(rule_map.len());
        let mut controllers = HashMap::with_capacity(rule_map.len());
        for (res, rules) in &rule_map {
            let valid_rules = valid_rules_of(rules);
            if valid_rules.is_empty() {
                continue;
            }
            let mut old_res_tcs = current.controllers.get(res).cloned().unwrap_or_default();
            let new_tcs_of_res =
                build_resource_traffic_shaping_controller(res, &valid_rules, &mut old_res_tcs);
            if !new_tcs_of_res.is_empty() {
                controllers.insert(res.clone(), new_tcs_of_res);
            }
            valid_rules_map.insert(res.clone(), valid_rules);
        }
        logging::debug!(
            "[FlowRuleManager load_rules] controllers rebuilt in {}ns",
            utils::curr_time_nanos() - start
        );
        log_rule_update(&valid_rules_map);
        Some(FlowSnapshot {
            rules: rule_map,
            controllers,
        })
    })
}

/// `load_rules_of_resource` loads the given resource's flow rules to the rule manager, while all previous resource's rules will be replaced.
/// The returned value indicates whether do real load operation, if the rules is the same with previous resource's rules, return false
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let res = res.to_owned();
    Ok(FLOW_RULES.update(|current| {
        let mut next_rules = current.rules.clone();
        let mut next_controllers = current.controllers.clone();
        if rules.is_empty() {
            if !next_rules.contains_key(&res) {
                return None;
            }
            next_rules.remove(&res);
            next_controllers.remove(&res);
            logging::info!("[FlowRuleManager] clear resource level rules, resource {}", res);
            return Some(FlowSnapshot {
                rules: next_rules,
                controllers: next_controllers,
            });
        }
        if current.rules.get(&res) == Some(&rules) {
            logging::info!(
                "[FlowRuleManager] The flow rules of resource {} are unchanged, nothing to do",
                res
            );
            return None;
        }
        let valid_res_rules = valid_rules_of(&rules);
        let mut old_res_tcs = next_controllers.remove(&res).unwrap_or_default();
        let new_res_tcs =
            build_resource_traffic_shaping_controller(&res, &valid_res_rules, &mut old_res_tcs);
        if !new_res_tcs.is_empty() {
            next_controllers.insert(res.clone(), new_res_tcs);
        }
        logging::info!(
            "[FlowRuleManager] load resource level rules, resource: {}, valid_res_rules: {:?}",
            res,
            valid_res_rules
        );
        next_rules.insert(res.clone(), rules);
        Some(FlowSnapshot {
            rules: next_rules,
            controllers: next_controllers,
        })
    }))
}

/// `get_rules` returns all the effective rules.
pub fn get_rules() -> Vec<Arc<Rule>> {
    FLOW_RULES
        .load()
        .controllers
        .values()
        .flat_map(|controllers| controllers.iter().map(|c| Arc::clone(c.rule())))
        .collect()
}

/// `get_rules_of_resource` returns specific resource's effective rules, in loading order.
pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    FLOW_RULES
        .load()
        .controllers
        .get(res)
        .map(|controllers| controllers.iter().map(|c| Arc::clone(c.rule())).collect())
        .unwrap_or_default()
}

/// clear_rules clears all the rules in flow module.
pub fn clear_rules() {
    FLOW_RULES.update(|current| {
        if current.rules.is_empty() && current.controllers.is_empty() {
            None
        } else {
            log_rule_update(&RuleMap::new());
            Some(FlowSnapshot::default())
        }
    });
}

/// `clear_rules_of_resource` clears resource level rules in flow module.
pub fn clear_rules_of_resource(res: &str) {
    // an empty rule list of a non-empty resource never fails
    let _ = load_rules_of_resource(res, Vec::new());
}

/// The controllers of the resource, in loading order.
pub fn get_traffic_controller_list_for(name: &str) -> Vec<Arc<Controller>> {
    FLOW_RULES
        .load()
        .controllers
        .get(name)
        .cloned()
        .unwrap_or_default()
}

/// One bucket per resource-wide bucket when the interval is made of them and fits in the
/// resource-wide window, a single bucket otherwise.
fn sample_count_for(interval_ms: u32) -> u32 {
    let bucket_length_ms = config::global_stat_bucket_length_ms();
    if interval_ms > bucket_length_ms
        && interval_ms < config::global_stat_interval_ms_total()
        && interval_ms % bucket_length_ms == 0
    {
        interval_ms / bucket_length_ms
    } else {
        1
    }
}

/// `generate_stat_for` generates a `StandaloneStat` according to the rule,
/// it may generate a cloned pointer to the global `NOP_STAT`,
/// a stat with default global metrics,
/// a read only stat over the global metrics
/// or a standalone stat with its own metrics.
fn generate_stat_for(rule: &Arc<Rule>) -> Result<Arc<StandaloneStat>> {
    if !rule.need_statistic() {
        return Ok(NOP_STAT.clone());
    }

    let interval_ms = rule.stat_interval_ms;

    let res_node: Arc<ResourceNode> = if rule.relation_strategy == RelationStrategy::Associated {
        // use associated statistic
        stat::get_or_create_resource_node(&rule.ref_resource, &ResourceType::Common)
    } else {
        stat::get_or_create_resource_node(&rule.resource, &ResourceType::Common)
    };

    if interval_ms == 0 || interval_ms == config::metric_stat_interval_ms() {
        // default case, use the resource's default statistic
        let metric = res_node.default_metric();
        return Ok(Arc::new(StandaloneStat::new(true, metric, None)));
    }

    let sample_count = sample_count_for(interval_ms);
    let resource_wide = WindowSpec::new(
        config::global_stat_sample_count_total(),
        config::global_stat_interval_ms_total(),
    );
    match WindowSpec::new(sample_count, interval_ms).check_readable_from(&resource_wide) {
        Ok(_) => {
            let metric = res_node.generate_read_stat(sample_count, interval_ms)?;
            Ok(Arc::new(StandaloneStat::new(true, metric, None)))
        }
        Err(reason) => {
            logging::info!(
                "[FlowRuleManager] {}, the rule keeps a window of its own, rule: {:?}",
                reason,
                rule
            );
            let write_stat = Arc::new(stat::BucketLeapArray::new(sample_count, interval_ms)?);
            let read_stat = Arc::new(stat::SlidingWindowMetric::new(
                sample_count,
                interval_ms,
                write_stat.clone(),
            )?);
            Ok(Arc::new(StandaloneStat::new(
                false,
                read_stat,
                Some(write_stat),
            )))
        }
    }
}

/// The key of a generator which may be replaced: at least one of the strategies is custom.
fn custom_generator_key(
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
) -> Result<ControllerGenKey> {
    match (calculate_strategy, control_strategy) {
        (CalculateStrategy::Custom(_), _) | (_, ControlStrategy::Custom(_)) => {
            Ok(ControllerGenKey::new(calculate_strategy, control_strategy))
        }
        _ => Err(Error::msg(format!(
            "the built-in {:?}/{:?} controller generator cannot be replaced",
            calculate_strategy, control_strategy
        ))),
    }
}

/// Registers the controller generator of a custom strategy pair.
/// Rules loaded afterwards with that pair get their controllers from it.
pub fn set_traffic_shaping_generator(
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
    generator: Box<ControllerGenfn>,
) -> Result<()> {
    let key = custom_generator_key(calculate_strategy, control_strategy)?;
    GEN_FUN_MAP.write().unwrap().insert(key, generator);
    Ok(())
}

pub fn remove_traffic_shaping_generator(
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
) -> Result<()> {
    let key = custom_generator_key(calculate_strategy, control_strategy)?;
    GEN_FUN_MAP.write().unwrap().remove(&key);
    Ok(())
}

fn calculate_reuse_index_for(
    r: &Arc<Rule>,
    old_res_tcs: &[Arc<Controller>],
) -> (Option<usize>, Option<usize>) {
    // the index of equivalent rule in old traffic shaping controller slice
    let mut eq_idx = None;
    // the index of statistic reusable rule in old traffic shaping controller slice
    let mut reuse_stat_idx = None;

    for (idx, old_tc) in old_res_tcs.iter().enumerate() {
        let old_rule = old_tc.rule();
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

/// build_resource_traffic_shaping_controller builds Controller slice from rules. the resource of rules must be equals to res.
/// Controllers of equal rules in `old_res_tcs` are reused as they are,
/// the statistic of a stat reusable one is handed to the new controller.
/// Reused controllers are removed from `old_res_tcs`.
pub fn build_resource_traffic_shaping_controller(
    res: &str,
    rules_of_res: &[Arc<Rule>],
    old_res_tcs: &mut Vec<Arc<Controller>>,
) -> Vec<Arc<Controller>> {
    let mut new_res_tcs = Vec::with_capacity(rules_of_res.len());
    let gen_fun_map = GEN_FUN_MAP.read().unwrap();
    for rule in rules_of_res {
        if res != rule.resource {
            logging::error!("[FlowRuleManager build_resource_traffic_shaping_controller] unmatched resource name expect: {}, actual: {}, rule: {:?}", res, rule.resource, rule);
            continue;
        }
        let (eq_idx, reuse_stat_idx) = calculate_reuse_index_for(rule, old_res_tcs);

        if let Some(eq_idx) = eq_idx {
            new_res_tcs.push(old_res_tcs.remove(eq_idx));
            continue;
        }

        let key = ControllerGenKey::new(rule.calculate_strategy, rule.control_strategy);
        let generator = match gen_fun_map.get(&key) {
            Some(generator) => generator,
            None => {
                logging::error!("[FlowRuleManager build_resource_traffic_shaping_controller] Ignoring the rule due to unsupported control behavior, rule: {}", rule);
                continue;
            }
        };

        let reused_stat = reuse_stat_idx.map(|idx| Arc::clone(old_res_tcs[idx].stat()));
        match generator(Arc::clone(rule), reused_stat) {
            Ok(tc) => {
                if let Some(idx) = reuse_stat_idx {
                    old_res_tcs.remove(idx);
                }
                new_res_tcs.push(tc);
            }
            Err(err) => {
                logging::error!("[FlowRuleManager build_resource_traffic_shaping_controller] Ignoring the rule due to bad generated traffic controller, rule: {:?}, error: {:?}", rule, err);
            }
        }
    }
    new_res_tcs
}
