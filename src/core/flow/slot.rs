use super::*;
use crate::{
    base::{BaseSlot, EntryContext, ReadStat, RuleCheckSlot, StatNode, TokenResult},
    logging, stat,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 3000;

/// A RuleSlot for flow related metrics.
/// All rules of a resource must pass, they are checked in loading order.
pub struct Slot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<Slot> = Arc::new(Slot {});
}

pub fn default_slot() -> Arc<Slot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for Slot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for Slot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        let tcs = get_traffic_controller_list_for(ctx.resource().name());
        let batch_count = ctx.input().batch_count();
        let flag = ctx.input().flag();
        let mut decision = TokenResult::new_pass();
        for tc in &tcs {
            decision = decision.and(can_pass_check(tc, &tcs, ctx, batch_count, flag));
            if decision.is_blocked() {
                ctx.set_result(decision);
                return ctx.result().clone();
            }
        }
        if decision.nanos_to_wait() > 0 {
            decision
        } else {
            ctx.result().clone()
        }
    }
}

/// The node the rule applies to for this call, with the metric its passed calls are read from.
/// `None` if the rule does not apply.
fn select_node(
    tc: &Controller,
    tcs: &[Arc<Controller>],
    ctx: &EntryContext,
) -> Option<(Arc<dyn StatNode>, Option<Arc<dyn ReadStat>>)> {
    let rule = tc.rule();
    let origin = ctx.origin();
    match rule.limit_origin.as_str() {
        LIMIT_ORIGIN_DEFAULT => {}
        LIMIT_ORIGIN_OTHER => {
            // callers named by another rule of the resource are limited by that rule
            if origin.is_empty()
                || tcs
                    .iter()
                    .any(|other| &other.rule().limit_origin == origin)
            {
                return None;
            }
        }
        limit_origin => {
            if limit_origin != origin {
                return None;
            }
        }
    }

    match rule.relation_strategy {
        RelationStrategy::Associated => {
            let node: Arc<dyn StatNode> = stat::get_resource_node(&rule.ref_resource)?;
            if tc.stat().reuse_global() {
                Some((node, Some(tc.stat().read_only_metric().clone())))
            } else {
                Some((node, None))
            }
        }
        RelationStrategy::Chain => {
            if ctx.context_name() != &rule.ref_resource {
                return None;
            }
            let node: Arc<dyn StatNode> = ctx.cur_node()?;
            Some((node, None))
        }
        RelationStrategy::Current => {
            if rule.limit_origin == LIMIT_ORIGIN_DEFAULT {
                let node = ctx.stat_node()?;
                Some((node, Some(tc.stat().read_only_metric().clone())))
            } else {
                let node = ctx.origin_node()?;
                Some((node, None))
            }
        }
    }
}

fn can_pass_check(
    tc: &Arc<Controller>,
    tcs: &[Arc<Controller>],
    ctx: &EntryContext,
    batch_count: u32,
    flag: i32,
) -> TokenResult {
    match select_node(tc, tcs, ctx) {
        Some((node, Some(metric))) => tc.perform_checking(metric.as_ref(), &node, batch_count, flag),
        Some((node, None)) => {
            let metric = NodeMetric(node.clone());
            tc.perform_checking(&metric, &node, batch_count, flag)
        }
        None => {
            if tc.rule().limit_origin == LIMIT_ORIGIN_DEFAULT
                && tc.rule().relation_strategy == RelationStrategy::Current
            {
                logging::FREQUENT_ERROR_ONCE.call_once(|| {
                    logging::error!(
                        "[FlowSlot can_pass_check] None statistics node for flow rule {:?}",
                        tc.rule()
                    );
                });
            }
            TokenResult::new_pass()
        }
    }
}
