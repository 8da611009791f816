use super::*;
use crate::{
    base::{
        BaseSlot, BlockType, ConcurrencyStat, EntryContext, MetricEvent, ReadStat, RuleCheckSlot,
        Snapshot, TokenResult, TrafficType,
    },
    stat, system_metric,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 2000;

/// A RuleSlot protecting the whole process from inbound overload.
pub struct AdaptiveSlot {}

lazy_static! {
    pub static ref DEFAULT_ADAPTIVE_SLOT: Arc<AdaptiveSlot> = Arc::new(AdaptiveSlot {});
}

pub fn default_slot() -> Arc<AdaptiveSlot> {
    DEFAULT_ADAPTIVE_SLOT.clone()
}

impl BaseSlot for AdaptiveSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for AdaptiveSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        if *ctx.resource().traffic_type() == TrafficType::Outbound {
            return ctx.result().clone();
        }
        for rule in get_rules() {
            if let Some((msg, snapshot)) = can_pass_check(&rule) {
                ctx.set_result(TokenResult::new_blocked_with_cause(
                    BlockType::System,
                    msg,
                    rule,
                    snapshot,
                ));
                break;
            }
        }
        ctx.result().clone()
    }
}

/// Returns the block message and the triggered value if `rule` rejects the current inbound call.
fn can_pass_check(rule: &Arc<Rule>) -> Option<(String, Arc<Snapshot>)> {
    let value = current_value(rule.metric_type);
    if !rule.tripped_by(value) || (rule.is_adaptive() && check_bbr_simple()) {
        return None;
    }
    Some((rule.block_msg(), Arc::new(value) as Arc<Snapshot>))
}

fn current_value(metric_type: MetricType) -> f64 {
    let inbound = stat::inbound_node();
    match metric_type {
        MetricType::InboundQPS => inbound.qps(MetricEvent::Pass),
        MetricType::Concurrency => inbound.current_concurrency() as f64,
        MetricType::AvgRT => inbound.avg_rt(),
        MetricType::Load => system_metric::current_load(),
        MetricType::CpuUsage => system_metric::current_cpu_usage(),
    }
}

/// Whether the inbound concurrency is still below the estimated capacity,
/// i.e. the max completions per second times the min response time.
fn check_bbr_simple() -> bool {
    let inbound = stat::inbound_node();
    let concurrency = inbound.current_concurrency() as f64;
    let min_rt = inbound.min_rt();
    let max_complete = inbound.max_avg(MetricEvent::Complete);
    !(concurrency > 1.0 && concurrency > max_complete * min_rt / 1000.0)
}
