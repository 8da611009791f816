use super::*;
use crate::base::{BaseSlot, EntryContext, MetricEvent, StatSlot};
use lazy_static::lazy_static;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 2000;

/// Records passed calls on the standalone statistics of the flow rules of the resource.
pub struct StandaloneStatSlot {}

lazy_static! {
    pub static ref DEFAULT_STAND_ALONE_STAT_SLOT: Arc<StandaloneStatSlot> =
        Arc::new(StandaloneStatSlot {});
}

pub fn default_stand_alone_stat_slot() -> Arc<StandaloneStatSlot> {
    DEFAULT_STAND_ALONE_STAT_SLOT.clone()
}

impl BaseSlot for StandaloneStatSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for StandaloneStatSlot {
    fn on_entry_pass(&self, ctx: &EntryContext) {
        let count = ctx.input().batch_count() as u64;
        for tc in get_traffic_controller_list_for(ctx.resource().name()) {
            // the statistic of an associated rule counts the other resource
            if tc.stat().reuse_global() || tc.rule().relation_strategy != RelationStrategy::Current
            {
                continue;
            }
            if let Some(metric) = tc.stat().write_only_metric() {
                metric.add_count(MetricEvent::Pass, count);
            }
        }
    }
}
