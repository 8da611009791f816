use super::inbound_node;
use crate::base::{
    BaseSlot, BlockError, EntryContext, MetricEvent, StatNode, StatSlot, TrafficType,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 1000;

lazy_static! {
    pub static ref DEFAULT_RESOURCE_STAT_SLOT: Arc<ResourceNodeStatSlot> =
        Arc::new(ResourceNodeStatSlot {});
}

pub fn default_resource_stat_slot() -> Arc<ResourceNodeStatSlot> {
    DEFAULT_RESOURCE_STAT_SLOT.clone()
}

/// ResourceNodeStatSlot records the outcome of every entry on all its nodes:
/// the path node, the resource-wide node, the origin node,
/// and the global inbound node for inbound traffic.
pub struct ResourceNodeStatSlot {}

impl ResourceNodeStatSlot {
    fn nodes_of(ctx: &EntryContext) -> Vec<Arc<dyn StatNode>> {
        let mut nodes: Vec<Arc<dyn StatNode>> = Vec::with_capacity(4);
        if let Some(cur_node) = ctx.cur_node() {
            nodes.push(cur_node);
        }
        if let Some(stat_node) = ctx.stat_node() {
            nodes.push(stat_node);
        }
        if let Some(origin_node) = ctx.origin_node() {
            nodes.push(origin_node);
        }
        if *ctx.resource().traffic_type() == TrafficType::Inbound {
            nodes.push(inbound_node());
        }
        nodes
    }

    fn record_pass_for(&self, node: &Arc<dyn StatNode>, count: u32) {
        node.increase_concurrency();
        node.add_count(MetricEvent::Pass, count as u64);
    }

    fn record_block_for(&self, node: &Arc<dyn StatNode>, count: u32) {
        node.add_count(MetricEvent::Block, count as u64)
    }

    fn record_complete_for(
        &self,
        node: &Arc<dyn StatNode>,
        count: u32,
        round_trip: u64,
        failed: bool,
    ) {
        node.add_count(MetricEvent::Rt, round_trip);
        node.add_count(MetricEvent::Complete, count as u64);
        if failed {
            node.add_count(MetricEvent::Error, count as u64);
        }
        node.decrease_concurrency();
    }
}

impl BaseSlot for ResourceNodeStatSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for ResourceNodeStatSlot {
    fn on_entry_pass(&self, ctx: &EntryContext) {
        let count = ctx.input().batch_count();
        for node in Self::nodes_of(ctx) {
            self.record_pass_for(&node, count);
        }
    }

    fn on_entry_blocked(&self, ctx: &EntryContext, _block_error: BlockError) {
        let count = ctx.input().batch_count();
        for node in Self::nodes_of(ctx) {
            self.record_block_for(&node, count);
        }
    }

    fn on_completed(&self, ctx: &mut EntryContext) {
        let count = ctx.input().batch_count();
        let round_trip = ctx.round_trip();
        let failed = ctx.get_err().is_some();
        for node in Self::nodes_of(ctx) {
            self.record_complete_for(&node, count, round_trip, failed);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{MockStatNode, ResourceType, ResourceWrapper};

    fn context(traffic_type: TrafficType, node: MockStatNode) -> EntryContext {
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            "stat_slot".into(),
            ResourceType::Common,
            traffic_type,
        ));
        ctx.set_stat_node(Arc::new(node));
        ctx.input_mut().set_batch_count(2);
        ctx
    }

    #[test]
    fn pass() {
        let mut node = MockStatNode::new();
        node.expect_increase_concurrency().once().return_const(());
        node.expect_add_count()
            .withf(|event, count| *event == MetricEvent::Pass && *count == 2)
            .once()
            .return_const(());
        let ctx = context(TrafficType::Outbound, node);
        default_resource_stat_slot().on_entry_pass(&ctx);
    }

    #[test]
    fn blocked() {
        let mut node = MockStatNode::new();
        node.expect_increase_concurrency().never();
        node.expect_add_count()
            .withf(|event, count| *event == MetricEvent::Block && *count == 2)
            .once()
            .return_const(());
        let ctx = context(TrafficType::Outbound, node);
        default_resource_stat_slot().on_entry_blocked(&ctx, BlockError::default());
    }

    #[test]
    fn completed_with_error() {
        let mut node = MockStatNode::new();
        node.expect_add_count()
            .withf(|event, count| *event == MetricEvent::Rt && *count == 30)
            .once()
            .return_const(());
        node.expect_add_count()
            .withf(|event, count| *event == MetricEvent::Complete && *count == 2)
            .once()
            .return_const(());
        node.expect_add_count()
            .withf(|event, count| *event == MetricEvent::Error && *count == 2)
            .once()
            .return_const(());
        node.expect_decrease_concurrency().once().return_const(());
        let mut ctx = context(TrafficType::Outbound, node);
        ctx.set_round_trip(30);
        ctx.set_err(crate::Error::msg("biz error"));
        default_resource_stat_slot().on_completed(&mut ctx);
    }

    #[test]
    fn inbound_recorded_globally() {
        let mut node = MockStatNode::new();
        node.expect_increase_concurrency().return_const(());
        node.expect_add_count().return_const(());
        let before = inbound_node().statistic().arr.count(MetricEvent::Pass);
        let ctx = context(TrafficType::Inbound, node);
        default_resource_stat_slot().on_entry_pass(&ctx);
        assert!(inbound_node().statistic().arr.count(MetricEvent::Pass) >= before + 2);
    }
}
