use super::get_or_create_resource_node;
use crate::base::{BaseSlot, EntryContext, StatNode, StatPrepareSlot};
use lazy_static::lazy_static;
use std::sync::Arc;

const PREPARE_SLOT_ORDER: u32 = 2000;

lazy_static! {
    pub static ref DEFAULT_CLUSTER_BUILDER_SLOT: Arc<ClusterBuilderSlot> =
        Arc::new(ClusterBuilderSlot {});
}

pub fn default_cluster_builder_slot() -> Arc<ClusterBuilderSlot> {
    DEFAULT_CLUSTER_BUILDER_SLOT.clone()
}

/// ClusterBuilderSlot resolves the resource-wide node of the entry
/// and, if the caller declared an origin, the origin node below it.
pub struct ClusterBuilderSlot {}

impl BaseSlot for ClusterBuilderSlot {
    fn order(&self) -> u32 {
        PREPARE_SLOT_ORDER
    }
}

impl StatPrepareSlot for ClusterBuilderSlot {
    fn prepare(&self, ctx: &mut EntryContext) {
        let node = get_or_create_resource_node(
            ctx.resource().name(),
            ctx.resource().resource_type(),
        );
        if let Some(cur_node) = ctx.cur_node() {
            if cur_node.cluster_node().is_none() {
                cur_node.set_cluster_node(node.clone());
            }
        }
        if !ctx.origin().is_empty() {
            let origin_node: Arc<dyn StatNode> = node.get_or_create_origin_node(ctx.origin());
            ctx.set_origin_node(origin_node);
        }
        ctx.set_stat_node(node);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ResourceType, ResourceWrapper, TrafficType};
    use crate::stat::DefaultNode;

    #[test]
    fn prepare() {
        let mut ctx = EntryContext::new();
        let res = ResourceWrapper::new(
            "cluster_builder".into(),
            ResourceType::Common,
            TrafficType::Outbound,
        );
        ctx.set_resource(res.clone());
        ctx.set_cur_node(Arc::new(DefaultNode::new(res)));
        ctx.set_origin("app_a".into());
        default_cluster_builder_slot().prepare(&mut ctx);

        let cluster = ctx.cur_node().unwrap().cluster_node().unwrap();
        assert_eq!(cluster.res_name(), "cluster_builder");
        assert!(ctx.stat_node().is_some());
        assert!(ctx.origin_node().is_some());
        assert!(cluster.origin_node("app_a").is_some());
    }
}
