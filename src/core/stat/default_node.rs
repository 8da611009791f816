use super::{ResourceNode, StatisticNode};
use crate::{
    base::{ConcurrencyStat, MetricEvent, ReadStat, ResourceWrapper, StatNode, WriteStat},
    Result,
};
use std::sync::{Arc, RwLock};

/// DefaultNode is the node of a resource on one call path, i.e. under one context name.
///
/// The same resource entered under different contexts gets distinct path nodes,
/// all sharing the resource-wide cluster node.
/// An entrance node is the root of a context's tree, its statistics
/// aggregate the first-level path nodes linked below it.
#[derive(Debug)]
pub struct DefaultNode {
    resource: ResourceWrapper,
    stat: StatisticNode,
    entrance: bool,
    cluster_node: RwLock<Option<Arc<ResourceNode>>>,
    children: RwLock<Vec<Arc<DefaultNode>>>,
}

impl DefaultNode {
    pub fn new(resource: ResourceWrapper) -> Self {
        DefaultNode {
            resource,
            stat: StatisticNode::new(),
            entrance: false,
            cluster_node: RwLock::new(None),
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn new_entrance(resource: ResourceWrapper) -> Self {
        DefaultNode {
            entrance: true,
            ..Self::new(resource)
        }
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn is_entrance(&self) -> bool {
        self.entrance
    }

    pub fn statistic(&self) -> &StatisticNode {
        &self.stat
    }

    pub fn cluster_node(&self) -> Option<Arc<ResourceNode>> {
        self.cluster_node.read().unwrap().clone()
    }

    pub fn set_cluster_node(&self, node: Arc<ResourceNode>) {
        *self.cluster_node.write().unwrap() = Some(node);
    }

    pub fn children(&self) -> Vec<Arc<DefaultNode>> {
        self.children.read().unwrap().clone()
    }

    /// Links `child` below this node, once.
    pub fn add_child(&self, child: Arc<DefaultNode>) {
        if self
            .children
            .read()
            .unwrap()
            .iter()
            .any(|c| Arc::ptr_eq(c, &child))
        {
            return;
        }
        let mut children = self.children.write().unwrap();
        if !children.iter().any(|c| Arc::ptr_eq(c, &child)) {
            children.push(child);
        }
    }

    fn sum_children<F: Fn(&DefaultNode) -> f64>(&self, f: F) -> f64 {
        self.children.read().unwrap().iter().map(|c| f(c.as_ref())).sum()
    }
}

impl ReadStat for DefaultNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        if self.entrance {
            self.sum_children(|c| c.qps(event))
        } else {
            self.stat.qps(event)
        }
    }

    fn qps_previous(&self, event: MetricEvent) -> f64 {
        if self.entrance {
            self.sum_children(|c| c.qps_previous(event))
        } else {
            self.stat.qps_previous(event)
        }
    }

    fn sum(&self, event: MetricEvent) -> u64 {
        if self.entrance {
            self.children
                .read()
                .unwrap()
                .iter()
                .map(|c| c.sum(event))
                .sum()
        } else {
            self.stat.sum(event)
        }
    }

    fn min_rt(&self) -> f64 {
        if self.entrance {
            self.children
                .read()
                .unwrap()
                .iter()
                .map(|c| c.min_rt())
                .fold(None, |acc: Option<f64>, rt| {
                    Some(acc.map_or(rt, |acc| acc.min(rt)))
                })
                .unwrap_or_else(|| self.stat.min_rt())
        } else {
            self.stat.min_rt()
        }
    }

    fn avg_rt(&self) -> f64 {
        if self.entrance {
            let completed = self.sum(MetricEvent::Complete);
            if completed == 0 {
                0f64
            } else {
                self.sum(MetricEvent::Rt) as f64 / completed as f64
            }
        } else {
            self.stat.avg_rt()
        }
    }
}

impl WriteStat for DefaultNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.stat.add_count(event, count);
    }
}

impl ConcurrencyStat for DefaultNode {
    fn current_concurrency(&self) -> u32 {
        if self.entrance {
            self.children
                .read()
                .unwrap()
                .iter()
                .map(|c| c.current_concurrency())
                .sum()
        } else {
            self.stat.current_concurrency()
        }
    }

    fn increase_concurrency(&self) {
        self.stat.increase_concurrency()
    }

    fn decrease_concurrency(&self) {
        self.stat.decrease_concurrency()
    }
}

impl StatNode for DefaultNode {
    fn generate_read_stat(&self, sample_count: u32, interval_ms: u32) -> Result<Arc<dyn ReadStat>> {
        self.stat.generate_read_stat(sample_count, interval_ms)
    }
}
