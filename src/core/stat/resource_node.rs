use super::StatisticNode;
use crate::{
    base::{ConcurrencyStat, MetricEvent, ReadStat, ResourceType, StatNode, WriteStat},
    Result,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// ResourceNode is the resource-wide (path independent) node of a resource,
/// also known as the cluster node.
/// It owns one statistic node per caller origin.
#[derive(Debug)]
pub struct ResourceNode {
    pub(crate) res_name: String,
    pub(crate) resource_type: ResourceType,
    pub(crate) stat: StatisticNode,
    origins: RwLock<HashMap<String, Arc<StatisticNode>>>,
}

impl ResourceNode {
    pub fn new(res_name: String, resource_type: ResourceType) -> Self {
        ResourceNode {
            res_name,
            resource_type,
            stat: StatisticNode::new(),
            origins: RwLock::new(HashMap::new()),
        }
    }

    pub fn res_name(&self) -> &String {
        &self.res_name
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn statistic(&self) -> &StatisticNode {
        &self.stat
    }

    pub fn default_metric(&self) -> Arc<dyn ReadStat> {
        self.stat.default_metric()
    }

    pub fn max_avg(&self, event: MetricEvent) -> f64 {
        self.stat.max_avg(event)
    }

    pub fn max_concurrency(&self) -> u32 {
        self.stat.max_concurrency()
    }

    /// The statistic node of calls from `origin`, created on first use.
    pub fn get_or_create_origin_node(&self, origin: &str) -> Arc<StatisticNode> {
        if let Some(node) = self.origins.read().unwrap().get(origin) {
            return node.clone();
        }
        self.origins
            .write()
            .unwrap()
            .entry(origin.to_owned())
            .or_insert_with(|| Arc::new(StatisticNode::new()))
            .clone()
    }

    pub fn origin_node(&self, origin: &str) -> Option<Arc<StatisticNode>> {
        self.origins.read().unwrap().get(origin).cloned()
    }

    /// All origins seen so far with their nodes.
    pub fn origin_nodes(&self) -> Vec<(String, Arc<StatisticNode>)> {
        self.origins
            .read()
            .unwrap()
            .iter()
            .map(|(origin, node)| (origin.clone(), node.clone()))
            .collect()
    }
}

impl ReadStat for ResourceNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.stat.qps(event)
    }
    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.stat.qps_previous(event)
    }
    fn sum(&self, event: MetricEvent) -> u64 {
        self.stat.sum(event)
    }
    fn min_rt(&self) -> f64 {
        self.stat.min_rt()
    }
    fn avg_rt(&self) -> f64 {
        self.stat.avg_rt()
    }
}

impl WriteStat for ResourceNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.stat.add_count(event, count);
    }
}

impl ConcurrencyStat for ResourceNode {
    fn current_concurrency(&self) -> u32 {
        self.stat.current_concurrency()
    }

    fn increase_concurrency(&self) {
        self.stat.increase_concurrency()
    }

    fn decrease_concurrency(&self) {
        self.stat.decrease_concurrency()
    }
}

impl StatNode for ResourceNode {
    fn generate_read_stat(&self, sample_count: u32, interval_ms: u32) -> Result<Arc<dyn ReadStat>> {
        self.stat.generate_read_stat(sample_count, interval_ms)
    }
}
