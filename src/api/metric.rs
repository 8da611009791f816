//! Read-only snapshots of the resource nodes, for exporters.

use crate::{
    base::{ConcurrencyStat, MetricEvent, ReadStat, ResourceType},
    stat::{self, ResourceNode, StatisticNode},
    utils::{curr_time_millis, format_time_millis},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const METRIC_PART_SEPARATOR: &str = "|";
pub const METRIC_EMPTY_STRING_ERROR: &str = "invalid metric line: empty string";
pub const METRIC_INVALID_FORMAT_ERROR: &str = "invalid metric line: invalid format";

/// The windowed metrics of one node at `timestamp`.
/// `origin` is empty for the resource-wide node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub timestamp: u64,
    pub resource: String,
    pub resource_type: ResourceType,
    pub origin: String,
    pub pass_qps: f64,
    pub block_qps: f64,
    pub success_qps: f64,
    pub error_qps: f64,
    pub avg_rt: f64,
    pub min_rt: f64,
    pub concurrency: u32,
}

impl NodeSnapshot {
    fn of(
        timestamp: u64,
        resource: &str,
        resource_type: ResourceType,
        origin: &str,
        node: &StatisticNode,
    ) -> Self {
        NodeSnapshot {
            timestamp,
            resource: resource.into(),
            resource_type,
            origin: origin.into(),
            pass_qps: node.qps(MetricEvent::Pass),
            block_qps: node.qps(MetricEvent::Block),
            success_qps: node.qps(MetricEvent::Complete),
            error_qps: node.qps(MetricEvent::Error),
            avg_rt: node.avg_rt(),
            min_rt: node.min_rt(),
            concurrency: node.current_concurrency(),
        }
    }

    /// Parses a line rendered by `Display`.
    pub fn from_line(line: &str) -> Result<Self> {
        if line.is_empty() {
            return Err(Error::msg(METRIC_EMPTY_STRING_ERROR));
        }
        let arr: Vec<&str> = line.split(METRIC_PART_SEPARATOR).collect();
        if arr.len() != 12 {
            return Err(Error::msg(METRIC_INVALID_FORMAT_ERROR));
        }
        Ok(NodeSnapshot {
            timestamp: arr[0].parse::<u64>()?,
            resource: arr[2].into(),
            origin: arr[3].into(),
            pass_qps: arr[4].parse::<f64>()?,
            block_qps: arr[5].parse::<f64>()?,
            success_qps: arr[6].parse::<f64>()?,
            error_qps: arr[7].parse::<f64>()?,
            avg_rt: arr[8].parse::<f64>()?,
            min_rt: arr[9].parse::<f64>()?,
            concurrency: arr[10].parse::<u32>()?,
            resource_type: arr[11].parse::<u8>()?.into(),
        })
    }
}

impl fmt::Display for NodeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time_str = format_time_millis(self.timestamp);
        let final_name = self.resource.replace(METRIC_PART_SEPARATOR, "_");
        let final_origin = self.origin.replace(METRIC_PART_SEPARATOR, "_");
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.timestamp,
            time_str,
            final_name,
            final_origin,
            self.pass_qps,
            self.block_qps,
            self.success_qps,
            self.error_qps,
            self.avg_rt,
            self.min_rt,
            self.concurrency,
            self.resource_type as u8
        )
    }
}

fn snapshots_of(node: &ResourceNode, timestamp: u64, with_origins: bool) -> Vec<NodeSnapshot> {
    let mut snapshots = vec![NodeSnapshot::of(
        timestamp,
        node.res_name(),
        node.resource_type(),
        "",
        node.statistic(),
    )];
    if with_origins {
        let mut origins = node.origin_nodes();
        origins.sort_by(|a, b| a.0.cmp(&b.0));
        for (origin, origin_node) in origins {
            snapshots.push(NodeSnapshot::of(
                timestamp,
                node.res_name(),
                node.resource_type(),
                &origin,
                &origin_node,
            ));
        }
    }
    snapshots
}

/// The snapshot of the resource-wide node of `resource`, `None` if it has never been entered.
pub fn node_snapshot(resource: &str) -> Option<NodeSnapshot> {
    stat::get_resource_node(resource).map(|node| {
        NodeSnapshot::of(
            curr_time_millis(),
            resource,
            node.resource_type(),
            "",
            node.statistic(),
        )
    })
}

/// The snapshots of the origin nodes of `resource`, ordered by origin.
pub fn origin_snapshots(resource: &str) -> Vec<NodeSnapshot> {
    match stat::get_resource_node(resource) {
        Some(node) => snapshots_of(&node, curr_time_millis(), true)
            .into_iter()
            .skip(1)
            .collect(),
        None => Vec::new(),
    }
}

/// Snapshots of all resource nodes and their origin nodes, ordered by resource,
/// the global inbound node comes first.
pub fn node_snapshots() -> Vec<NodeSnapshot> {
    let timestamp = curr_time_millis();
    let mut nodes = stat::resource_node_list();
    nodes.sort_by(|a, b| a.res_name().cmp(b.res_name()));
    let mut snapshots = snapshots_of(&stat::inbound_node(), timestamp, false);
    for node in nodes {
        snapshots.extend(snapshots_of(&node, timestamp, true));
    }
    snapshots
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn render_and_parse() {
        let snapshot = NodeSnapshot {
            timestamp: 1564382218000,
            resource: "/foo|bar".into(),
            resource_type: ResourceType::Web,
            origin: "app_a".into(),
            pass_qps: 4.0,
            block_qps: 9.0,
            success_qps: 3.0,
            error_qps: 0.0,
            avg_rt: 25.5,
            min_rt: 1.0,
            concurrency: 2,
        };
        let line = snapshot.to_string();
        assert!(line.ends_with("|/foo_bar|app_a|4|9|3|0|25.5|1|2|1"));
        let parsed = NodeSnapshot::from_line(&line).unwrap();
        assert_eq!(parsed.resource, "/foo_bar");
        assert_eq!(parsed.pass_qps, 4.0);
        assert_eq!(parsed.resource_type, ResourceType::Web);
    }

    #[test]
    fn illegal_lines() {
        assert_eq!(
            NodeSnapshot::from_line("").unwrap_err().to_string(),
            METRIC_EMPTY_STRING_ERROR
        );
        assert_eq!(
            NodeSnapshot::from_line("1564382218000|2019-07-29 14:36:58|/foo/*|4")
                .unwrap_err()
                .to_string(),
            METRIC_INVALID_FORMAT_ERROR
        );
        assert!(NodeSnapshot::from_line("x|t|r||1|1|1|1|1|1|1|0").is_err());
    }

    #[test]
    fn origin_nodes_are_listed() {
        let node = stat::get_or_create_resource_node("api_metric_origins", &ResourceType::Common);
        node.get_or_create_origin_node("b").increase_pass(1);
        node.get_or_create_origin_node("a");
        assert!(node_snapshot("api_metric_origins").is_some());
        assert!(node_snapshot("api_metric_absent").is_none());
        let origins: Vec<String> = origin_snapshots("api_metric_origins")
            .into_iter()
            .map(|s| s.origin)
            .collect();
        assert_eq!(origins, vec!["a".to_string(), "b".to_string()]);
        let all = node_snapshots();
        assert_eq!(all[0].resource, crate::base::TOTAL_IN_BOUND_RESOURCE_NAME);
        assert!(all.iter().any(|s| s.resource == "api_metric_origins" && s.origin == "b"));
    }
}
