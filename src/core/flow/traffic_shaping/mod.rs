//! Traffic Shaping Policy

/// Direct calculator and reject checker
pub mod default;
/// Throttling checker
pub mod throttling;
/// Warm Up calculator
pub mod warmup;

pub use default::*;
pub use throttling::*;
pub use warmup::*;

use super::Rule;
use crate::base::{MetricEvent, ReadStat, StatNode, TokenResult, WriteStat};
use std::fmt;
use std::sync::Arc;

/// Traffic Shaping `Calculator` calculates the actual traffic shaping threshold
/// based on the threshold of rule and the traffic shaping strategy.
/// `metric` is the statistic bound to the owning controller.
pub trait Calculator: Send + Sync + fmt::Debug {
    fn calculate_allowed_threshold(&self, metric: &dyn ReadStat, batch_count: u32, flag: i32)
        -> f64;
}

/// Traffic Shaping `Checker` performs checking according to current metrics and the traffic
/// shaping strategy, then yield the token result.
/// `metric` is the statistic the rule is counted on, `node` the node its concurrency is read from.
pub trait Checker: Send + Sync + fmt::Debug {
    fn do_check(
        &self,
        rule: &Arc<Rule>,
        metric: &dyn ReadStat,
        node: &Arc<dyn StatNode>,
        batch_count: u32,
        threshold: f64,
    ) -> TokenResult;
}

/// StandaloneStat indicates the independent statistic for each Traffic Shaping Controller
#[derive(Debug)]
pub struct StandaloneStat {
    /// `reuse_global` indicates whether current standaloneStatistic reuse the current resource's global statistic
    reuse_global: bool,
    /// `read_only_metric` is the readonly metric statistic.
    /// if reuse_global is true, it would be the reused SlidingWindowMetric
    /// if reuse_global is false, it would be a SlidingWindowMetric over its own BucketLeapArray
    read_only_metric: Arc<dyn ReadStat>,
    /// `write_only_metric` is the write only metric statistic.
    /// if reuse_global is true, it would be None
    /// if reuse_global is false, it would be the BucketLeapArray
    write_only_metric: Option<Arc<dyn WriteStat>>,
}

impl StandaloneStat {
    pub fn new(
        reuse_global: bool,
        read_only_metric: Arc<dyn ReadStat>,
        write_only_metric: Option<Arc<dyn WriteStat>>,
    ) -> Self {
        StandaloneStat {
            reuse_global,
            read_only_metric,
            write_only_metric,
        }
    }

    pub fn reuse_global(&self) -> bool {
        self.reuse_global
    }

    pub fn read_only_metric(&self) -> &Arc<dyn ReadStat> {
        &self.read_only_metric
    }

    /// `None` when the global statistic is reused, the resource node records it then.
    pub fn write_only_metric(&self) -> Option<&Arc<dyn WriteStat>> {
        self.write_only_metric.as_ref()
    }
}

#[derive(Debug)]
pub struct Controller {
    calculator: Box<dyn Calculator>,
    checker: Box<dyn Checker>,
    rule: Arc<Rule>,
    // stat is the statistic of current Traffic Shaping Controller
    stat: Arc<StandaloneStat>,
}

impl Controller {
    pub fn new(
        rule: Arc<Rule>,
        stat: Arc<StandaloneStat>,
        calculator: Box<dyn Calculator>,
        checker: Box<dyn Checker>,
    ) -> Self {
        Controller {
            calculator,
            checker,
            rule,
            stat,
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn stat(&self) -> &Arc<StandaloneStat> {
        &self.stat
    }

    /// Checks one call against the rule.
    /// `metric` is what the rule counts passed calls on,
    /// the bound statistic for resource-wide rules, the node itself for origin and chain rules.
    pub fn perform_checking(
        &self,
        metric: &dyn ReadStat,
        node: &Arc<dyn StatNode>,
        batch_count: u32,
        flag: i32,
    ) -> TokenResult {
        let allowed_threshold =
            self.calculator
                .calculate_allowed_threshold(metric, batch_count, flag);
        self.checker
            .do_check(&self.rule, metric, node, batch_count, allowed_threshold)
    }
}

/// Reads the default metric of a statistic node through `ReadStat`.
#[derive(Debug)]
pub struct NodeMetric(pub Arc<dyn StatNode>);

impl ReadStat for NodeMetric {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.0.qps(event)
    }
    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.0.qps_previous(event)
    }
    fn sum(&self, event: MetricEvent) -> u64 {
        self.0.sum(event)
    }
    fn min_rt(&self) -> f64 {
        self.0.min_rt()
    }
    fn avg_rt(&self) -> f64 {
        self.0.avg_rt()
    }
}
