use crate::{base::SentinelRule, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The process-wide metric a system rule guards.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum MetricType {
    /// load1 of the machine, Linux/Unix only
    Load,
    /// average round trip of the inbound calls, in milliseconds
    AvgRT,
    /// inbound calls in flight
    Concurrency,
    /// inbound calls passed per second
    InboundQPS,
    /// cpu usage of the process, as a ratio of the whole machine
    CpuUsage,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::Load
    }
}

impl MetricType {
    /// Load and cpu usage are sampled from the machine, the others from the inbound node.
    pub fn is_machine_metric(&self) -> bool {
        matches!(self, MetricType::Load | MetricType::CpuUsage)
    }

    /// Inbound metrics trip once they reach the threshold, machine metrics once they exceed it.
    pub fn trips(&self, value: f64, threshold: f64) -> bool {
        if self.is_machine_metric() {
            value > threshold
        } else {
            value >= threshold
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MetricType::Load => "load",
            MetricType::AvgRT => "avg rt",
            MetricType::Concurrency => "concurrency",
            MetricType::InboundQPS => "qps",
            MetricType::CpuUsage => "cpu usage",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Eq)]
pub enum AdaptiveStrategy {
    NoAdaptive,
    /// Lets a tripped machine metric through while the inbound concurrency
    /// stays under the estimated capacity, as TCP BBR does.
    BBR,
}

impl Default for AdaptiveStrategy {
    fn default() -> AdaptiveStrategy {
        AdaptiveStrategy::NoAdaptive
    }
}

/// `Rule` guards all the inbound traffic against one process-wide metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Rule {
    pub id: String,
    pub metric_type: MetricType,
    pub threshold: f64,
    /// only `Load` and `CpuUsage` rules take an adaptive strategy
    pub strategy: AdaptiveStrategy,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            metric_type: MetricType::default(),
            threshold: 0.0,
            strategy: AdaptiveStrategy::default(),
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.metric_type == other.metric_type
            && self.threshold == other.threshold
            && self.strategy == other.strategy
    }
}

impl Rule {
    pub fn tripped_by(&self, value: f64) -> bool {
        self.metric_type.trips(value, self.threshold)
    }

    pub fn is_adaptive(&self) -> bool {
        self.strategy == AdaptiveStrategy::BBR
    }

    pub fn block_msg(&self) -> String {
        format!("system {} check blocked", self.metric_type.label())
    }
}

impl SentinelRule for Rule {
    fn resource_name(&self) -> String {
        format!("{:?}", self.metric_type)
    }

    fn is_valid(&self) -> Result<()> {
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.metric_type == MetricType::CpuUsage && self.threshold > 1.0 {
            return Err(Error::msg("invalid CPU usage, valid range is [0.0, 1.0]"));
        }
        if self.is_adaptive() && !self.metric_type.is_machine_metric() {
            return Err(Error::msg(format!(
                "adaptive strategy on {:?}, only Load and CpuUsage rules take one",
                self.metric_type
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(fmtted) => write!(f, "{}", fmtted),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejected_rules() {
        let cases = [
            (MetricType::InboundQPS, -1.0, AdaptiveStrategy::NoAdaptive, "negative threshold"),
            (MetricType::AvgRT, f64::NAN, AdaptiveStrategy::NoAdaptive, "negative threshold"),
            (
                MetricType::CpuUsage,
                1.15,
                AdaptiveStrategy::NoAdaptive,
                "invalid CPU usage, valid range is [0.0, 1.0]",
            ),
            (
                MetricType::Concurrency,
                10.0,
                AdaptiveStrategy::BBR,
                "adaptive strategy on Concurrency, only Load and CpuUsage rules take one",
            ),
        ];
        for (metric_type, threshold, strategy, msg) in cases.iter() {
            let rule = Rule {
                metric_type: *metric_type,
                threshold: *threshold,
                strategy: *strategy,
                ..Default::default()
            };
            assert_eq!(rule.is_valid().unwrap_err().to_string(), *msg);
        }
    }

    #[test]
    fn load_above_one() {
        let rule = Rule {
            metric_type: MetricType::Load,
            threshold: 8.0,
            strategy: AdaptiveStrategy::BBR,
            ..Default::default()
        };
        assert!(rule.is_valid().is_ok());
        assert!(rule.is_adaptive());
        assert_eq!(rule.resource_name(), "Load");
        assert_eq!(rule.block_msg(), "system load check blocked");
    }

    #[test]
    fn threshold_comparison() {
        let qps = Rule {
            metric_type: MetricType::InboundQPS,
            threshold: 10.0,
            ..Default::default()
        };
        assert!(!qps.tripped_by(9.9));
        assert!(qps.tripped_by(10.0));
        assert_eq!(qps.block_msg(), "system qps check blocked");

        let cpu = Rule {
            metric_type: MetricType::CpuUsage,
            threshold: 0.5,
            ..Default::default()
        };
        assert!(!cpu.tripped_by(0.5));
        assert!(cpu.tripped_by(0.51));
    }
}
