use crate::{base::SentinelRule, logging, Error};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Id = String;

/// `limit_origin` of a rule applying to all callers.
pub const LIMIT_ORIGIN_DEFAULT: &str = "default";
/// `limit_origin` of a rule applying to the callers no other rule of the resource names.
pub const LIMIT_ORIGIN_OTHER: &str = "other";

/// RelationStrategy indicates the flow control strategy based on the relation of invocations.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationStrategy {
    /// Current means flow control by current resource directly.
    Current,
    /// Associated means flow control by the associated resource rather than current resource.
    Associated,
    /// Chain means flow control only for calls entered under the context named by `ref_resource`.
    Chain,
}

impl Default for RelationStrategy {
    fn default() -> RelationStrategy {
        RelationStrategy::Current
    }
}

/// The metric a flow rule limits.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricType {
    /// passed calls during `stat_interval_ms`
    Qps,
    /// calls in flight
    Concurrency,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::Qps
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum CalculateStrategy {
    Direct,
    WarmUp,
    #[serde(skip)]
    Custom(u8),
}

impl Default for CalculateStrategy {
    fn default() -> CalculateStrategy {
        CalculateStrategy::Direct
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum ControlStrategy {
    Reject,
    /// Throttling indicates that pending requests will be throttled,
    /// wait in queue (until free capacity is available)
    Throttling,
    #[serde(skip)]
    Custom(u8),
}

impl Default for ControlStrategy {
    fn default() -> ControlStrategy {
        ControlStrategy::Reject
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Rule describes the strategy of flow control on a resource.
pub struct Rule {
    /// `id` represents the unique ID of the rule (optional).
    pub id: Id,
    /// `resource` represents the resource name.
    pub resource: String,
    /// the caller the rule applies to, `"default"`, `"other"` or a specific origin
    pub limit_origin: String,
    pub metric_type: MetricType,
    /// the associated resource for `Associated`, the context name for `Chain`
    pub ref_resource: String,
    pub calculate_strategy: CalculateStrategy,
    pub control_strategy: ControlStrategy,
    pub relation_strategy: RelationStrategy,
    /// `threshold` means the threshold during stat_interval_ms
    /// If `stat_interval_ms` is 1000(1 second), `threshold` means QPS
    pub threshold: f64,
    pub warm_up_period_sec: u32,
    pub warm_up_cold_factor: u32,
    /// `max_queueing_time_ms` only takes effect when `control_strategy` is Throttling.
    /// When `max_queueing_time_ms` is 0, it means Throttling only controls interval of requests,
    /// and requests exceeding the threshold will be rejected directly.
    pub max_queueing_time_ms: u32,
    /// stat_interval_ms indicates the statistic interval and it's the optional setting for flow Rule.
    /// If user doesn't set stat_interval_ms, that means using default metric statistic of resource.
    /// If the stat_interval_ms user specifies can not reuse the global statistic of resource,
    /// an independent statistic structure is generated for the rule.
    pub stat_interval_ms: u32,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            limit_origin: LIMIT_ORIGIN_DEFAULT.into(),
            metric_type: MetricType::default(),
            ref_resource: String::default(),
            calculate_strategy: CalculateStrategy::default(),
            control_strategy: ControlStrategy::default(),
            relation_strategy: RelationStrategy::default(),
            threshold: 0.0,
            warm_up_period_sec: 0,
            warm_up_cold_factor: 0,
            max_queueing_time_ms: 0,
            stat_interval_ms: 0,
        }
    }
}

impl Rule {
    pub fn is_stat_reusable(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.relation_strategy == other.relation_strategy
            && self.ref_resource == other.ref_resource
            && self.stat_interval_ms == other.stat_interval_ms
            && self.need_statistic()
            && other.need_statistic()
    }

    pub fn need_statistic(&self) -> bool {
        self.metric_type == MetricType::Qps
            && (self.calculate_strategy == CalculateStrategy::WarmUp
                || self.control_strategy == ControlStrategy::Reject)
    }

    /// Whether the rule limits a specific caller rather than `"default"` or `"other"`.
    pub fn is_specific_origin(&self) -> bool {
        self.limit_origin != LIMIT_ORIGIN_DEFAULT && self.limit_origin != LIMIT_ORIGIN_OTHER
    }
}

impl SentinelRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.limit_origin.is_empty() {
            return Err(Error::msg("empty limit_origin"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        match self.relation_strategy {
            RelationStrategy::Associated if self.ref_resource.is_empty() => {
                return Err(Error::msg("ref_resource must be non empty when relation_strategy is RelationStrategy::Associated"));
            }
            RelationStrategy::Chain if self.ref_resource.is_empty() => {
                return Err(Error::msg(
                    "ref_resource must name the entrance context when relation_strategy is RelationStrategy::Chain",
                ));
            }
            _ => {}
        }
        if self.metric_type == MetricType::Concurrency
            && (self.calculate_strategy == CalculateStrategy::WarmUp
                || self.control_strategy == ControlStrategy::Throttling)
        {
            return Err(Error::msg(
                "warm up and throttling only apply to the Qps metric type",
            ));
        }
        if self.calculate_strategy == CalculateStrategy::WarmUp {
            if self.warm_up_period_sec == 0 {
                return Err(Error::msg("warm_up_period_sec must be great than 0"));
            }
            if self.warm_up_cold_factor == 1 {
                return Err(Error::msg("warm_up_cold_factor must be great than 1"));
            }
        }
        if self.stat_interval_ms > 10 * 60 * 1000 {
            logging::info!(
                "stat_interval_ms is great than 10 minutes, less than 10 minutes is recommended."
            )
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.limit_origin == other.limit_origin
            && self.metric_type == other.metric_type
            && self.ref_resource == other.ref_resource
            && self.calculate_strategy == other.calculate_strategy
            && self.control_strategy == other.control_strategy
            && self.relation_strategy == other.relation_strategy
            && self.threshold == other.threshold
            && self.warm_up_period_sec == other.warm_up_period_sec
            && self.warm_up_cold_factor == other.warm_up_cold_factor
            && self.max_queueing_time_ms == other.max_queueing_time_ms
            && self.stat_interval_ms == other.stat_interval_ms
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
    fn need_statistic() {
        let direct_reject = Rule {
            resource: "abc1".into(),
            threshold: 100.0,
            ..Default::default()
        };
        let throttling = Rule {
            resource: "abc1".into(),
            threshold: 200.0,
            control_strategy: ControlStrategy::Throttling,
            max_queueing_time_ms: 10,
            ..Default::default()
        };
        let warm_up_throttling = Rule {
            resource: "abc1".into(),
            threshold: 400.0,
            calculate_strategy: CalculateStrategy::WarmUp,
            control_strategy: ControlStrategy::Throttling,
            ..Default::default()
        };
        let concurrency = Rule {
            resource: "abc1".into(),
            threshold: 10.0,
            metric_type: MetricType::Concurrency,
            ..Default::default()
        };
        assert!(direct_reject.need_statistic());
        assert!(!throttling.need_statistic());
        assert!(warm_up_throttling.need_statistic());
        assert!(!concurrency.need_statistic());
    }

    #[test]
    fn is_stat_reusable() {
        let base = Rule {
            resource: "abc1".into(),
            threshold: 100.0,
            stat_interval_ms: 1000,
            ..Default::default()
        };
        let other_resource = Rule {
            resource: "abc2".into(),
            ..base.clone()
        };
        let associated = Rule {
            relation_strategy: RelationStrategy::Associated,
            ref_resource: "abc3".into(),
            ..base.clone()
        };
        let other_ref = Rule {
            ref_resource: "abc4".into(),
            ..associated.clone()
        };
        let other_interval = Rule {
            stat_interval_ms: 2000,
            ..base.clone()
        };
        let throttling = Rule {
            control_strategy: ControlStrategy::Throttling,
            ..base.clone()
        };
        let other_threshold = Rule {
            threshold: 200.0,
            ..base.clone()
        };
        assert!(!base.is_stat_reusable(&other_resource));
        assert!(!base.is_stat_reusable(&associated));
        assert!(!associated.is_stat_reusable(&other_ref));
        assert!(!base.is_stat_reusable(&other_interval));
        assert!(!base.is_stat_reusable(&throttling));
        assert!(base.is_stat_reusable(&other_threshold));
    }

    #[test]
    fn is_valid() {
        let bad_rules = [
            Rule {
                threshold: 1.0,
                ..Default::default()
            },
            Rule {
                threshold: -1.9,
                resource: "test".into(),
                ..Default::default()
            },
            Rule {
                threshold: 5.0,
                resource: "test".into(),
                calculate_strategy: CalculateStrategy::WarmUp,
                ..Default::default()
            },
            Rule {
                threshold: 5.0,
                resource: "test".into(),
                relation_strategy: RelationStrategy::Chain,
                ..Default::default()
            },
            Rule {
                threshold: 5.0,
                resource: "test".into(),
                metric_type: MetricType::Concurrency,
                control_strategy: ControlStrategy::Throttling,
                ..Default::default()
            },
            Rule {
                threshold: 5.0,
                resource: "test".into(),
                limit_origin: String::new(),
                ..Default::default()
            },
        ];
        for rule in bad_rules.iter() {
            assert!(rule.is_valid().is_err(), "{:?}", rule);
        }

        let good_rules = [
            Rule {
                threshold: 10.0,
                resource: "test".into(),
                calculate_strategy: CalculateStrategy::WarmUp,
                control_strategy: ControlStrategy::Throttling,
                warm_up_period_sec: 10,
                max_queueing_time_ms: 10,
                stat_interval_ms: 1000,
                ..Default::default()
            },
            Rule {
                threshold: 10.0,
                resource: "test".into(),
                metric_type: MetricType::Concurrency,
                limit_origin: "app_a".into(),
                ..Default::default()
            },
        ];
        for rule in good_rules.iter() {
            assert!(rule.is_valid().is_ok(), "{:?}", rule);
        }
    }

    #[test]
    fn equality_ignores_id() {
        let r1 = Rule {
            resource: "abc".into(),
            threshold: 1.0,
            ..Default::default()
        };
        let r2 = Rule {
            resource: "abc".into(),
            threshold: 1.0,
            ..Default::default()
        };
        assert_ne!(r1.id, r2.id);
        assert_eq!(r1, r2);
        assert!(!r1.is_specific_origin());
    }

    #[test]
    fn deserialize_with_defaults() {
        let rule: Rule =
            serde_json::from_str(r#"{"resource":"abc","threshold":10.0,"control_strategy":"Throttling"}"#)
                .unwrap();
        assert_eq!(rule.limit_origin, LIMIT_ORIGIN_DEFAULT);
        assert_eq!(rule.control_strategy, ControlStrategy::Throttling);
        assert_eq!(rule.metric_type, MetricType::Qps);
        assert!(rule.is_valid().is_ok());
    }
}
