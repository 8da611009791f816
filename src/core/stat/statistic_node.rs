use super::{BucketLeapArray, SlidingWindowMetric};
use crate::{
    base::{
        ConcurrencyStat, MetricEvent, ReadStat, StatNode, WriteStat, DEFAULT_INTERVAL_MS,
        DEFAULT_INTERVAL_MS_TOTAL, DEFAULT_SAMPLE_COUNT, DEFAULT_SAMPLE_COUNT_TOTAL,
    },
    config, logging, Result,
};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// StatisticNode keeps the windowed counters of one node of the call tree.
///
/// Writes go to a resource-wide leap array (`sample_count_total` buckets over
/// `interval_ms_total`), reads of the default metric go through a shorter sliding window
/// view over the same buckets.
#[derive(Debug)]
pub struct StatisticNode {
    pub(crate) sample_count: u32,
    pub(crate) interval_ms: u32,
    pub(crate) concurrency: AtomicU32,
    pub(crate) arr: Arc<BucketLeapArray>,
    pub(crate) metric: Arc<SlidingWindowMetric>,
}

impl Default for StatisticNode {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticNode {
    /// Builds the node with the globally configured window geometry,
    /// falling back to the default geometry if the configured one is unusable.
    pub fn new() -> Self {
        match Self::with_geometry(
            config::global_stat_sample_count_total(),
            config::global_stat_interval_ms_total(),
            config::metric_stat_sample_count(),
            config::metric_stat_interval_ms(),
        ) {
            Ok(node) => node,
            Err(err) => {
                logging::FREQUENT_ERROR_ONCE.call_once(|| {
                    logging::error!(
                        "[StatisticNode new] invalid statistic geometry, use the default one. {:?}",
                        err
                    );
                });
                Self::default_geometry()
            }
        }
    }

    pub fn with_geometry(
        sample_count_total: u32,
        interval_ms_total: u32,
        sample_count: u32,
        interval_ms: u32,
    ) -> Result<Self> {
        let arr = Arc::new(BucketLeapArray::new(sample_count_total, interval_ms_total)?);
        let metric = Arc::new(SlidingWindowMetric::new(
            sample_count,
            interval_ms,
            arr.clone(),
        )?);
        Ok(StatisticNode {
            sample_count,
            interval_ms,
            concurrency: AtomicU32::new(0),
            arr,
            metric,
        })
    }

    fn default_geometry() -> Self {
        let arr = Arc::new(
            BucketLeapArray::new(DEFAULT_SAMPLE_COUNT_TOTAL, DEFAULT_INTERVAL_MS_TOTAL)
                .unwrap_or_else(|_| unreachable!("the default geometry is valid")),
        );
        let metric = Arc::new(
            SlidingWindowMetric::new(DEFAULT_SAMPLE_COUNT, DEFAULT_INTERVAL_MS, arr.clone())
                .unwrap_or_else(|_| unreachable!("the default geometry is reusable")),
        );
        StatisticNode {
            sample_count: DEFAULT_SAMPLE_COUNT,
            interval_ms: DEFAULT_INTERVAL_MS,
            concurrency: AtomicU32::new(0),
            arr,
            metric,
        }
    }

    pub fn increase_pass(&self, count: u32) {
        self.add_count(MetricEvent::Pass, count as u64);
    }

    pub fn increase_block(&self, count: u32) {
        self.add_count(MetricEvent::Block, count as u64);
    }

    pub fn increase_exception(&self, count: u32) {
        self.add_count(MetricEvent::Error, count as u64);
    }

    /// Records `count` completed calls with the total response time `rt`.
    pub fn add_rt_and_success(&self, rt: u64, count: u32) {
        self.add_count(MetricEvent::Rt, rt);
        self.add_count(MetricEvent::Complete, count as u64);
    }

    pub fn pass_qps(&self) -> f64 {
        self.metric.qps(MetricEvent::Pass)
    }

    pub fn block_qps(&self) -> f64 {
        self.metric.qps(MetricEvent::Block)
    }

    pub fn exception_qps(&self) -> f64 {
        self.metric.qps(MetricEvent::Error)
    }

    pub fn success_qps(&self) -> f64 {
        self.metric.qps(MetricEvent::Complete)
    }

    pub fn default_metric(&self) -> Arc<dyn ReadStat> {
        self.metric.clone()
    }

    pub fn max_avg(&self, event: MetricEvent) -> f64 {
        self.metric.max_of_single_bucket(event) as f64 * self.sample_count as f64
            / self.interval_ms as f64
            * 1000f64
    }

    pub fn max_concurrency(&self) -> u32 {
        self.metric.max_concurrency()
    }
}

impl ReadStat for StatisticNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.metric.qps(event)
    }
    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.metric.qps_previous(event)
    }
    fn sum(&self, event: MetricEvent) -> u64 {
        self.metric.sum(event)
    }
    fn min_rt(&self) -> f64 {
        self.metric.min_rt()
    }
    fn avg_rt(&self) -> f64 {
        self.metric.avg_rt()
    }
}

impl WriteStat for StatisticNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.arr.add_count(event, count);
    }
}

impl ConcurrencyStat for StatisticNode {
    fn current_concurrency(&self) -> u32 {
        self.concurrency.load(Ordering::SeqCst)
    }

    fn increase_concurrency(&self) {
        self.arr
            .update_concurrency(self.concurrency.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn decrease_concurrency(&self) {
        // never wraps below zero on an unbalanced exit
        let _ = self
            .concurrency
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));
    }
}

impl StatNode for StatisticNode {
    fn generate_read_stat(&self, sample_count: u32, interval_ms: u32) -> Result<Arc<dyn ReadStat>> {
        let stat = SlidingWindowMetric::new(sample_count, interval_ms, self.arr.clone())?;
        Ok(Arc::new(stat))
    }
}
