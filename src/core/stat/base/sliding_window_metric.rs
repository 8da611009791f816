use super::{BucketLeapArray, BucketWrap, MetricBucket};
use crate::base::{MetricEvent, ReadStat, WindowSpec, DEFAULT_STATISTIC_MAX_RT};
use crate::utils::curr_time_millis;
use crate::Result;
use std::cmp;
use std::sync::Arc;

/// SlidingWindowMetric is a read-only view over a `BucketLeapArray`.
/// Several views with different intervals may share the same array,
/// the array is written per resource while the views are read by rule checks.
#[derive(Debug)]
pub struct SlidingWindowMetric {
    bucket_len_ms: u32,
    sample_count: u32,
    interval_ms: u32,
    inner: Arc<BucketLeapArray>,
}

impl SlidingWindowMetric {
    pub fn new(sample_count: u32, interval_ms: u32, inner: Arc<BucketLeapArray>) -> Result<Self> {
        let window = WindowSpec::new(sample_count, interval_ms);
        window.check_readable_from(&WindowSpec::new(inner.sample_count(), inner.interval_ms()))?;
        Ok(SlidingWindowMetric {
            bucket_len_ms: window.bucket_len_ms(),
            sample_count,
            interval_ms,
            inner,
        })
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.bucket_len_ms
    }

    /// Get the start time range of the inner buckets covered by the window ending at `t_ms`.
    /// The actual time span is: [start, end + inner bucket length).
    pub(crate) fn bucket_start_range(&self, t_ms: u64) -> (u64, u64) {
        let end = self.inner.calculate_start_stamp(t_ms);
        let start = (end + self.inner.bucket_len_ms() as u64).saturating_sub(self.interval_ms as u64);
        (start, end)
    }

    pub(crate) fn satisfied_buckets(&self, now: u64) -> Vec<Arc<BucketWrap<MetricBucket>>> {
        let (start, end) = self.bucket_start_range(now);
        self.inner
            .get_valid_values_conditional(now, &move |curr: u64| start <= curr && curr <= end)
    }

    pub fn interval_s(&self) -> f64 {
        self.interval_ms as f64 / 1000.0
    }

    pub fn sum_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.satisfied_buckets(now)
            .iter()
            .map(|b| b.value().get(event))
            .sum()
    }

    pub fn qps_with_time(&self, now: u64, event: MetricEvent) -> f64 {
        self.sum_with_time(now, event) as f64 / self.interval_s()
    }

    pub fn max_of_single_bucket(&self, event: MetricEvent) -> u64 {
        let mut res = 0;
        for b in self.satisfied_buckets(curr_time_millis()) {
            res = cmp::max(res, b.value().get(event));
        }
        res
    }

    pub fn max_concurrency(&self) -> u32 {
        let mut res = 0;
        for b in self.satisfied_buckets(curr_time_millis()) {
            res = cmp::max(res, b.value().max_concurrency());
        }
        res
    }

    pub fn min_rt_with_time(&self, now: u64) -> u64 {
        let mut res = DEFAULT_STATISTIC_MAX_RT;
        for b in self.satisfied_buckets(now) {
            res = cmp::min(res, b.value().min_rt());
        }
        res
    }
}

impl ReadStat for SlidingWindowMetric {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.qps_with_time(curr_time_millis(), event)
    }

    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.qps_with_time(
            curr_time_millis().saturating_sub(self.bucket_len_ms as u64),
            event,
        )
    }

    fn sum(&self, event: MetricEvent) -> u64 {
        self.sum_with_time(curr_time_millis(), event)
    }

    fn avg_rt(&self) -> f64 {
        let now = curr_time_millis();
        let completed = self.sum_with_time(now, MetricEvent::Complete);
        if completed == 0 {
            0f64
        } else {
            self.sum_with_time(now, MetricEvent::Rt) as f64 / completed as f64
        }
    }

    fn min_rt(&self) -> f64 {
        self.min_rt_with_time(curr_time_millis()) as f64
    }
}
