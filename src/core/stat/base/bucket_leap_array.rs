use super::{LeapArray, MetricBucket};
use crate::base::{MetricEvent, WriteStat};
use crate::logging;
use crate::utils::curr_time_millis;
use crate::{Error, Result};

/// The resource-wide buckets a statistic node writes to.
/// Rule checks read them through `SlidingWindowMetric` views of their own interval.
pub type BucketLeapArray = LeapArray<MetricBucket>;

fn report_write_failure(op: &str, err: Error) {
    logging::FREQUENT_ERROR_ONCE.call_once(|| {
        logging::error!("[BucketLeapArray {}] the bucket of now is unavailable, {:?}", op, err);
    });
}

impl WriteStat for BucketLeapArray {
    fn add_count(&self, event: MetricEvent, count: u64) {
        if let Err(err) = self.add_count_with_time(curr_time_millis(), event, count) {
            report_write_failure("add_count", err);
        }
    }
}

impl BucketLeapArray {
    /// Records on the bucket covering `now`, taking over the slot of a stale bucket first.
    pub fn add_count_with_time(&self, now: u64, event: MetricEvent, count: u64) -> Result<()> {
        self.get_bucket_of_time(now)?.value().add(event, count);
        Ok(())
    }

    /// Raises the concurrency peak of the current bucket to `concurrency`.
    pub fn update_concurrency(&self, concurrency: u32) {
        if let Err(err) = self.update_concurrency_with_time(curr_time_millis(), concurrency) {
            report_write_failure("update_concurrency", err);
        }
    }

    pub fn update_concurrency_with_time(&self, now: u64, concurrency: u32) -> Result<()> {
        self.get_bucket_of_time(now)?
            .value()
            .update_concurrency(concurrency);
        Ok(())
    }

    pub fn count(&self, event: MetricEvent) -> u64 {
        self.count_with_time(curr_time_millis(), event)
    }

    /// Sum of `event` over the buckets still inside the interval at `now`.
    pub fn count_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.get_valid_values(now)
            .iter()
            .map(|b| b.value().get(event))
            .sum()
    }
}
