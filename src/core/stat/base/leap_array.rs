use super::MetricTrait;
use crate::base::WindowSpec;
use crate::utils::curr_time_millis;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const DEFAULT_TIME: u64 = 0;

pub type TimePredicate = dyn Fn(u64) -> bool;

/// BucketWrap represent a slot to record metrics
/// The metric itself should be atomic
/// The scope of time is [start_stamp, start_stamp+bucket_length)
#[derive(Debug, Default)]
pub struct BucketWrap<T: MetricTrait> {
    // The start timestamp of this statistic bucket wrapper.
    start_stamp: AtomicU64,
    // The actual data structure to record the metrics (e.g. MetricBucket).
    value: T,
}

impl<T: MetricTrait> BucketWrap<T> {
    pub fn new(start_stamp: u64) -> Self {
        BucketWrap {
            start_stamp: AtomicU64::new(start_stamp),
            value: T::default(),
        }
    }

    pub fn start_stamp(&self) -> u64 {
        self.start_stamp.load(Ordering::SeqCst)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn reset_start_stamp(&self, start_stamp: u64) {
        self.start_stamp.store(start_stamp, Ordering::SeqCst);
    }

    pub fn reset_value(&self) {
        self.value.reset();
    }

    /// A bucket is deprecated once a whole interval has passed since its start.
    pub fn is_deprecated(&self, now: u64, interval: u64) -> bool {
        let start = self.start_stamp.load(Ordering::SeqCst);
        now >= start && now - start >= interval
    }
}

/// The BucketWrap leap array,
/// it treats the inner array as a ring
/// sample_count represent the number of BucketWrap
/// interval_ms represent the interval of LeapArray.
/// For example, bucket_len_ms is 200ms, interval_ms is 1000ms, so sample_count is 5.
///
/// A deprecated bucket is not reallocated but reset in place by the first writer touching it,
/// the per-bucket lock only serializes such resets.
#[derive(Debug)]
pub struct LeapArray<T: MetricTrait> {
    bucket_len_ms: u32,
    sample_count: u32,
    interval_ms: u32,
    pub(crate) array: Vec<Arc<BucketWrap<T>>>,
    mutex: Vec<Mutex<()>>,
}

impl<T: MetricTrait> LeapArray<T> {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        let window = WindowSpec::new(sample_count, interval_ms);
        window.validate()?;
        let mut array = Vec::with_capacity(sample_count as usize);
        let mut mutex = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            array.push(Arc::new(BucketWrap::default()));
            mutex.push(Mutex::new(()));
        }
        Ok(LeapArray {
            bucket_len_ms: window.bucket_len_ms(),
            sample_count,
            interval_ms,
            array,
            mutex,
        })
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.bucket_len_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// The value is cleared before the new start is published,
    /// so writers of the new window never see counts of the old one.
    pub fn reset_bucket(&self, idx: usize, start_stamp: u64) {
        self.array[idx].reset_value();
        self.array[idx].reset_start_stamp(start_stamp);
    }

    pub fn current_bucket(&self) -> Result<Arc<BucketWrap<T>>> {
        self.get_bucket_of_time(curr_time_millis())
    }

    pub fn get_bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<T>>> {
        let idx = self.time2idx(now) as usize;
        let target_start = self.calculate_start_stamp(now);
        /*
        Get bucket item at given time from the array.
        - (1) Bucket is up-to-date, then just return the bucket.
        - (2) Bucket is absent or deprecated, then the writer holding the bucket lock resets it,
              the others wait until the reset is visible.
        - (3) Bucket is ahead of the given time, the time is too old to be recorded.

                    B0       B1      B2     B3      B4
                ||_______|_______|_______|_______|_______||___
                200     400     600     800     1000    1200  timestamp
                                            ^
                                         time=888
        */
        let bucket = &self.array[idx];
        loop {
            let start = bucket.start_stamp();
            if start == target_start {
                return Ok(Arc::clone(bucket));
            } else if start == DEFAULT_TIME || target_start > start {
                if let Ok(_guard) = self.mutex[idx].try_lock() {
                    // another writer may have reset it between the check and the lock
                    let start = bucket.start_stamp();
                    if start == target_start {
                        return Ok(Arc::clone(bucket));
                    }
                    if start == DEFAULT_TIME || target_start > start {
                        self.reset_bucket(idx, target_start);
                        return Ok(Arc::clone(bucket));
                    }
                } else {
                    std::thread::yield_now();
                }
            } else {
                return Err(Error::msg("invalid time stamp, cannot find bucket"));
            }
        }
    }

    /// compute the start timestamp of current bucket
    pub(crate) fn calculate_start_stamp(&self, now: u64) -> u64 {
        now - now % (self.bucket_len_ms as u64)
    }

    pub(crate) fn time2idx(&self, now: u64) -> u64 {
        let idx = now / (self.bucket_len_ms as u64);
        idx % (self.sample_count as u64)
    }

    pub fn get_current_values(&self) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values(curr_time_millis())
    }

    ///  Get all BucketWrap between [current time - leap array interval, current time]
    pub fn get_valid_values(&self, now: u64) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values_conditional(now, &|_| true)
    }

    pub fn get_valid_values_conditional(
        &self,
        now: u64,
        condition: &TimePredicate,
    ) -> Vec<Arc<BucketWrap<T>>> {
        self.array
            .iter()
            .filter(|bucket| {
                let start = bucket.start_stamp();
                start != DEFAULT_TIME
                    && start <= now
                    && !bucket.is_deprecated(now, self.interval_ms as u64)
                    && condition(start)
            })
            .cloned()
            .collect()
    }
}
