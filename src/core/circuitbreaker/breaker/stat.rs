use crate::{
    stat::{BucketWrap, LeapArray, MetricTrait},
    Result,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Counter records the "bad" requests (slow or failed, depending on the strategy)
/// and all completed requests of one bucket.
#[derive(Debug, Default)]
pub struct Counter {
    pub(crate) target: AtomicU64,
    pub(crate) total: AtomicU64,
}

impl Counter {
    pub fn target(&self) -> u64 {
        self.target.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub(crate) fn record(&self, is_target: bool) {
        if is_target {
            self.target.fetch_add(1, Ordering::SeqCst);
        }
        self.total.fetch_add(1, Ordering::SeqCst);
    }
}

impl MetricTrait for Counter {
    fn reset(&self) {
        self.target.store(0, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
    }
}

pub type CounterLeapArray = LeapArray<Counter>;

impl CounterLeapArray {
    pub fn current_counter(&self) -> Result<Arc<BucketWrap<Counter>>> {
        self.current_bucket()
    }

    pub fn all_counter(&self) -> Vec<Arc<BucketWrap<Counter>>> {
        self.get_current_values()
    }

    /// Sums of (target, total) over the live buckets.
    pub fn sum_counters(&self) -> (u64, u64) {
        self.all_counter()
            .iter()
            .fold((0, 0), |(target, total), c| {
                (target + c.value().target(), total + c.value().total())
            })
    }
}
