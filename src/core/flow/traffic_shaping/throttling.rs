//! Throttling indicates that pending requests will be throttled,
//! wait in queue (until free capacity is available)

use super::{Checker, Rule};
use crate::base::{BlockType, ReadStat, StatNode, TokenResult};
use crate::utils;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

const BLOCK_MSG_THRESHOLD: &str = "flow throttling check blocked, threshold is <= 0.0";
const BLOCK_MSG_QUEUEING: &str = "flow throttling check blocked, estimated queueing time exceeds max queueing time";

/// Passes calls one `interval` apart, where `interval = stat_interval / threshold` per unit of batch.
/// Calls arriving earlier reserve the next free time point and wait for it,
/// as long as the wait stays within `max_queueing_time_ms`.
/// Reservations are handed out in arrival order.
#[derive(Debug)]
pub struct ThrottlingChecker {
    max_queueing_time_ns: i64,
    stat_interval_ns: i64,
    last_passed_time: AtomicI64,
}

impl ThrottlingChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let stat_interval_ms = if rule.stat_interval_ms == 0 {
            1000
        } else {
            rule.stat_interval_ms
        };
        ThrottlingChecker {
            max_queueing_time_ns: utils::milli2nano(rule.max_queueing_time_ms) as i64,
            stat_interval_ns: utils::milli2nano(stat_interval_ms) as i64,
            last_passed_time: AtomicI64::new(0),
        }
    }

    fn blocked(rule: &Arc<Rule>, msg: &str, value: f64) -> TokenResult {
        TokenResult::new_blocked_with_cause(BlockType::Flow, msg.into(), rule.clone(), Arc::new(value))
    }
}

impl Checker for ThrottlingChecker {
    fn do_check(
        &self,
        rule: &Arc<Rule>,
        _metric: &dyn ReadStat,
        _node: &Arc<dyn StatNode>,
        batch_count: u32,
        threshold: f64,
    ) -> TokenResult {
        if batch_count == 0 {
            return TokenResult::new_pass();
        }
        if threshold <= 0.0 {
            return Self::blocked(rule, BLOCK_MSG_THRESHOLD, threshold);
        }
        // a batch above the threshold, or a threshold below one call per interval,
        // only stretches the spacing
        let batch_count = batch_count as f64;

        // nanoseconds, so that the queueing time is controlled accurately
        let curr_nano = utils::curr_time_nanos() as i64;
        // the interval between two requests
        let interval_ns = (batch_count.ceil() / threshold * (self.stat_interval_ns as f64)) as i64;

        let loaded_last_passed_time = self.last_passed_time.load(Ordering::SeqCst);
        let expected_time = loaded_last_passed_time + interval_ns;
        // idle for at least one interval, pass right now
        if expected_time <= curr_nano
            && self
                .last_passed_time
                .compare_exchange(
                    loaded_last_passed_time,
                    curr_nano,
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok()
        {
            return TokenResult::new_pass();
        }

        let estimated_queue_duration =
            self.last_passed_time.load(Ordering::SeqCst) + interval_ns - curr_nano;
        if estimated_queue_duration > self.max_queueing_time_ns {
            return Self::blocked(rule, BLOCK_MSG_QUEUEING, estimated_queue_duration as f64);
        }
        // reserve the next time point
        let expected_time = self
            .last_passed_time
            .fetch_add(interval_ns, Ordering::SeqCst)
            + interval_ns;
        let estimated_queue_duration = expected_time - curr_nano;
        if estimated_queue_duration > self.max_queueing_time_ns {
            // give the reservation back
            self.last_passed_time
                .fetch_sub(interval_ns, Ordering::SeqCst);
            return Self::blocked(rule, BLOCK_MSG_QUEUEING, estimated_queue_duration as f64);
        }
        TokenResult::new_should_wait(estimated_queue_duration.max(0) as u64)
    }
}
