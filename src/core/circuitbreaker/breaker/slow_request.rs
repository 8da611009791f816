use super::*;

/// SlowRtBreaker trips when the ratio of slow requests, whose response time
/// exceeds `max_allowed_rt_ms`, exceeds the threshold.
#[derive(Debug)]
pub struct SlowRtBreaker {
    breaker: BreakerBase,
    max_allowed_rt: u64,
    // stat is shared with the breaker of a stat reusable rule, so we take Arc
    stat: Arc<CounterLeapArray>,
}

impl SlowRtBreaker {
    pub fn new(rule: Arc<Rule>) -> Result<Self> {
        let stat = CounterLeapArray::new(
            rule.get_rule_stat_sliding_window_bucket_count(),
            rule.stat_interval_ms,
        )?;
        Ok(Self::new_with_stat(rule, Arc::new(stat)))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<CounterLeapArray>) -> Self {
        Self {
            max_allowed_rt: rule.max_allowed_rt_ms,
            breaker: BreakerBase::new(rule),
            stat,
        }
    }
}

impl CircuitBreakerTrait for SlowRtBreaker {
    fn breaker(&self) -> &BreakerBase {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, rt: u64, _err: &Option<Error>) {
        let counter = match self.stat.current_counter() {
            Ok(counter) => counter,
            Err(err) => {
                logging::error!(
                    "[SlowRtBreaker on_request_complete] Fail to get current counter, rule: {:?}, reason: {:?}",
                    self.breaker.bound_rule(),
                    err
                );
                return;
            }
        };
        let slow = rt > self.max_allowed_rt;
        counter.value().record(slow);

        let (slow_count, total_count) = self.stat.sum_counters();
        let slow_ratio = if total_count == 0 {
            0.0
        } else {
            slow_count as f64 / total_count as f64
        };
        self.breaker.handle_complete(self, slow, total_count, slow_ratio);
    }
}
