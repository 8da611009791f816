use super::*;

/// ErrorRatioBreaker trips when the ratio of failed requests exceeds the threshold.
#[derive(Debug)]
pub struct ErrorRatioBreaker {
    breaker: BreakerBase,
    // stat is shared with the breaker of a stat reusable rule, so we take Arc
    stat: Arc<CounterLeapArray>,
}

impl ErrorRatioBreaker {
    pub fn new(rule: Arc<Rule>) -> Result<Self> {
        let stat = CounterLeapArray::new(
            rule.get_rule_stat_sliding_window_bucket_count(),
            rule.stat_interval_ms,
        )?;
        Ok(Self::new_with_stat(rule, Arc::new(stat)))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<CounterLeapArray>) -> Self {
        Self {
            breaker: BreakerBase::new(rule),
            stat,
        }
    }
}

impl CircuitBreakerTrait for ErrorRatioBreaker {
    fn breaker(&self) -> &BreakerBase {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, _rt: u64, err: &Option<Error>) {
        let counter = match self.stat.current_counter() {
            Ok(counter) => counter,
            Err(err) => {
                logging::error!(
                    "[ErrorRatioBreaker on_request_complete] Fail to get current counter, rule: {:?}, reason: {:?}",
                    self.breaker.bound_rule(),
                    err
                );
                return;
            }
        };
        let failed = err.is_some();
        counter.value().record(failed);

        let (error_count, total_count) = self.stat.sum_counters();
        let error_ratio = if total_count == 0 {
            0.0
        } else {
            error_count as f64 / total_count as f64
        };
        self.breaker
            .handle_complete(self, failed, total_count, error_ratio);
    }
}
