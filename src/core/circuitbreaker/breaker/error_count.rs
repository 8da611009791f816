use super::*;

/// ErrorCountBreaker trips when the amount of failed requests exceeds the threshold.
#[derive(Debug)]
pub struct ErrorCountBreaker {
    breaker: BreakerBase,
    // stat is shared with the breaker of a stat reusable rule, so we take Arc
    stat: Arc<CounterLeapArray>,
}

impl ErrorCountBreaker {
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

impl CircuitBreakerTrait for ErrorCountBreaker {
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
                    "[ErrorCountBreaker on_request_complete] Fail to get current counter, rule: {:?}, reason: {:?}",
                    self.breaker.bound_rule(),
                    err
                );
                return;
            }
        };
        let failed = err.is_some();
        counter.value().record(failed);

        let (error_count, total_count) = self.stat.sum_counters();
        self.breaker
            .handle_complete(self, failed, total_count, error_count as f64);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trip_and_recover() {
        let b = ErrorCountBreaker::new(Arc::new(Rule {
            resource: "error_count_trip".into(),
            strategy: BreakerStrategy::ErrorCount,
            retry_timeout_ms: 3000,
            min_request_amount: 1,
            stat_interval_ms: 10000,
            threshold: 2.0,
            ..Default::default()
        }))
        .unwrap();
        b.on_request_complete(1, &Some(Error::msg("biz error")));
        b.on_request_complete(1, &Some(Error::msg("biz error")));
        assert_eq!(b.current_state(), State::Closed);
        b.on_request_complete(1, &Some(Error::msg("biz error")));
        assert_eq!(b.current_state(), State::Open);

        // completions of requests admitted before the trip change nothing
        b.on_request_complete(1, &None);
        assert_eq!(b.current_state(), State::Open);

        b.breaker().set_state(State::HalfOpen);
        b.on_request_complete(1, &None);
        assert_eq!(b.current_state(), State::Closed);
        assert_eq!(b.stat().sum_counters(), (0, 0));
    }
}
