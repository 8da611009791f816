//! `WarmUpCalculator` is based on the **Token Bucket** algorithm.
//!
//! A cold resource starts with a full bucket and an allowed threshold of `threshold / cold_factor`.
//! Passed calls drain the bucket once per second, and the threshold grows
//! linearly towards `threshold` while the stored tokens fall to the warning line.
use super::{Calculator, Rule};
use crate::base::{MetricEvent, ReadStat};
use crate::{config, logging, utils};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Debug)]
pub struct WarmUpCalculator {
    threshold: f64,
    cold_factor: u32,
    warning_token: u64,
    max_token: u64,
    slope: f64,
    stored_tokens: AtomicU64,
    last_filled_time: AtomicU64,
}

impl WarmUpCalculator {
    pub fn new(rule: Arc<Rule>) -> Self {
        let mut cold_factor = rule.warm_up_cold_factor;
        if cold_factor <= 1 {
            logging::warn!(
                "[WarmUpCalculator new] warm_up_cold_factor is not set, use the default value {}",
                config::WARM_UP_COLD_FACTOR
            );
            cold_factor = config::WARM_UP_COLD_FACTOR;
        }
        let threshold = rule.threshold;
        let warm_up_period = rule.warm_up_period_sec as f64;

        let cold_factor_plus = (cold_factor + 1) as f64;
        let cold_factor_minus = (cold_factor - 1) as f64;
        let warning_token = (warm_up_period * threshold / cold_factor_minus) as u64;
        let max_token = warning_token + 2 * (warm_up_period * threshold / cold_factor_plus) as u64;
        let slope = if threshold > 0.0 {
            cold_factor_minus / threshold / (max_token - warning_token).max(1) as f64
        } else {
            0.0
        };

        WarmUpCalculator {
            threshold,
            cold_factor,
            warning_token,
            max_token,
            slope,
            stored_tokens: AtomicU64::new(0),
            last_filled_time: AtomicU64::new(0),
        }
    }

    /// Refills the bucket at most once per second.
    /// Only the caller winning the update of `last_filled_time` refills,
    /// so a second is never accounted twice.
    fn sync_token(&self, pass_qps: f64) {
        let mut curr_time = utils::curr_time_millis();
        curr_time -= curr_time % 1000;

        let old_last_filled_time = self.last_filled_time.load(Ordering::SeqCst);
        if curr_time <= old_last_filled_time {
            return;
        }
        if self
            .last_filled_time
            .compare_exchange(
                old_last_filled_time,
                curr_time,
                Ordering::SeqCst,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return;
        }

        let new_value = self.cool_down_tokens(curr_time, old_last_filled_time, pass_qps);
        self.stored_tokens
            .store(new_value.saturating_sub(pass_qps as u64), Ordering::SeqCst);
    }

    fn cool_down_tokens(&self, curr_time: u64, last_filled_time: u64, pass_qps: f64) -> u64 {
        let old_value = self.stored_tokens.load(Ordering::SeqCst);
        let mut new_value = old_value;
        // tokens are only added while the consumption is far below the warning line
        if old_value < self.warning_token
            || pass_qps < (self.threshold / self.cold_factor as f64).floor()
        {
            let added = (curr_time - last_filled_time) as f64 * self.threshold / 1000.0;
            new_value = old_value.saturating_add(added as u64);
        }
        std::cmp::min(new_value, self.max_token)
    }
}

impl Calculator for WarmUpCalculator {
    fn calculate_allowed_threshold(
        &self,
        metric: &dyn ReadStat,
        _batch_count: u32,
        _flag: i32,
    ) -> f64 {
        let previous_qps = metric.qps_previous(MetricEvent::Pass);
        self.sync_token(previous_qps);
        let rest_token = self.stored_tokens.load(Ordering::SeqCst);
        if rest_token >= self.warning_token && self.threshold > 0.0 {
            let above_token = rest_token - self.warning_token;
            // warning qps
            utils::next_after(1.0 / (above_token as f64 * self.slope + 1.0 / self.threshold))
        } else {
            self.threshold
        }
    }
}
