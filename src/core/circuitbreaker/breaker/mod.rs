//!  Circuit Breaker State Machine:
//!
//!                                switch to open based on rule
//!
//!             +-----------------------------------------------------------------------+
//!             |                                                                       |
//!             |                                                                       v
//!     +----------------+                   +----------------+      Trial      +----------------+
//!     |                |                   |                |<----------------|                |
//!     |                |   Trial succeed   |                |                 |                |
//!     |     Closed     |<------------------|    HalfOpen    |                 |      Open      |
//!     |                |                   |                |   Trial failed  |                |
//!     |                |                   |                +---------------->|                |
//!     +----------------+                   +----------------+                 +----------------+
//!
//! The state lives in an atomic cell, every transition is a compare-and-swap,
//! so exactly one caller performs (and reports) each transition.
//! In particular exactly one trial call is admitted per recovery window.

#![allow(clippy::wrong_self_convention)]

/// Error count
pub mod error_count;
/// Error ratio
pub mod error_ratio;
/// Slow round trip time
pub mod slow_request;
pub mod stat;

pub use error_count::*;
pub use error_ratio::*;
pub use slow_request::*;
pub use stat::*;

use super::*;
use crate::{
    base::{ContextPtr, EntryContext, SentinelEntry, Snapshot},
    logging,
    stat::MetricTrait,
    utils, Error, Result,
};
use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Arc,
};

/// States of Circuit Breaker State Machine
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Closed = 0,
    HalfOpen = 1,
    Open = 2,
}

impl Default for State {
    fn default() -> State {
        State::Closed
    }
}

impl From<u8> for State {
    fn from(v: u8) -> State {
        match v {
            1 => State::HalfOpen,
            2 => State::Open,
            _ => State::Closed,
        }
    }
}

#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: State) -> Self {
        StateCell(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> State {
        State::from(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::SeqCst)
    }

    /// Moves `from` to `to`, returns false if the current state is not `from`.
    pub fn transform(&self, from: State, to: State) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// `StateChangeListener` listens on the circuit breaker state change event
pub trait StateChangeListener: Sync + Send {
    /// on_transform_to_closed is triggered when circuit breaker state transformed to Closed.
    fn on_transform_to_closed(&self, prev: State, rule: Arc<Rule>);

    /// `on_transform_to_open` is triggered when circuit breaker state transformed to Open.
    /// The "snapshot" indicates the triggered value when the transformation occurs.
    fn on_transform_to_open(&self, prev: State, rule: Arc<Rule>, snapshot: Option<Arc<Snapshot>>);

    /// `on_transform_to_half_open` is triggered when circuit breaker state transformed to HalfOpen.
    fn on_transform_to_half_open(&self, prev: State, rule: Arc<Rule>);
}

/// `CircuitBreakerTrait` is the basic trait of circuit breaker
pub trait CircuitBreakerTrait: Send + Sync {
    /// `breaker` returns the associated inner breaker.
    fn breaker(&self) -> &BreakerBase;

    /// `stat` returns the associated statistic data structure.
    fn stat(&self) -> &Arc<CounterLeapArray>;

    /// `try_pass` acquires permission of an invocation only if it is available at the time of invocation.
    fn try_pass(&self, ctx: &EntryContext) -> bool {
        match self.current_state() {
            State::Closed => true,
            State::Open => {
                self.breaker().retry_timeout_arrived() && self.breaker().from_open_to_half_open(ctx)
            }
            State::HalfOpen => false,
        }
    }

    #[inline]
    fn next_retry_timestamp_ms(&self) -> u64 {
        self.breaker().next_retry_timestamp_ms()
    }

    /// `bound_rule` returns the associated circuit breaking rule.
    #[inline]
    fn bound_rule(&self) -> &Arc<Rule> {
        self.breaker().bound_rule()
    }

    /// `current_state` returns current state of the circuit breaker.
    #[inline]
    fn current_state(&self) -> State {
        self.breaker().current_state()
    }

    /// `on_request_complete` record a completed request with the given response time as well as error (if present),
    /// and handle state transformation of the circuit breaker.
    /// `on_request_complete` is called only when a passed invocation finished.
    fn on_request_complete(&self, rt: u64, error: &Option<Error>);

    /// the underlying metric should be with inner-mutability, thus, here we use `&self`
    fn reset_metric(&self) {
        for c in self.stat().all_counter() {
            c.value().reset()
        }
    }
}

fn notify_listeners<F: Fn(&dyn StateChangeListener)>(f: F) {
    // listeners may (un)register listeners themselves
    let listeners = state_change_listeners().read().unwrap().clone();
    for listener in &listeners {
        f(listener.as_ref());
    }
}

/// BreakerBase encompasses the common fields of circuit breaker.
#[derive(Debug)]
pub struct BreakerBase {
    rule: Arc<Rule>,
    /// retry_timeout_ms represents recovery timeout (in milliseconds) before the circuit breaker opens.
    retry_timeout_ms: u32,
    /// next_retry_timestamp_ms is the time circuit breaker could admit a trial call
    next_retry_timestamp_ms: AtomicU64,
    /// shared with the exit hook of the trial entry
    state: Arc<StateCell>,
}

impl BreakerBase {
    pub fn new(rule: Arc<Rule>) -> Self {
        BreakerBase {
            retry_timeout_ms: rule.retry_timeout_ms,
            rule,
            next_retry_timestamp_ms: AtomicU64::new(0),
            state: Arc::new(StateCell::default()),
        }
    }

    pub fn bound_rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn set_state(&self, state: State) {
        self.state.store(state);
    }

    pub fn current_state(&self) -> State {
        self.state.load()
    }

    pub fn next_retry_timestamp_ms(&self) -> u64 {
        self.next_retry_timestamp_ms.load(Ordering::SeqCst)
    }

    pub fn retry_timeout_arrived(&self) -> bool {
        utils::curr_time_millis() >= self.next_retry_timestamp_ms()
    }

    // The retry timestamp is published before the state,
    // so nobody observes Open together with the stale timestamp.
    // A caller losing the transformation restores the timestamp it replaced,
    // unless another caller has published one meanwhile.
    fn to_open(&self, prev: State, snapshot: Arc<Snapshot>) -> bool {
        let next_retry = utils::curr_time_millis() + self.retry_timeout_ms as u64;
        let replaced = self
            .next_retry_timestamp_ms
            .swap(next_retry, Ordering::SeqCst);
        if !self.state.transform(prev, State::Open) {
            let _ = self.next_retry_timestamp_ms.compare_exchange(
                next_retry,
                replaced,
                Ordering::SeqCst,
                Ordering::Relaxed,
            );
            return false;
        }
        logging::debug!(
            "[CircuitBreaker] {:?} -> Open, resource {}, triggered value {:?}",
            prev,
            self.rule.resource,
            snapshot
        );
        notify_listeners(|listener| {
            listener.on_transform_to_open(prev, Arc::clone(&self.rule), Some(Arc::clone(&snapshot)))
        });
        true
    }

    /// from_closed_to_open updates circuit breaker state machine from closed to open.
    /// Return true only if the current caller accomplished the transformation.
    pub fn from_closed_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        self.to_open(State::Closed, snapshot)
    }

    /// from_open_to_half_open updates circuit breaker state machine from open to half-open.
    /// Return true only if the current caller accomplished the transformation,
    /// its entry is then the trial call.
    ///
    /// If a later rule check blocks the trial entry, the exit hook registered here
    /// moves the breaker back to Open, so the next caller may try instead.
    pub fn from_open_to_half_open(&self, ctx: &EntryContext) -> bool {
        if !self.state.transform(State::Open, State::HalfOpen) {
            return false;
        }
        notify_listeners(|listener| {
            listener.on_transform_to_half_open(State::Open, Arc::clone(&self.rule))
        });
        match ctx.entry().and_then(|entry| entry.upgrade()) {
            Some(entry) => {
                let rule = Arc::clone(&self.rule);
                let state = Arc::clone(&self.state);
                entry.write().unwrap().when_exit(Box::new(
                    move |_entry: &SentinelEntry, ctx: ContextPtr| -> Result<()> {
                        if ctx.read().unwrap().is_blocked()
                            && state.transform(State::HalfOpen, State::Open)
                        {
                            notify_listeners(|listener| {
                                listener.on_transform_to_open(
                                    State::HalfOpen,
                                    Arc::clone(&rule),
                                    Some(Arc::new(1.0)),
                                )
                            });
                        }
                        Ok(())
                    },
                ));
            }
            None => logging::error!(
                "[CircuitBreaker from_open_to_half_open] Entry is None, the trial call can not be rolled back, rule: {:?}",
                self.rule,
            ),
        }
        true
    }

    /// from_half_open_to_open updates circuit breaker state machine from half-open to open.
    /// Return true only if the current caller accomplished the transformation.
    pub fn from_half_open_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        self.to_open(State::HalfOpen, snapshot)
    }

    /// from_half_open_to_closed updates circuit breaker state machine from half-open to closed
    /// Return true only if the current caller accomplished the transformation.
    pub fn from_half_open_to_closed(&self) -> bool {
        if !self.state.transform(State::HalfOpen, State::Closed) {
            return false;
        }
        logging::debug!(
            "[CircuitBreaker] HalfOpen -> Closed, resource {}",
            self.rule.resource
        );
        notify_listeners(|listener| {
            listener.on_transform_to_closed(State::HalfOpen, Arc::clone(&self.rule))
        });
        true
    }

    /// Applies the outcome of a completed request to the state machine.
    /// `bad` tells whether the request itself was slow or failed,
    /// `value` is the windowed metric compared with the threshold when closed.
    pub(crate) fn handle_complete<T: CircuitBreakerTrait + ?Sized>(
        &self,
        breaker: &T,
        bad: bool,
        total: u64,
        value: f64,
    ) {
        match self.current_state() {
            State::HalfOpen => {
                if bad {
                    self.from_half_open_to_open(Arc::new(value));
                } else if self.from_half_open_to_closed() {
                    breaker.reset_metric();
                }
            }
            State::Closed => {
                if total >= self.rule.min_request_amount && self.rule.exceeds_threshold(value) {
                    self.from_closed_to_open(Arc::new(value));
                }
            }
            State::Open => {}
        }
    }
}

#[cfg(test)]
pub(crate) use test::*;
