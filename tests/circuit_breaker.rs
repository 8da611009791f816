use sentinel_pipeline::utils::sleep_for_ms;
use sentinel_pipeline::{
    base::{BlockType, Snapshot},
    circuitbreaker::{self, BreakerStrategy, CircuitBreakerTrait, State, StateChangeListener},
    trace_error, EntryBuilder, Error,
};
use std::sync::{Arc, Mutex};

const RETRY_TIMEOUT_MS: u32 = 200;

fn error_ratio_rule(resource: &str) -> Arc<circuitbreaker::Rule> {
    Arc::new(circuitbreaker::Rule {
        resource: resource.into(),
        strategy: BreakerStrategy::ErrorRatio,
        retry_timeout_ms: RETRY_TIMEOUT_MS,
        min_request_amount: 4,
        stat_interval_ms: 10000,
        threshold: 0.5,
        ..Default::default()
    })
}

fn call(resource: &str, failed: bool) -> Result<(), BlockType> {
    let entry = EntryBuilder::new(resource.into())
        .build()
        .map_err(|err| err.block_type())?;
    if failed {
        trace_error(&entry, Error::msg("biz error"));
    }
    entry.exit().unwrap();
    Ok(())
}

fn trip(resource: &str) {
    for _ in 0..4 {
        call(resource, true).unwrap();
    }
    assert_eq!(call(resource, false), Err(BlockType::Degrade));
}

fn breaker_state(resource: &str) -> State {
    circuitbreaker::get_breakers_of_resource(resource)[0].current_state()
}

#[derive(Default)]
struct RecordingListener {
    resource: String,
    transitions: Mutex<Vec<(State, State)>>,
}

impl RecordingListener {
    fn record(&self, rule: &circuitbreaker::Rule, prev: State, next: State) {
        if rule.resource == self.resource {
            self.transitions.lock().unwrap().push((prev, next));
        }
    }
}

impl StateChangeListener for RecordingListener {
    fn on_transform_to_closed(&self, prev: State, rule: Arc<circuitbreaker::Rule>) {
        self.record(&rule, prev, State::Closed);
    }

    fn on_transform_to_open(
        &self,
        prev: State,
        rule: Arc<circuitbreaker::Rule>,
        _snapshot: Option<Arc<Snapshot>>,
    ) {
        self.record(&rule, prev, State::Open);
    }

    fn on_transform_to_half_open(&self, prev: State, rule: Arc<circuitbreaker::Rule>) {
        self.record(&rule, prev, State::HalfOpen);
    }
}

#[test]
fn trial_recovers() {
    let resource = "cb_trial_recovers";
    let listener = Arc::new(RecordingListener {
        resource: resource.into(),
        ..Default::default()
    });
    circuitbreaker::register_state_change_listeners(vec![
        listener.clone() as Arc<dyn StateChangeListener>
    ]);
    circuitbreaker::load_rules_of_resource(resource, vec![error_ratio_rule(resource)]).unwrap();

    trip(resource);
    assert_eq!(breaker_state(resource), State::Open);

    sleep_for_ms(RETRY_TIMEOUT_MS as u64 + 50);
    let trial = EntryBuilder::new(resource.into()).build().unwrap();
    assert_eq!(breaker_state(resource), State::HalfOpen);
    // only one trial call is admitted while half-open
    let other = std::thread::spawn(move || call(resource, false))
        .join()
        .unwrap();
    assert_eq!(other, Err(BlockType::Degrade));
    trial.exit().unwrap();

    assert_eq!(breaker_state(resource), State::Closed);
    call(resource, false).unwrap();
    assert_eq!(
        *listener.transitions.lock().unwrap(),
        vec![
            (State::Closed, State::Open),
            (State::Open, State::HalfOpen),
            (State::HalfOpen, State::Closed),
        ]
    );
}

#[test]
fn failed_trial_reopens() {
    let resource = "cb_failed_trial_reopens";
    circuitbreaker::load_rules_of_resource(resource, vec![error_ratio_rule(resource)]).unwrap();

    trip(resource);
    sleep_for_ms(RETRY_TIMEOUT_MS as u64 + 50);
    call(resource, true).unwrap();
    assert_eq!(breaker_state(resource), State::Open);
    // the retry timeout starts over
    assert_eq!(call(resource, false), Err(BlockType::Degrade));
    sleep_for_ms(RETRY_TIMEOUT_MS as u64 + 50);
    call(resource, false).unwrap();
    assert_eq!(breaker_state(resource), State::Closed);
}

#[test]
fn below_min_request_amount() {
    let resource = "cb_below_min_request_amount";
    circuitbreaker::load_rules_of_resource(resource, vec![error_ratio_rule(resource)]).unwrap();
    for _ in 0..3 {
        call(resource, true).unwrap();
    }
    assert_eq!(breaker_state(resource), State::Closed);
    call(resource, false).unwrap();
}

#[test]
fn error_count() {
    let resource = "cb_error_count";
    circuitbreaker::load_rules_of_resource(
        resource,
        vec![Arc::new(circuitbreaker::Rule {
            resource: resource.into(),
            strategy: BreakerStrategy::ErrorCount,
            retry_timeout_ms: 10000,
            min_request_amount: 1,
            stat_interval_ms: 10000,
            threshold: 3.0,
            ..Default::default()
        })],
    )
    .unwrap();
    for _ in 0..5 {
        call(resource, false).unwrap();
    }
    // the count must exceed the threshold
    for _ in 0..3 {
        call(resource, true).unwrap();
    }
    call(resource, false).unwrap();
    call(resource, true).unwrap();
    assert_eq!(call(resource, false), Err(BlockType::Degrade));
    circuitbreaker::clear_rules_of_resource(resource);
    call(resource, false).unwrap();
}
