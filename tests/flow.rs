use rand;
use sentinel_pipeline::utils::sleep_for_ms;
use sentinel_pipeline::{
    base::{BlockType, TrafficType},
    flow, EntryBuilder,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn qps_rule(resource: &str, threshold: f64) -> Arc<flow::Rule> {
    Arc::new(flow::Rule {
        resource: resource.into(),
        threshold,
        calculate_strategy: flow::CalculateStrategy::Direct,
        control_strategy: flow::ControlStrategy::Reject,
        ..Default::default()
    })
}

#[test]
fn direct_reject() {
    sentinel_pipeline::init_default()
        .unwrap_or_else(|err| sentinel_pipeline::logging::error!("{:?}", err));
    let resource_name = "flow_direct_reject";
    flow::load_rules_of_resource(resource_name, vec![qps_rule(resource_name, 10.0)]).unwrap();

    let mut passed = 0;
    let mut blocked = 0;
    for _ in 0..15 {
        match EntryBuilder::new(resource_name.into())
            .with_traffic_type(TrafficType::Inbound)
            .build()
        {
            Ok(entry) => {
                passed += 1;
                entry.exit().unwrap();
            }
            Err(err) => {
                assert_eq!(err.block_type(), BlockType::Flow);
                assert!(err.triggered_rule().is_some());
                blocked += 1;
            }
        }
    }
    assert_eq!(passed, 10);
    assert_eq!(blocked, 5);
}

#[test]
fn concurrent_reject() {
    let resource_name = "flow_concurrent_reject";
    let threshold = 50;
    let threads = 8;
    flow::load_rules_of_resource(
        resource_name,
        vec![qps_rule(resource_name, threshold as f64)],
    )
    .unwrap();

    let passed = Arc::new(AtomicU32::new(0));
    let blocked = Arc::new(AtomicU32::new(0));
    let handlers: Vec<_> = (0..threads)
        .map(|_| {
            let passed = passed.clone();
            let blocked = blocked.clone();
            std::thread::spawn(move || {
                for _ in 0..20 {
                    match EntryBuilder::new(resource_name.into())
                        .with_traffic_type(TrafficType::Inbound)
                        .build()
                    {
                        Ok(entry) => {
                            passed.fetch_add(1, Ordering::SeqCst);
                            sleep_for_ms(rand::random::<u64>() % 5);
                            entry.exit().unwrap();
                        }
                        Err(_) => {
                            blocked.fetch_add(1, Ordering::SeqCst);
                            sleep_for_ms(rand::random::<u64>() % 5);
                        }
                    }
                }
            })
        })
        .collect();
    for h in handlers {
        h.join().expect("Couldn't join on the associated thread");
    }
    let passed = passed.load(Ordering::SeqCst);
    // a check and the following pass record are not atomic, each thread may overshoot once
    assert!(passed >= threshold && passed <= threshold + threads);
    assert_eq!(passed + blocked.load(Ordering::SeqCst), threads * 20);
}

#[test]
fn concurrency_limit() {
    let resource_name = "flow_concurrency_limit";
    flow::load_rules_of_resource(
        resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.into(),
            metric_type: flow::MetricType::Concurrency,
            threshold: 2.0,
            ..Default::default()
        })],
    )
    .unwrap();

    let build = || EntryBuilder::new(resource_name.into()).build();
    let first = build().unwrap();
    let second = build().unwrap();
    assert_eq!(build().unwrap_err().block_type(), BlockType::Flow);
    second.exit().unwrap();
    let third = build().unwrap();
    third.exit().unwrap();
    first.exit().unwrap();
}

#[test]
fn origin_limited() {
    let resource_name = "flow_origin_limited";
    flow::load_rules_of_resource(
        resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.into(),
            limit_origin: "app_a".into(),
            threshold: 1.0,
            ..Default::default()
        })],
    )
    .unwrap();

    let build = |origin: &str| {
        EntryBuilder::new(resource_name.into())
            .with_origin(origin.into())
            .build()
    };
    build("app_a").unwrap().exit().unwrap();
    assert_eq!(build("app_a").unwrap_err().block_type(), BlockType::Flow);
    // other callers are not limited by the rule
    for _ in 0..3 {
        build("app_b").unwrap().exit().unwrap();
    }
}
