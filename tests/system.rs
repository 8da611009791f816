use sentinel_pipeline::utils::sleep_for_ms;
use sentinel_pipeline::{
    base::{BlockType, TrafficType},
    system, system_metric, EntryBuilder,
};
use std::sync::{Arc, Mutex};

// system rules apply to every inbound resource, the tests take turns
static SERIAL: Mutex<()> = Mutex::new(());

fn inbound(resource: &str) -> EntryBuilder {
    EntryBuilder::new(resource.into()).with_traffic_type(TrafficType::Inbound)
}

fn rule(metric_type: system::MetricType, threshold: f64) -> Arc<system::Rule> {
    Arc::new(system::Rule {
        metric_type,
        threshold,
        ..Default::default()
    })
}

#[test]
fn inbound_qps() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    // wait for the inbound window of the previous test to expire
    sleep_for_ms(1100);
    assert!(system::load_rules(vec![rule(system::MetricType::InboundQPS, 5.0)]));

    for _ in 0..5 {
        inbound("system_qps").build().unwrap().exit().unwrap();
    }
    let err = inbound("system_qps").build().unwrap_err();
    assert_eq!(err.block_type(), BlockType::System);
    // outbound traffic is not checked
    EntryBuilder::new("system_qps_outbound".into())
        .build()
        .unwrap()
        .exit()
        .unwrap();
    system::clear_rules();
    inbound("system_qps").build().unwrap().exit().unwrap();
}

#[test]
fn inbound_concurrency() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    assert!(system::load_rules(vec![rule(
        system::MetricType::Concurrency,
        2.0
    )]));

    let handles: Vec<_> = (0..2)
        .map(|i| {
            std::thread::spawn(move || {
                let entry = inbound(&format!("system_concurrency_{}", i)).build().unwrap();
                sleep_for_ms(300);
                entry.exit().unwrap();
            })
        })
        .collect();
    sleep_for_ms(100);
    let err = inbound("system_concurrency_2").build().unwrap_err();
    assert_eq!(err.block_type(), BlockType::System);
    assert!(err.triggered_rule().is_some());
    for h in handles {
        h.join().unwrap();
    }
    inbound("system_concurrency_2").build().unwrap().exit().unwrap();
    system::clear_rules();
}

#[test]
fn rule_queries() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    assert!(system::load_rules(vec![
        rule(system::MetricType::Load, 8.0),
        rule(system::MetricType::AvgRT, 100.0),
        rule(system::MetricType::CpuUsage, 1.5),
    ]));
    // the invalid cpu usage rule is dropped
    assert_eq!(system::get_rules().len(), 2);
    assert_eq!(system::get_rules_of_type(system::MetricType::Load).len(), 1);
    assert!(system::get_rules_of_type(system::MetricType::CpuUsage).is_empty());
    system::clear_rules();
    assert!(system::get_rules().is_empty());
}

#[test]
#[ignore]
fn system_load() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    system_metric::init_load_collector(100);
    sleep_for_ms(300);
    if system_metric::current_load() <= 0.0 {
        // an idle machine, nothing to check
        return;
    }
    assert!(system::load_rules(vec![rule(system::MetricType::Load, 0.0)]));
    let err = inbound("system_load").build().unwrap_err();
    assert_eq!(err.block_type(), BlockType::System);
    system::clear_rules();
}
