#[macro_use]
extern crate criterion;
use criterion::Criterion;

mod pipeline {
    use super::*;
    use sentinel_pipeline::{base::TrafficType, flow, EntryBuilder};
    use std::sync::Arc;

    pub fn bench_entry(c: &mut Criterion) {
        c.bench_function("entry without rules", |b| {
            b.iter(|| {
                if let Ok(entry) = EntryBuilder::new("bench_no_rules".into()).build() {
                    let _ = entry.exit();
                }
            })
        });

        flow::load_rules_of_resource(
            "bench_flow",
            vec![Arc::new(flow::Rule {
                resource: "bench_flow".into(),
                threshold: 1e9,
                ..Default::default()
            })],
        )
        .unwrap();
        c.bench_function("entry with flow rule", |b| {
            b.iter(|| {
                if let Ok(entry) = EntryBuilder::new("bench_flow".into())
                    .with_traffic_type(TrafficType::Inbound)
                    .build()
                {
                    let _ = entry.exit();
                }
            })
        });
    }
}

mod window {
    use super::*;
    use sentinel_pipeline::{
        base::{MetricEvent, ReadStat, WriteStat},
        stat::StatisticNode,
    };

    pub fn bench_window(c: &mut Criterion) {
        let node = StatisticNode::with_geometry(20, 10000, 2, 1000).unwrap();
        c.bench_function("window add", |b| {
            b.iter(|| node.add_count(MetricEvent::Pass, 1))
        });
        c.bench_function("window qps", |b| b.iter(|| node.qps(MetricEvent::Pass)));
    }
}

criterion_group!(benches, pipeline::bench_entry, window::bench_window);
criterion_main!(benches);
