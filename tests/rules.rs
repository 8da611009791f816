use sentinel_pipeline::{
    authority, base::BlockType, clear_rules, flow, get_rules, load_rules, EntryBuilder,
    RuleClass, RuleSet,
};
use std::sync::Arc;

// each rule class is replaced as a whole, the classes do not affect each other
#[test]
fn rule_sets() {
    let flow_rule = Arc::new(flow::Rule {
        resource: "rules_flow".into(),
        threshold: 0.0,
        ..Default::default()
    });
    assert!(load_rules(RuleSet::Flow(vec![flow_rule.clone()])));
    // loading the same rules again changes nothing
    assert!(!load_rules(RuleSet::Flow(vec![flow_rule])));
    assert!(load_rules(RuleSet::Authority(vec![Arc::new(authority::Rule {
        resource: "rules_authority".into(),
        limit_origins: std::iter::once("app_a".to_string()).collect(),
        ..Default::default()
    })])));

    assert_eq!(get_rules(RuleClass::Flow).len(), 1);
    assert_eq!(get_rules(RuleClass::Authority).len(), 1);
    assert!(get_rules(RuleClass::CircuitBreaker).is_empty());
    assert_eq!(
        EntryBuilder::new("rules_flow".into())
            .build()
            .unwrap_err()
            .block_type(),
        BlockType::Flow
    );
    assert_eq!(
        EntryBuilder::new("rules_authority".into())
            .with_origin("app_b".into())
            .build()
            .unwrap_err()
            .block_type(),
        BlockType::Authority
    );

    clear_rules(RuleClass::Flow);
    assert!(get_rules(RuleClass::Flow).is_empty());
    assert_eq!(get_rules(RuleClass::Authority).len(), 1);
    EntryBuilder::new("rules_flow".into())
        .build()
        .unwrap()
        .exit()
        .unwrap();

    // an invalid rule is ignored, the valid ones of the set are kept
    load_rules(RuleSet::Authority(vec![
        Arc::new(authority::Rule {
            resource: "rules_authority".into(),
            ..Default::default()
        }),
        Arc::new(authority::Rule {
            resource: "rules_authority_other".into(),
            limit_origins: std::iter::once("app_a".to_string()).collect(),
            ..Default::default()
        }),
    ]));
    EntryBuilder::new("rules_authority".into())
        .with_origin("app_b".into())
        .build()
        .unwrap()
        .exit()
        .unwrap();
    clear_rules(RuleClass::Authority);
}
