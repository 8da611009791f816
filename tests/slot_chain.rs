use sentinel_pipeline::{
    base::{self, BaseSlot, BlockError, BlockType, EntryContext, RuleCheckSlot, SlotChain, TokenResult},
    config::ConfigEntity,
    flow, init_with_config, register_slot_chain_builder, register_stage, remove_stage,
    reset_slot_chain_builder, reset_slot_chains, set_enabled, slot_chain_amount,
    slot_chain_builder, EntryBuilder, SlotChainBuilder, Stage,
};
use std::sync::{Arc, Mutex};

const DENY_BLOCK_TYPE: BlockType = BlockType::Custom(7);

// the tests change the process-wide chain configuration, they take turns
static SERIAL: Mutex<()> = Mutex::new(());

/// Blocks the resources whose name starts with `denied`.
struct DenyCheck {}

impl BaseSlot for DenyCheck {
    fn order(&self) -> u32 {
        5000
    }
}

impl RuleCheckSlot for DenyCheck {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        if ctx.resource().name().starts_with("denied") {
            ctx.set_result(BlockError::new_with_msg(DENY_BLOCK_TYPE, "denied by name".into()).into());
        }
        ctx.result().clone()
    }
}

struct DenyAllBuilder {}

impl SlotChainBuilder for DenyAllBuilder {
    fn name(&self) -> String {
        "deny_all".into()
    }

    fn build(&self) -> SlotChain {
        struct DenyAll {}
        impl BaseSlot for DenyAll {}
        impl RuleCheckSlot for DenyAll {
            fn check(&self, _ctx: &mut EntryContext) -> TokenResult {
                TokenResult::new_blocked(DENY_BLOCK_TYPE)
            }
        }
        let mut sc = SlotChain::new();
        sc.add_rule_check_slot(Arc::new(DenyAll {}));
        sc
    }
}

fn reconfigure(f: impl FnOnce(&mut ConfigEntity)) {
    let mut entity = ConfigEntity::new();
    f(&mut entity);
    init_with_config(entity).unwrap();
    reset_slot_chain_builder();
    reset_slot_chains();
}

fn admitted(resource: &str) -> bool {
    match EntryBuilder::new(resource.into()).build() {
        Ok(entry) => {
            entry.exit().unwrap();
            true
        }
        Err(err) => {
            assert_eq!(err.block_type(), DENY_BLOCK_TYPE);
            false
        }
    }
}

#[test]
fn configured_stage() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let _ = base::register_block_type(DENY_BLOCK_TYPE, "Deny");
    register_stage(
        "deny_by_name".into(),
        Arc::new(|| Stage::Check(Arc::new(DenyCheck {}))),
    );

    reconfigure(|_| {});
    assert!(admitted("denied_before_configured"));

    reconfigure(|entity| {
        entity.config.chain.slots = vec!["deny_by_name".into(), "not_registered".into()];
    });
    assert!(!admitted("denied_stage"));
    assert!(admitted("allowed_stage"));
    let sc = slot_chain_builder().build();
    // the default stages are kept, the custom check runs after them
    assert_eq!(sc.len(), 10);
    let names = sc.stage_names();
    // two prepare slots and the four default checks run before it
    assert!(names[6].ends_with("DenyCheck"));
    assert_eq!(DENY_BLOCK_TYPE.to_string(), "Deny");

    // an unregistered stage is skipped when the chains are rebuilt
    assert!(remove_stage("deny_by_name"));
    assert!(!remove_stage("deny_by_name"));
    reset_slot_chains();
    assert!(admitted("denied_after_removed"));

    reconfigure(|_| {});
}

#[test]
fn configured_builder() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    register_slot_chain_builder(Arc::new(DenyAllBuilder {}));

    reconfigure(|entity| {
        entity.config.chain.builders = vec!["not_registered".into(), "deny_all".into()];
    });
    assert_eq!(slot_chain_builder().name(), "deny_all");
    assert!(!admitted("builder_any"));

    // the rule checking may be switched off as a whole
    set_enabled(false);
    assert!(admitted("builder_any"));
    set_enabled(true);
    assert!(!admitted("builder_any"));

    reconfigure(|entity| {
        entity.config.chain.builders = vec!["not_registered".into()];
    });
    assert_eq!(slot_chain_builder().name(), "default");
    assert!(admitted("builder_any"));

    reconfigure(|_| {});
}

#[test]
fn chain_amount_cap() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    reconfigure(|entity| {
        entity.config.chain.max_chain_amount = 2;
    });
    let resources = ["cap_a", "cap_b", "cap_c"];
    for res in &resources {
        flow::load_rules_of_resource(
            res,
            vec![Arc::new(flow::Rule {
                resource: res.to_string(),
                threshold: 0.0,
                ..Default::default()
            })],
        )
        .unwrap();
    }
    assert!(EntryBuilder::new("cap_a".into()).build().is_err());
    assert!(EntryBuilder::new("cap_b".into()).build().is_err());
    assert_eq!(slot_chain_amount(), 2);
    // beyond the cap the resource is admitted without checking
    EntryBuilder::new("cap_c".into())
        .build()
        .unwrap()
        .exit()
        .unwrap();
    assert_eq!(slot_chain_amount(), 2);

    for res in &resources {
        flow::clear_rules_of_resource(res);
    }
    reconfigure(|_| {});
}
