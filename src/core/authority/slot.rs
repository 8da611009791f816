use super::*;
use crate::base::{BaseSlot, BlockType, EntryContext, RuleCheckSlot, Snapshot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 1000;

/// A RuleSlot checking the caller origin against the authority rules of the resource.
pub struct Slot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<Slot> = Arc::new(Slot {});
}

pub fn default_slot() -> Arc<Slot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for Slot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for Slot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        let origin = ctx.origin().clone();
        if origin.is_empty() {
            return ctx.result().clone();
        }
        let rules = get_rules_of_resource(ctx.resource().name());
        if let Some(rule) = rules.iter().find(|rule| !rule.admits(&origin)) {
            ctx.set_result(TokenResult::new_blocked_with_cause(
                BlockType::Authority,
                format!("origin {} is not allowed", origin),
                rule.clone(),
                Arc::new(origin) as Arc<Snapshot>,
            ));
        }
        ctx.result().clone()
    }
}
