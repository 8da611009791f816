use super::*;
use crate::base::{BaseSlot, BlockType, EntryContext, RuleCheckSlot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 4000;

/// A RuleSlot for circuit breaking, a call passes only if every breaker of the resource admits it.
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
        let res = ctx.resource().name().clone();
        if res.is_empty() {
            return ctx.result().clone();
        }
        if let Some(breaker) = can_pass_check(ctx, &res) {
            let rule = Arc::clone(breaker.bound_rule());
            ctx.set_result(TokenResult::new_blocked_with_cause(
                BlockType::Degrade,
                "circuit breaker check blocked".into(),
                rule,
                Arc::new(breaker.current_state()),
            ));
        }
        ctx.result().clone()
    }
}

/// `None` indicates it passes
/// `Some(breaker)` indicates it is broke by the breaker
fn can_pass_check(ctx: &EntryContext, res: &str) -> Option<Arc<dyn CircuitBreakerTrait>> {
    get_breakers_of_resource(res)
        .into_iter()
        .find(|breaker| !breaker.try_pass(ctx))
}
