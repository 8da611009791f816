//! The slot chain: the ordered stages every entry of a resource walks through.
//!
//! Entering runs the prepare stages, then the rule checks until one blocks,
//! then reports the outcome to the statistic stages. Exiting an admitted entry
//! reports its completion to the statistic stages.

use super::{BlockError, ContextPtr, EntryContext, TokenResult};
use crate::logging;
use crate::utils::{self, AsAny};
use std::any::Any;
use std::sync::Arc;

const SLOT_INIT: usize = 8;

/// Common part of all stages. Stages of a kind run in ascending `order`,
/// equal orders run in the order they were added.
pub trait BaseSlot: Any + AsAny + Sync + Send {
    fn order(&self) -> u32 {
        0
    }

    /// Identifies the stage in logs and in `SlotChain::stage_names`.
    fn name(&self) -> String {
        std::any::type_name::<Self>().into()
    }
}

/// Resolves what the later stages need, e.g. the statistic nodes of the call.
/// Prepare stages must not panic, a panic propagates out of `SlotChain::entry`.
pub trait StatPrepareSlot: BaseSlot {
    fn prepare(&self, _ctx: &mut EntryContext) {}
}

/// Decides whether the call is admitted.
/// A returned `Blocked` ends the checks, a `Wait` makes the caller sleep before the next check.
pub trait RuleCheckSlot: BaseSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        ctx.result().clone()
    }
}

/// Records the outcome of the call.
pub trait StatSlot: BaseSlot {
    /// every check admitted the call
    fn on_entry_pass(&self, _ctx: &EntryContext) {}
    /// a check blocked the call, `block_error` tells which one
    fn on_entry_blocked(&self, _ctx: &EntryContext, _block_error: BlockError) {}
    /// an admitted entry exited, never called for a blocked one
    fn on_completed(&self, _ctx: &mut EntryContext) {}
}

/// One stage to add to a chain, tagged with its kind.
pub enum Stage {
    Prepare(Arc<dyn StatPrepareSlot>),
    Check(Arc<dyn RuleCheckSlot>),
    Stat(Arc<dyn StatSlot>),
}

fn insert_ordered<S: ?Sized + BaseSlot>(stages: &mut Vec<Arc<S>>, stage: Arc<S>) {
    let at = stages.partition_point(|s| s.order() <= stage.order());
    stages.insert(at, stage);
}

/// The stages of one resource, each kind kept sorted by `order`.
pub struct SlotChain {
    stat_pres: Vec<Arc<dyn StatPrepareSlot>>,
    rule_checks: Vec<Arc<dyn RuleCheckSlot>>,
    stats: Vec<Arc<dyn StatSlot>>,
}

impl Default for SlotChain {
    fn default() -> Self {
        Self {
            stat_pres: Vec::with_capacity(SLOT_INIT),
            rule_checks: Vec::with_capacity(SLOT_INIT),
            stats: Vec::with_capacity(SLOT_INIT),
        }
    }
}

impl SlotChain {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_stage(&mut self, stage: Stage) {
        match stage {
            Stage::Prepare(s) => self.add_stat_prepare_slot(s),
            Stage::Check(s) => self.add_rule_check_slot(s),
            Stage::Stat(s) => self.add_stat_slot(s),
        }
    }

    pub fn add_stat_prepare_slot(&mut self, s: Arc<dyn StatPrepareSlot>) {
        insert_ordered(&mut self.stat_pres, s);
    }

    pub fn add_rule_check_slot(&mut self, s: Arc<dyn RuleCheckSlot>) {
        insert_ordered(&mut self.rule_checks, s);
    }

    pub fn add_stat_slot(&mut self, s: Arc<dyn StatSlot>) {
        insert_ordered(&mut self.stats, s);
    }

    /// Names of all stages in execution order: prepare, check, then statistic stages.
    pub fn stage_names(&self) -> Vec<String> {
        self.stat_pres
            .iter()
            .map(|s| s.name())
            .chain(self.rule_checks.iter().map(|s| s.name()))
            .chain(self.stats.iter().map(|s| s.name()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stat_pres.len() + self.rule_checks.len() + self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks the entering stages and returns the decision, which is also kept in the context.
    pub fn entry(&self, ctx_ptr: ContextPtr) -> TokenResult {
        let mut ctx = ctx_ptr.write().unwrap();
        for s in &self.stat_pres {
            s.prepare(&mut ctx);
        }

        ctx.reset_result_to_pass();
        for s in &self.rule_checks {
            match s.check(&mut ctx) {
                blocked @ TokenResult::Blocked(_) => {
                    ctx.set_result(blocked);
                    break;
                }
                TokenResult::Wait(nanos) => utils::sleep_for_ns(nanos),
                TokenResult::Pass => {}
            }
        }

        match ctx.result().block_err() {
            Some(err) => self
                .stats
                .iter()
                .for_each(|s| s.on_entry_blocked(&ctx, err.clone())),
            None => self.stats.iter().for_each(|s| s.on_entry_pass(&ctx)),
        }
        ctx.result().clone()
    }

    /// Reports the completion of an admitted entry. Blocked entries complete nothing.
    pub fn exit(&self, ctx_ptr: ContextPtr) {
        let mut ctx = ctx_ptr.write().unwrap();
        if ctx.entry().is_none() {
            logging::error!("[SlotChain exit] the context carries no entry, nothing to complete");
            return;
        }
        if ctx.is_blocked() {
            return;
        }
        for s in &self.stats {
            s.on_completed(&mut ctx);
        }
    }
}

#[cfg(test)]
pub(crate) use test::aggregation::{MockRuleCheckSlot, MockStatPrepareSlot, MockStatSlot};
