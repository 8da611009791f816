//! Per-entry context, shared by the slots of one invocation.
//!
use super::{EntryWeakPtr, ResourceWrapper, StatNode, TokenResult};
use crate::stat::DefaultNode;
use crate::utils::time::curr_time_millis;
use crate::Error;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

pub type ContextPtr = Arc<RwLock<EntryContext>>;

#[derive(Default)]
pub struct EntryContext {
    /// entry<->context, cycled reference, so need Weak
    entry: Option<EntryWeakPtr>,
    /// Use to calculate RT
    start_time: u64,
    /// The round trip time of this transaction
    round_trip: u64,
    resource: ResourceWrapper,
    input: SentinelInput,
    /// name of the call context the entry belongs to
    context_name: String,
    origin: String,
    /// resource-wide node, resolved by the cluster builder slot
    stat_node: Option<Arc<dyn StatNode>>,
    /// per-path node of this resource under the call context, resolved by the node selector slot
    cur_node: Option<Arc<DefaultNode>>,
    /// per-path node of the parent entry, or the entrance node of the call context
    last_node: Option<Arc<DefaultNode>>,
    origin_node: Option<Arc<dyn StatNode>>,
    /// the result of rule slots check
    rule_check_result: TokenResult,
    err: Option<Error>,
}

impl EntryContext {
    pub fn new() -> Self {
        EntryContext {
            start_time: curr_time_millis(),
            ..Default::default()
        }
    }

    pub fn set_entry(&mut self, entry: EntryWeakPtr) {
        self.entry = Some(entry);
    }

    pub fn entry(&self) -> Option<&EntryWeakPtr> {
        self.entry.as_ref()
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn is_blocked(&self) -> bool {
        self.rule_check_result.is_blocked()
    }

    pub fn set_round_trip(&mut self, round_trip: u64) {
        self.round_trip = round_trip
    }

    pub fn round_trip(&self) -> u64 {
        self.round_trip
    }

    pub fn set_resource(&mut self, resource: ResourceWrapper) {
        self.resource = resource;
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn set_input(&mut self, input: SentinelInput) {
        self.input = input;
    }

    pub fn input(&self) -> &SentinelInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut SentinelInput {
        &mut self.input
    }

    pub fn set_context_name(&mut self, context_name: String) {
        self.context_name = context_name;
    }

    pub fn context_name(&self) -> &String {
        &self.context_name
    }

    pub fn set_origin(&mut self, origin: String) {
        self.origin = origin;
    }

    pub fn origin(&self) -> &String {
        &self.origin
    }

    pub fn set_stat_node(&mut self, stat_node: Arc<dyn StatNode>) {
        self.stat_node = Some(stat_node);
    }

    pub fn stat_node(&self) -> Option<Arc<dyn StatNode>> {
        self.stat_node.clone()
    }

    pub fn set_cur_node(&mut self, cur_node: Arc<DefaultNode>) {
        self.cur_node = Some(cur_node);
    }

    pub fn cur_node(&self) -> Option<Arc<DefaultNode>> {
        self.cur_node.clone()
    }

    pub fn set_last_node(&mut self, last_node: Option<Arc<DefaultNode>>) {
        self.last_node = last_node;
    }

    pub fn last_node(&self) -> Option<Arc<DefaultNode>> {
        self.last_node.clone()
    }

    pub fn set_origin_node(&mut self, origin_node: Arc<dyn StatNode>) {
        self.origin_node = Some(origin_node);
    }

    pub fn origin_node(&self) -> Option<Arc<dyn StatNode>> {
        self.origin_node.clone()
    }

    pub fn set_result(&mut self, result: TokenResult) {
        self.rule_check_result = result;
    }

    pub fn reset_result_to_pass(&mut self) {
        self.rule_check_result.reset_to_pass();
    }

    pub fn result(&self) -> &TokenResult {
        &self.rule_check_result
    }

    pub fn set_err(&mut self, err: Error) {
        self.err = Some(err);
    }

    pub fn get_err(&self) -> &Option<Error> {
        &self.err
    }
}

pub type ParamKey = String;
pub type ParamsList = Vec<ParamKey>;

/// Input of policy algorithms
#[derive(Debug)]
pub struct SentinelInput {
    batch_count: u32,
    flag: i32,
    args: Option<ParamsList>,
    attachments: Option<HashMap<String, ParamKey>>,
}

impl Default for SentinelInput {
    fn default() -> Self {
        SentinelInput {
            batch_count: 1,
            flag: 0,
            args: None,
            attachments: None,
        }
    }
}

impl SentinelInput {
    pub fn new(batch_count: u32, flag: i32) -> Self {
        SentinelInput {
            batch_count,
            flag,
            ..Default::default()
        }
    }

    pub fn set_batch_count(&mut self, batch_count: u32) {
        self.batch_count = batch_count;
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn set_flag(&mut self, flag: i32) {
        self.flag = flag;
    }

    pub fn flag(&self) -> i32 {
        self.flag
    }

    pub fn set_args(&mut self, args: ParamsList) {
        self.args = Some(args);
    }

    pub fn args(&self) -> Option<&ParamsList> {
        self.args.as_ref()
    }

    pub fn set_attachments(&mut self, attachments: HashMap<String, ParamKey>) {
        self.attachments = Some(attachments);
    }

    pub fn attachments(&self) -> Option<&HashMap<String, ParamKey>> {
        self.attachments.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::result::BlockType;

    #[test]
    fn is_blocked() {
        let mut ctx = EntryContext::new();
        assert!(!ctx.is_blocked());
        ctx.set_result(TokenResult::new_blocked(BlockType::Custom(1)));
        assert!(ctx.is_blocked());
        ctx.reset_result_to_pass();
        assert!(!ctx.is_blocked());
    }

    #[test]
    fn input() {
        let mut ctx = EntryContext::new();
        assert_eq!(ctx.input().batch_count(), 1);
        ctx.input_mut().set_batch_count(5);
        ctx.input_mut().set_args(vec!["a".into()]);
        assert_eq!(ctx.input().batch_count(), 5);
        assert_eq!(ctx.input().args().unwrap().len(), 1);
    }
}
