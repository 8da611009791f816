use super::{BlockType, SentinelRule, StatNode};
use crate::utils;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub trait SnapshotTrait: Any + fmt::Debug + utils::AsAny + Send + Sync {}
impl<T: Any + fmt::Debug + utils::AsAny + Send + Sync> SnapshotTrait for T {}
pub type Snapshot = dyn SnapshotTrait;

/// BlockError indicates the request was blocked.
/// It carries the rule class, the triggered rule and value,
/// and the resource-wide statistic node of the blocked call.
#[derive(Debug, Clone, Default)]
pub struct BlockError {
    block_type: BlockType,
    // block_msg provides additional message for the block error.
    block_msg: String,
    rule: Option<Arc<dyn SentinelRule>>,
    // snapshot_value represents the triggered "snapshot" value
    snapshot_value: Option<Arc<Snapshot>>,
    node: Option<Arc<dyn StatNode>>,
}

impl PartialEq for BlockError {
    fn eq(&self, other: &BlockError) -> bool {
        self.block_type == other.block_type && self.block_msg == other.block_msg
    }
}

impl BlockError {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            ..Self::default()
        }
    }

    pub fn new_with_msg(block_type: BlockType, block_msg: String) -> Self {
        Self {
            block_type,
            block_msg,
            ..Self::default()
        }
    }

    pub fn new_with_cause(
        block_type: BlockType,
        block_msg: String,
        rule: Arc<dyn SentinelRule>,
        snapshot_value: Arc<Snapshot>,
    ) -> Self {
        Self {
            block_type,
            block_msg,
            rule: Some(rule),
            snapshot_value: Some(snapshot_value),
            node: None,
        }
    }

    pub fn with_node(mut self, node: Option<Arc<dyn StatNode>>) -> Self {
        self.node = node;
        self
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn block_msg(&self) -> String {
        self.block_msg.clone()
    }

    pub fn triggered_rule(&self) -> Option<Arc<dyn SentinelRule>> {
        self.rule.clone()
    }

    pub fn triggered_value(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_value.clone()
    }

    /// The resource-wide statistic node of the blocked call, if it was resolved before the block.
    pub fn node(&self) -> Option<Arc<dyn StatNode>> {
        self.node.clone()
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.block_msg.is_empty() {
            write!(f, "BlockError: {}", self.block_type)
        } else {
            write!(
                f,
                "BlockError: {}, message: {}",
                self.block_type, self.block_msg
            )
        }
    }
}

impl std::error::Error for BlockError {}
