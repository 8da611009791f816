use super::DefaultNode;
use crate::base::{BaseSlot, EntryContext, StatPrepareSlot};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const PREPARE_SLOT_ORDER: u32 = 1000;

/// NodeSelectorSlot resolves the per-path node of the resource under the entry's context name
/// and links it below the context's last node, building the call tree.
///
/// Each slot chain owns its selector, the chain is built per resource,
/// so the map is keyed by context name only.
#[derive(Default)]
pub struct NodeSelectorSlot {
    nodes: RwLock<HashMap<String, Arc<DefaultNode>>>,
}

impl NodeSelectorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create_node(&self, ctx: &EntryContext) -> Arc<DefaultNode> {
        let context_name = ctx.context_name();
        if let Some(node) = self.nodes.read().unwrap().get(context_name) {
            return node.clone();
        }
        self.nodes
            .write()
            .unwrap()
            .entry(context_name.clone())
            .or_insert_with(|| Arc::new(DefaultNode::new(ctx.resource().clone())))
            .clone()
    }

    /// The context names this resource has been entered under.
    pub fn context_names(&self) -> Vec<String> {
        self.nodes.read().unwrap().keys().cloned().collect()
    }
}

impl BaseSlot for NodeSelectorSlot {
    fn order(&self) -> u32 {
        PREPARE_SLOT_ORDER
    }
}

impl StatPrepareSlot for NodeSelectorSlot {
    fn prepare(&self, ctx: &mut EntryContext) {
        let node = self.get_or_create_node(ctx);
        if let Some(last_node) = ctx.last_node() {
            last_node.add_child(node.clone());
        }
        ctx.set_cur_node(node);
    }
}
