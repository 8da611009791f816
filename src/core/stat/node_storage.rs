use super::{DefaultNode, ResourceNode};
use crate::{
    base::{
        ResourceType, ResourceWrapper, TrafficType, DEFAULT_MAX_RESOURCE_AMOUNT,
        TOTAL_IN_BOUND_RESOURCE_NAME,
    },
    config, logging,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ResourceNodeMap = HashMap<String, Arc<ResourceNode>>;
type EntranceNodeMap = HashMap<String, Arc<DefaultNode>>;

lazy_static! {
    pub static ref INBOUND_NODE: Arc<ResourceNode> = Arc::new(ResourceNode::new(
        TOTAL_IN_BOUND_RESOURCE_NAME.into(),
        ResourceType::Common
    ));
    static ref RESOURCE_NODE_MAP: RwLock<ResourceNodeMap> = RwLock::new(ResourceNodeMap::new());
    static ref ENTRANCE_NODE_MAP: RwLock<EntranceNodeMap> = RwLock::new(EntranceNodeMap::new());
}

/// The node recording all inbound traffic of the process.
pub fn inbound_node() -> Arc<ResourceNode> {
    INBOUND_NODE.clone()
}

// resource_node_list returns the slice of all existing resource nodes.
pub fn resource_node_list() -> Vec<Arc<ResourceNode>> {
    let res_map = RESOURCE_NODE_MAP.read().unwrap();
    res_map.values().cloned().collect()
}

pub fn get_resource_node(res_name: &str) -> Option<Arc<ResourceNode>> {
    let res_map = RESOURCE_NODE_MAP.read().unwrap();
    res_map.get(res_name).cloned()
}

pub fn get_or_create_resource_node(
    res_name: &str,
    resource_type: &ResourceType,
) -> Arc<ResourceNode> {
    if let Some(node) = get_resource_node(res_name) {
        return node;
    }
    let mut res_map = RESOURCE_NODE_MAP.write().unwrap();
    if res_map.len() >= DEFAULT_MAX_RESOURCE_AMOUNT && !res_map.contains_key(res_name) {
        logging::warn!(
            "[get_or_create_resource_node] Resource amount exceeds the threshold {}",
            DEFAULT_MAX_RESOURCE_AMOUNT
        )
    }
    res_map
        .entry(res_name.to_owned())
        .or_insert_with(|| Arc::new(ResourceNode::new(res_name.to_owned(), *resource_type)))
        .clone()
}

pub fn get_entrance_node(context_name: &str) -> Option<Arc<DefaultNode>> {
    ENTRANCE_NODE_MAP.read().unwrap().get(context_name).cloned()
}

/// The entrance node of the context name, created on first use.
/// Returns `None` once the amount of context names reaches `max_context_amount`.
pub fn get_or_create_entrance_node(context_name: &str) -> Option<Arc<DefaultNode>> {
    if let Some(node) = get_entrance_node(context_name) {
        return Some(node);
    }
    let mut entrances = ENTRANCE_NODE_MAP.write().unwrap();
    if let Some(node) = entrances.get(context_name) {
        return Some(node.clone());
    }
    let max_context_amount = config::max_context_amount();
    if entrances.len() >= max_context_amount {
        logging::warn!(
            "[get_or_create_entrance_node] Context amount exceeds the threshold {}, context {} is not tracked",
            max_context_amount,
            context_name
        );
        return None;
    }
    let node = Arc::new(DefaultNode::new_entrance(ResourceWrapper::new(
        context_name.to_owned(),
        ResourceType::Common,
        TrafficType::Inbound,
    )));
    entrances.insert(context_name.to_owned(), node.clone());
    Some(node)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resource_nodes() {
        let a = get_or_create_resource_node("node_storage_a", &ResourceType::Common);
        let b = get_or_create_resource_node("node_storage_a", &ResourceType::Web);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.resource_type(), ResourceType::Common);
        assert!(get_resource_node("node_storage_a").is_some());
        assert!(get_resource_node("node_storage_absent").is_none());
    }

    #[test]
    fn entrance_nodes() {
        let a = get_or_create_entrance_node("node_storage_ctx").unwrap();
        let b = get_or_create_entrance_node("node_storage_ctx").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_entrance());
        assert_eq!(a.resource().name(), "node_storage_ctx");
    }
}
