use super::new_slot_chain;
use crate::{
    base::{ResourceKey, ResourceWrapper, SlotChain},
    config, logging,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref CHAIN_MAP: RwLock<HashMap<ResourceKey, Arc<SlotChain>>> =
        RwLock::new(HashMap::new());
}

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turns the rule checking on or off for the whole process.
/// While it is off, entries are admitted without walking any slot chain.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::SeqCst);
    logging::info!("[Sentinel] Rule checking enabled: {}", enabled);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

/// The cached slot chain of the resource, built on first use.
/// Returns `None` once `max_chain_amount` chains exist, the resource is then not checked.
pub fn slot_chain_of(resource: &ResourceWrapper) -> Option<Arc<SlotChain>> {
    let key = resource.key(config::resource_key_strategy());
    if let Some(sc) = CHAIN_MAP.read().unwrap().get(&key) {
        return Some(sc.clone());
    }
    let mut chains = CHAIN_MAP.write().unwrap();
    if let Some(sc) = chains.get(&key) {
        return Some(sc.clone());
    }
    let max_chain_amount = config::max_chain_amount();
    if chains.len() >= max_chain_amount {
        logging::FREQUENT_ERROR_ONCE.call_once(|| {
            logging::warn!(
                "[SlotChainProvider] Slot chain amount exceeds the threshold {}, new resources are not checked",
                max_chain_amount
            );
        });
        return None;
    }
    let sc = Arc::new(new_slot_chain());
    chains.insert(key, sc.clone());
    Some(sc)
}

pub fn slot_chain_amount() -> usize {
    CHAIN_MAP.read().unwrap().len()
}

/// Drops all cached chains, the next entry of each resource builds a new one.
pub fn reset_slot_chains() {
    CHAIN_MAP.write().unwrap().clear();
}
