//! Resolution of the chain assembly strategy and the registry of custom stages.
//!
//! Builders and stages are registered by name at startup,
//! the configuration lists the names to use (`chain.builders` and `chain.slots`).

use crate::{
    authority,
    base::SlotChain,
    circuitbreaker, config, flow, logging, stat, system,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub use crate::base::Stage;

pub const DEFAULT_SLOT_CHAIN_BUILDER_NAME: &str = "default";

/// SlotChainBuilder assembles a new slot chain, a chain is built once per resource.
pub trait SlotChainBuilder: Send + Sync {
    fn name(&self) -> String;
    fn build(&self) -> SlotChain;
}

/// StageGenFn creates the stage instance of a new chain.
pub type StageGenFn = dyn Send + Sync + Fn() -> Stage;

lazy_static! {
    static ref BUILDER_REGISTRY: RwLock<HashMap<String, Arc<dyn SlotChainBuilder>>> = {
        let mut registry: HashMap<String, Arc<dyn SlotChainBuilder>> = HashMap::new();
        registry.insert(
            DEFAULT_SLOT_CHAIN_BUILDER_NAME.into(),
            Arc::new(DefaultSlotChainBuilder {}),
        );
        RwLock::new(registry)
    };
    static ref RESOLVED_BUILDER: RwLock<Option<Arc<dyn SlotChainBuilder>>> = RwLock::new(None);
    static ref STAGE_REGISTRY: RwLock<HashMap<String, Arc<StageGenFn>>> =
        RwLock::new(HashMap::new());
}

/// The built-in assembly:
/// node selector, cluster builder, then authority, system, flow and circuit breaker checks,
/// then the statistic slots, followed by the configured custom stages.
pub struct DefaultSlotChainBuilder {}

impl SlotChainBuilder for DefaultSlotChainBuilder {
    fn name(&self) -> String {
        DEFAULT_SLOT_CHAIN_BUILDER_NAME.into()
    }

    fn build(&self) -> SlotChain {
        let mut sc = SlotChain::new();
        sc.add_stat_prepare_slot(Arc::new(stat::NodeSelectorSlot::new())); // 1000
        sc.add_stat_prepare_slot(stat::default_cluster_builder_slot()); // 2000

        sc.add_rule_check_slot(authority::default_slot()); // 1000
        sc.add_rule_check_slot(system::default_slot()); // 2000
        sc.add_rule_check_slot(flow::default_slot()); // 3000
        sc.add_rule_check_slot(circuitbreaker::default_slot()); // 4000

        sc.add_stat_slot(stat::default_resource_stat_slot()); // 1000
        sc.add_stat_slot(flow::default_stand_alone_stat_slot()); // 2000
        sc.add_stat_slot(circuitbreaker::default_metric_stat_slot()); // 3000

        append_configured_stages(&mut sc);
        sc
    }
}

fn append_configured_stages(sc: &mut SlotChain) {
    for name in config::chain_slots() {
        let gen = STAGE_REGISTRY.read().unwrap().get(&name).cloned();
        match gen {
            Some(gen) => sc.add_stage(gen()),
            None => logging::warn!(
                "[SlotChainProvider] Stage {} is configured but not registered, ignored",
                name
            ),
        }
    }
}

/// Registers a chain builder under its name, replacing the one registered before.
pub fn register_slot_chain_builder(builder: Arc<dyn SlotChainBuilder>) {
    BUILDER_REGISTRY
        .write()
        .unwrap()
        .insert(builder.name(), builder);
}

/// Registers a custom stage, it is added to the chains built after
/// if its name is listed in `chain.slots`.
pub fn register_stage(name: String, gen: Arc<StageGenFn>) {
    STAGE_REGISTRY.write().unwrap().insert(name, gen);
}

pub fn remove_stage(name: &str) -> bool {
    STAGE_REGISTRY.write().unwrap().remove(name).is_some()
}

/// The resolved chain builder.
/// The first configured name with a registered builder wins, falling back to the default builder.
/// It is resolved once, later calls reuse it until `reset_slot_chain_builder()`.
pub fn slot_chain_builder() -> Arc<dyn SlotChainBuilder> {
    if let Some(builder) = RESOLVED_BUILDER.read().unwrap().as_ref() {
        return builder.clone();
    }
    let mut resolved = RESOLVED_BUILDER.write().unwrap();
    if let Some(builder) = resolved.as_ref() {
        return builder.clone();
    }
    let builder = resolve_builder();
    *resolved = Some(builder.clone());
    builder
}

fn resolve_builder() -> Arc<dyn SlotChainBuilder> {
    let registry = BUILDER_REGISTRY.read().unwrap();
    let names = config::chain_builders();
    for name in &names {
        if let Some(builder) = registry.get(name) {
            logging::info!("[SlotChainProvider] Global slot chain builder resolved: {}", name);
            return builder.clone();
        }
    }
    if !names.is_empty() {
        logging::warn!(
            "[SlotChainProvider] None of the configured slot chain builders {:?} is registered, use the default one",
            names
        );
    }
    match registry.get(DEFAULT_SLOT_CHAIN_BUILDER_NAME) {
        Some(builder) => builder.clone(),
        None => Arc::new(DefaultSlotChainBuilder {}),
    }
}

/// Forgets the resolved builder, the next chain is built by a newly resolved one.
pub fn reset_slot_chain_builder() {
    *RESOLVED_BUILDER.write().unwrap() = None;
}

/// A new chain built by the resolved builder.
pub fn new_slot_chain() -> SlotChain {
    slot_chain_builder().build()
}
