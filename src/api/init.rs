//! Initialization func initialize the runtime environment, including:
//! 1. override global config, from manually config or yaml file or env variable
//! 2. initialize global logger
//! 3. initiate core components, the system statistic collectors and the time ticker

use crate::{config, config::ConfigEntity, logging, system_metric, utils, Result};

/// `init_default` initializes the pipeline using the configuration from system
/// environment and the default value.
#[inline]
pub fn init_default() -> Result<()> {
    init_sentinel(&mut String::new())
}

/// `init_with_config` initializes the pipeline using given config.
#[inline]
pub fn init_with_config(config_entity: ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    config::override_config_from_env_and_init_log()?;
    init_core_components()
}

/// Init loads general configuration from the given YAML file
/// and initializes the pipeline.
#[inline]
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    init_sentinel(config_path)
}

#[inline]
fn init_sentinel(config_path: &mut String) -> Result<()> {
    // Initialize general config and logging module.
    config::init_config_with_yaml(config_path)?;
    init_core_components()
}

// `init_core_components` init core components with global config
#[inline]
fn init_core_components() -> Result<()> {
    system_metric::init_load_collector(config::load_stat_collec_interval_ms());
    system_metric::init_cpu_collector(config::cpu_stat_collec_interval_ms());

    if config::use_cache_time() {
        utils::start_time_ticker();
    }
    logging::info!(
        "[Sentinel] Initialized, app name {}, max slot chain amount {}",
        config::app_name(),
        config::max_chain_amount()
    );
    Ok(())
}
