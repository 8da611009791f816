use super::{constant::*, ConfigEntity};
use crate::{
    base::{ResourceKeyStrategy, ResourceType},
    logging, utils, Error, Result,
};
use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<ConfigEntity> = RwLock::new(ConfigEntity::new());
}

pub fn reset_global_config(entity: ConfigEntity) {
    let mut cfg = GLOBAL_CONFIG.write().unwrap();
    *cfg = entity;
}

/// A copy of the effective configuration.
pub fn global_config() -> ConfigEntity {
    GLOBAL_CONFIG.read().unwrap().clone()
}

// init_config_with_yaml loads general configuration from the YAML file under provided path.
pub fn init_config_with_yaml(config_path: &mut String) -> Result<()> {
    // Initialize general config and logging module.
    apply_yaml_config_file(config_path)?;
    override_config_from_env_and_init_log()?;
    Ok(())
}

// apply_yaml_config_file loads general configuration from the given YAML file.
fn apply_yaml_config_file(config_path: &mut String) -> Result<()> {
    // Priority: system environment > YAML file > default config
    if utils::is_blank(config_path) {
        // If the config file path is absent, try to resolve it from the system env.
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    // If the path is not set, the default config is kept.
    load_global_config_from_yaml_file(config_path)?;
    Ok(())
}

fn load_global_config_from_yaml_file(path_str: &str) -> Result<()> {
    if path_str == CONFIG_FILENAME {
        return Ok(());
    }
    let path = Path::new(path_str);
    if !path.exists() {
        return Err(Error::msg(format!(
            "YAML configuration file {} does not exist",
            path_str
        )));
    }
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!("[Config] Resolving config from file, file {}", path_str);
    reset_global_config(entity);
    Ok(())
}

pub fn override_config_from_env_and_init_log() -> Result<()> {
    // If present, the value in system env will override the value in config file.
    override_items_from_system_env()?;

    logging::logger_init(log_config_file());
    logging::info!("[Config] App name resolved, appName {}", app_name());
    logging::info!(
        "[Config] Print effective global config, globalConfig {}",
        GLOBAL_CONFIG.read().unwrap()
    );
    Ok(())
}

fn override_items_from_system_env() -> Result<()> {
    let mut cfg = GLOBAL_CONFIG.write().unwrap();
    if let Ok(app_name) = env::var(APP_NAME_ENV_KEY) {
        if !utils::is_blank(&app_name) {
            cfg.config.app.app_name = app_name;
        }
    }
    if let Ok(app_type) = env::var(APP_TYPE_ENV_KEY) {
        let app_type: ResourceType = app_type
            .trim()
            .parse::<u8>()
            .map_err(|err| Error::msg(format!("illegal {}: {}", APP_TYPE_ENV_KEY, err)))?
            .into();
        cfg.config.app.app_type = app_type;
    }
    if let Ok(log_config_file) = env::var(LOG_CONFIG_FILE_ENV_KEY) {
        if !utils::is_blank(&log_config_file) {
            cfg.config.log.config_file = log_config_file;
        }
    }
    cfg.check()?;
    Ok(())
}

#[inline]
pub fn log_config_file() -> Option<String> {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    let file = &cfg.config.log.config_file;
    if utils::is_blank(file) {
        None
    } else {
        Some(file.clone())
    }
}

#[inline]
pub fn app_name() -> String {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.app.app_name.clone()
}

#[inline]
pub fn app_type() -> ResourceType {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.app.app_type
}

#[inline]
pub fn load_stat_collec_interval_ms() -> u32 {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.stat.system.load_interval_ms
}

#[inline]
pub fn cpu_stat_collec_interval_ms() -> u32 {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.stat.system.cpu_interval_ms
}

#[inline]
pub fn use_cache_time() -> bool {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.use_cache_time
}

#[inline]
pub fn global_stat_interval_ms_total() -> u32 {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.stat.interval_ms_total
}

#[inline]
pub fn global_stat_sample_count_total() -> u32 {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.stat.sample_count_total
}

#[inline]
pub fn global_stat_bucket_length_ms() -> u32 {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.stat.interval_ms_total / cfg.config.stat.sample_count_total
}

#[inline]
pub fn metric_stat_interval_ms() -> u32 {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.stat.interval_ms
}

#[inline]
pub fn metric_stat_sample_count() -> u32 {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.stat.sample_count
}

#[inline]
pub fn chain_builders() -> Vec<String> {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.chain.builders.clone()
}

#[inline]
pub fn chain_slots() -> Vec<String> {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.chain.slots.clone()
}

#[inline]
pub fn resource_key_strategy() -> ResourceKeyStrategy {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.chain.resource_key
}

#[inline]
pub fn max_chain_amount() -> usize {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.chain.max_chain_amount
}

#[inline]
pub fn max_context_amount() -> usize {
    let cfg = GLOBAL_CONFIG.read().unwrap();
    cfg.config.chain.max_context_amount
}
