use super::constant::*;
use crate::{
    base::{constant::*, ResourceKeyStrategy, ResourceType, WindowSpec},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    // app_name represents the name of current running service.
    pub app_name: String,
    // app_type indicates the resource_type of the service (e.g. web service, API gateway).
    pub app_type: ResourceType,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: DEFAULT_APP_NAME.into(),
            app_type: DEFAULT_APP_TYPE.into(),
        }
    }
}

// LogConfig represent the configuration of logging.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LogConfig {
    // config_file is the log4rs configuration, only used with the `logger_log4rs` feature
    pub config_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            config_file: LOG_CONFIG_FILE.into(),
        }
    }
}

// SystemStatConfig represents the configuration items of system statistic collector
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SystemStatConfig {
    // load_interval_ms represents the collecting interval of the system load collector.
    pub load_interval_ms: u32,
    // cpu_interval_ms represents the collecting interval of the system cpu usage collector.
    pub cpu_interval_ms: u32,
}

impl Default for SystemStatConfig {
    fn default() -> Self {
        SystemStatConfig {
            load_interval_ms: LOAD_INTERVAL_MS,
            cpu_interval_ms: CPU_INTERVAL_MS,
        }
    }
}

// StatConfig represents configuration items related to statistics.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StatConfig {
    // sample_count_total and interval_ms_total is the per resource's global default statistic sliding window config
    pub sample_count_total: u32,
    pub interval_ms_total: u32,
    // sample_count and interval_ms is the per resource's default readonly metric statistic
    // This default readonly metric statistic must be reusable based on global statistic.
    pub sample_count: u32,
    pub interval_ms: u32,
    pub system: SystemStatConfig,
}

impl Default for StatConfig {
    fn default() -> Self {
        StatConfig {
            sample_count_total: DEFAULT_SAMPLE_COUNT_TOTAL,
            interval_ms_total: DEFAULT_INTERVAL_MS_TOTAL,
            sample_count: DEFAULT_SAMPLE_COUNT,
            interval_ms: DEFAULT_INTERVAL_MS,
            system: SystemStatConfig::default(),
        }
    }
}

// ChainConfig represents how slot chains are assembled and cached.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ChainConfig {
    // builders lists the candidate slot chain builders, the first registered one is used
    pub builders: Vec<String>,
    // slots lists the registered custom slots appended to the default chain
    pub slots: Vec<String>,
    // resource_key decides which parts of the resource identify its slot chain
    pub resource_key: ResourceKeyStrategy,
    // max_chain_amount caps the number of cached slot chains,
    // resources beyond it are admitted without rule checking
    pub max_chain_amount: usize,
    // max_context_amount caps the number of distinct context names
    pub max_context_amount: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            builders: Vec::new(),
            slots: Vec::new(),
            resource_key: ResourceKeyStrategy::default(),
            max_chain_amount: DEFAULT_MAX_CHAIN_AMOUNT,
            max_context_amount: DEFAULT_MAX_CONTEXT_AMOUNT,
        }
    }
}

// SentinelConfig represent the general configuration of Sentinel.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SentinelConfig {
    pub app: AppConfig,
    pub log: LogConfig,
    pub stat: StatConfig,
    pub chain: ChainConfig,
    // use_cache_time indicates whether to cache time(ms), it is false by default
    pub use_cache_time: bool,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        SentinelConfig {
            use_cache_time: false,
            app: AppConfig::default(),
            log: LogConfig::default(),
            stat: StatConfig::default(),
            chain: ChainConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConfigEntity {
    pub version: String,
    pub config: SentinelConfig,
}

impl Default for ConfigEntity {
    fn default() -> Self {
        ConfigEntity {
            version: SENTINEL_VERSION.into(),
            config: SentinelConfig::default(),
        }
    }
}

impl ConfigEntity {
    pub fn new() -> Self {
        ConfigEntity::default()
    }

    pub fn check(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::msg("empty version"));
        }
        if self.config.app.app_name.is_empty() {
            return Err(Error::msg("empty app name"));
        }
        if self.config.chain.max_chain_amount == 0 {
            return Err(Error::msg(
                "illegal chain configuration: max_chain_amount must be positive",
            ));
        }
        if self.config.chain.max_context_amount == 0 {
            return Err(Error::msg(
                "illegal chain configuration: max_context_amount must be positive",
            ));
        }
        let stat = &self.config.stat;
        WindowSpec::new(stat.sample_count, stat.interval_ms).check_readable_from(&WindowSpec::new(
            stat.sample_count_total,
            stat.interval_ms_total,
        ))?;
        Ok(())
    }
}

impl fmt::Display for ConfigEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", fmtted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        ConfigEntity::new().check().unwrap();
    }

    #[test]
    fn invalid_entities() {
        let mut entity = ConfigEntity::new();
        entity.version = String::new();
        assert!(entity.check().is_err());

        let mut entity = ConfigEntity::new();
        entity.config.app.app_name = String::new();
        assert!(entity.check().is_err());

        let mut entity = ConfigEntity::new();
        entity.config.chain.max_chain_amount = 0;
        assert!(entity.check().is_err());

        let mut entity = ConfigEntity::new();
        entity.config.stat.sample_count = 3;
        assert!(entity.check().is_err());
    }

    #[test]
    fn from_partial_yaml() {
        let yaml = r#"
version: v1
config:
  app:
    app_name: order-service
  chain:
    builders: ["tracing"]
    resource_key: NameAndTraffic
    max_chain_amount: 10
"#;
        let entity: ConfigEntity = serde_yaml::from_str(yaml).unwrap();
        entity.check().unwrap();
        assert_eq!(entity.config.app.app_name, "order-service");
        assert_eq!(entity.config.chain.builders, vec!["tracing".to_string()]);
        assert_eq!(
            entity.config.chain.resource_key,
            ResourceKeyStrategy::NameAndTraffic
        );
        assert_eq!(entity.config.chain.max_chain_amount, 10);
        assert_eq!(
            entity.config.chain.max_context_amount,
            DEFAULT_MAX_CONTEXT_AMOUNT
        );
        assert_eq!(entity.config.stat.sample_count_total, DEFAULT_SAMPLE_COUNT_TOTAL);
    }
}
