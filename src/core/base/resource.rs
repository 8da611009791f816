//! Resource/Traffic Wrappers
use serde::{Deserialize, Serialize};
use std::fmt;

/// ResourceType represents resource_type of the resources
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResourceType {
    Common = 0,
    Web,
    RPC,
    APIGateway,
    DBSQL,
    Cache,
    MQ,
}

impl Default for ResourceType {
    fn default() -> ResourceType {
        ResourceType::Common
    }
}

impl From<u8> for ResourceType {
    fn from(num: u8) -> ResourceType {
        match num {
            1 => ResourceType::Web,
            2 => ResourceType::RPC,
            3 => ResourceType::APIGateway,
            4 => ResourceType::DBSQL,
            5 => ResourceType::Cache,
            6 => ResourceType::MQ,
            _ => ResourceType::Common,
        }
    }
}

/// TrafficType describes the traffic type: Inbound or Outbound
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficType {
    Outbound,
    Inbound,
}

impl Default for TrafficType {
    fn default() -> TrafficType {
        TrafficType::Outbound
    }
}

/// Decides which parts of a resource identify its slot chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKeyStrategy {
    /// Resources with the same name share one chain.
    Name,
    /// Inbound and outbound traffic of one resource get their own chains.
    NameAndTraffic,
}

impl Default for ResourceKeyStrategy {
    fn default() -> Self {
        ResourceKeyStrategy::Name
    }
}

/// The key of the per-resource slot chain cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Name(String),
    NameAndTraffic(String, TrafficType),
}

/// ResourceWrapper represents the invocation.
/// It is created at the call-site and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ResourceWrapper {
    /// global unique resource name
    name: String,
    resource_type: ResourceType,
    /// Inbound or Outbound
    traffic_type: TrafficType,
}

impl fmt::Display for ResourceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceWrapper{{name={}, traffic_type={:?}, resource_type={:?}}}",
            self.name, self.traffic_type, self.resource_type
        )
    }
}

impl ResourceWrapper {
    pub fn new(name: String, resource_type: ResourceType, traffic_type: TrafficType) -> Self {
        ResourceWrapper {
            name,
            resource_type,
            traffic_type,
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn traffic_type(&self) -> &TrafficType {
        &self.traffic_type
    }

    pub fn key(&self, strategy: ResourceKeyStrategy) -> ResourceKey {
        match strategy {
            ResourceKeyStrategy::Name => ResourceKey::Name(self.name.clone()),
            ResourceKeyStrategy::NameAndTraffic => {
                ResourceKey::NameAndTraffic(self.name.clone(), self.traffic_type)
            }
        }
    }
}
