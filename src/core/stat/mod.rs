//! The `stat` mod implements the statistic nodes and the slots maintaining them,
//! on top of the sliding window and its underlying LeapArray.
mod base;
mod cluster_builder_slot;
mod default_node;
mod node_selector_slot;
mod node_storage;
mod resource_node;
mod stat_slot;
mod statistic_node;

pub use base::*;
pub use cluster_builder_slot::*;
pub use default_node::*;
pub use node_selector_slot::*;
pub use node_storage::*;
pub use resource_node::*;
pub use stat_slot::*;
pub use statistic_node::*;
